//! Delimiter-tag parsing for structured model output.
//!
//! The model contracts in this pipeline are string-level: a boolean verdict
//! inside `<sameimage>`, an intent label inside `<querytype>`, and cited
//! page numbers inside `<refpage>`. The tags are a fragile but fixed wire
//! format, so each parser documents its fallback behavior and is tested
//! against canned response strings.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("invalid page number token in <refpage>: {0:?}")]
    InvalidPageNumber(String),
}

/// Parsed redundancy-classifier reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SameImageVerdict {
    pub is_same: bool,
    pub caption: String,
}

/// Parse a redundancy-classifier reply.
///
/// The verdict is the case-insensitive comparison of the `<sameimage>` tag
/// body against `"true"`; the caption is everything before the opening tag,
/// trimmed. A reply without the tag pair fails open: the whole trimmed reply
/// becomes the caption and the verdict is `false`, so ambiguous output keeps
/// the image rather than discarding it.
pub fn parse_same_image(response: &str) -> SameImageVerdict {
    const OPEN: &str = "<sameimage>";
    const CLOSE: &str = "</sameimage>";

    match (response.find(OPEN), response.find(CLOSE)) {
        (Some(start), Some(end)) if start + OPEN.len() <= end => {
            let value = response[start + OPEN.len()..end].trim();
            SameImageVerdict {
                is_same: value.eq_ignore_ascii_case("true"),
                caption: response[..start].trim().to_string(),
            }
        }
        _ => SameImageVerdict {
            is_same: false,
            caption: response.trim().to_string(),
        },
    }
}

/// Extract the trimmed body of the first `<querytype>` tag, if present.
///
/// No fallback here: a missing tag means the classification failed and the
/// caller must surface that as an error.
pub fn parse_query_type(response: &str) -> Option<String> {
    static QUERYTYPE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)<querytype>(.*?)</querytype>").unwrap());
    QUERYTYPE
        .captures(response)
        .map(|c| c[1].trim().to_string())
}

/// Collect the union of page numbers across every `<refpage>` block.
///
/// Each block body is split on commas and every token parsed as an integer;
/// a non-integer token is a validation error rather than a silent skip.
/// Empty tokens (trailing commas) are ignored.
pub fn parse_ref_pages(text: &str) -> Result<BTreeSet<u32>, TagError> {
    static REFPAGE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)<refpage>(.*?)</refpage>").unwrap());

    let mut pages = BTreeSet::new();
    for captures in REFPAGE.captures_iter(text) {
        for token in captures[1].split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let page: u32 = token
                .parse()
                .map_err(|_| TagError::InvalidPageNumber(token.to_string()))?;
            pages.insert(page);
        }
    }
    Ok(pages)
}
