//! Model calls made during extraction: full-page OCR and the
//! redundancy check between a page rendering and a candidate crop.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use pagelens_core::model::{ModelBackend, ModelError, ModelRequest};
use pagelens_core::tags::{SameImageVerdict, parse_same_image};

const OCR_PROMPT: &str = "Extract all text from this image, including any text \
inside tables. Output only the extracted text, nothing else.";

const REDUNDANCY_PROMPT: &str = "\
The first image is a full page; the second image may be a part of it or the \
same image. If the two images are the same content differing only in \
resolution, write true in a <sameimage> tag; otherwise write false. If they \
are different, explain what the second image represents and where it sits \
within the first image, describing it precisely in the order title, subtitle, \
section, caption. Use the output format title>subtitle>section>caption and \
print no other commentary. Write the description in the language of the \
document itself and fix obvious typos in any text you transcribe from the \
image. Print the <sameimage> tag last.";

const MAX_TOKENS: u32 = 2000;

/// Extract the full text of a rendered page via a single-image model call.
pub async fn ocr_page(
    model: &dyn ModelBackend,
    model_id: &str,
    page_png: &[u8],
) -> Result<String, ModelError> {
    let mut request = ModelRequest::new(MAX_TOKENS);
    request.push_image("image/png", BASE64.encode(page_png));
    request.push_text(OCR_PROMPT);
    model.invoke(model_id, request).await
}

/// Ask whether `crop_png` is the page rendering at a different resolution,
/// and get the hierarchical caption if not.
///
/// A reply without the `<sameimage>` tag pair fails open to "not redundant"
/// (see [`parse_same_image`]); a transport failure propagates uncaught.
pub async fn classify_redundancy(
    model: &dyn ModelBackend,
    model_id: &str,
    page_png: &[u8],
    crop_png: &[u8],
) -> Result<SameImageVerdict, ModelError> {
    let mut request = ModelRequest::new(MAX_TOKENS);
    request.push_image("image/png", BASE64.encode(page_png));
    request.push_image("image/png", BASE64.encode(crop_png));
    request.push_text(REDUNDANCY_PROMPT);

    let response = model.invoke(model_id, request).await?;
    Ok(parse_same_image(&response))
}
