//! Multi-image prompt construction, streamed answer generation, and
//! citation extraction.

use std::collections::BTreeSet;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use pagelens_core::QueryIntent;
use pagelens_core::model::{ModelBackend, ModelRequest};
use pagelens_core::tags::parse_ref_pages;

use crate::QueryError;

const IMAGESEARCH_INSTRUCTION: &str = "\
The images above are ordered by importance: earlier images matter more than \
later ones, and the first image is the most likely match. Consult the first \
image whenever at all possible.\n\
\n\
- List only the images you actually consulted, as page numbers in a form \
like 1,2,3, inside a <refpage> tag.\n";

const GENERAL_INSTRUCTION: &str = "\
Answer the question inside the <query> tag using the images above. Each \
image is one page of a document covering a specific subject; treat them as \
pages 1,2,3,4,5 in input order. Write the answer in the language of the \
document itself. Act as a guide conveying the document's knowledge to the \
reader. Follow arrows and similar markers on a page to any related table or \
fact and explain those as well. Do not mention page numbers in the answer \
and do not repeat anything from this prompt. Transcribe any numbers that \
appear in tables or images exactly.\n\
\n\
- List only the pages you actually consulted, as page numbers in a form \
like 1,2,3, inside a <refpage> tag.\n";

/// Build the answer prompt: page-numbered image markers in retrieval order,
/// the intent-specific instruction block, then the user query in its own
/// delimiter pair.
pub fn build_answer_request(
    intent: QueryIntent,
    user_query: &str,
    images: &[Vec<u8>],
) -> ModelRequest {
    let mut request = ModelRequest::new(2000).with_temperature(0.0);

    for (idx, image) in images.iter().enumerate() {
        request.push_text(format!("Page {} image start", idx + 1));
        request.push_image("image/png", BASE64.encode(image));
        request.push_text(format!("Page {} image end\n\n", idx + 1));
    }

    request.push_text(match intent {
        QueryIntent::ImageSearch => IMAGESEARCH_INSTRUCTION,
        QueryIntent::General => GENERAL_INSTRUCTION,
    });
    request.push_text(format!("\n\n<query>{user_query}</query>\n\n"));
    request
}

/// Stream the answer, delivering each fragment to `sink` as it arrives, and
/// return the full accumulated text once the stream terminates.
pub async fn generate_answer(
    model: &dyn ModelBackend,
    model_id: &str,
    intent: QueryIntent,
    user_query: &str,
    images: &[Vec<u8>],
    sink: &mut (dyn FnMut(&str) + Send),
) -> Result<String, QueryError> {
    let request = build_answer_request(intent, user_query, images);
    Ok(model.invoke_streaming(model_id, request, sink).await?)
}

/// The set of page numbers the answer claims to have used, unioned across
/// every `<refpage>` block. Non-integer tokens are a validation error.
pub fn cited_pages(answer: &str) -> Result<BTreeSet<u32>, QueryError> {
    Ok(parse_ref_pages(answer)?)
}
