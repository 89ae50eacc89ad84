//! Query-intent classification.

use pagelens_core::QueryIntent;
use pagelens_core::model::{ModelBackend, ModelRequest};
use pagelens_core::tags::parse_query_type;

use crate::QueryError;

/// Classify a user query into one of the two intents.
///
/// Called once per conversation, on the first user message only; the result
/// is cached on the session and reused for every follow-up turn. A reply
/// without the `<querytype>` tag, or with an unrecognized label inside it,
/// is a classification error, never a silent default.
pub async fn classify_intent(
    model: &dyn ModelBackend,
    model_id: &str,
    user_query: &str,
) -> Result<QueryIntent, QueryError> {
    let prompt = format!(
        "Analyze the following text and determine the request type:\n\
         \n\
         \"{user_query}\"\n\
         \n\
         Decide which of these types the request belongs to:\n\
         1. A specific image search request: the user asks to locate a \
         particular image. This applies only when the text contains both a \
         word meaning image and a word meaning find.\n\
         2. A general information request: the user asks for information or \
         an explanation.\n\
         \n\
         State your conclusion briefly in this form:\n\
         - for a specific image search request: \"imagesearch\"\n\
         - for a general information request: \"general\"\n\
         \n\
         Then put that result inside a <querytype> tag."
    );

    let mut request = ModelRequest::new(512);
    request.push_text(prompt);
    let response = model.invoke(model_id, request).await?;

    let label = parse_query_type(&response)
        .ok_or(QueryError::MissingClassification("querytype"))?;
    QueryIntent::parse(&label).ok_or(QueryError::UnknownIntent(label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    #[tokio::test]
    async fn tagged_label_classifies() {
        let model = ScriptedModel::with_replies(vec![Ok(
            "This asks to find a figure.\n<querytype>imagesearch</querytype>",
        )]);
        let intent = classify_intent(&model, "m", "find me the pump diagram")
            .await
            .unwrap();
        assert_eq!(intent, QueryIntent::ImageSearch);
    }

    #[tokio::test]
    async fn missing_tag_is_a_classification_error() {
        let model = ScriptedModel::with_replies(vec![Ok("imagesearch")]);
        let err = classify_intent(&model, "m", "anything").await.unwrap_err();
        assert!(matches!(err, QueryError::MissingClassification("querytype")));
    }

    #[tokio::test]
    async fn unknown_label_is_a_classification_error() {
        let model = ScriptedModel::with_replies(vec![Ok("<querytype>figurehunt</querytype>")]);
        let err = classify_intent(&model, "m", "anything").await.unwrap_err();
        assert!(matches!(err, QueryError::UnknownIntent(label) if label == "figurehunt"));
    }
}
