//! Episode response schema and strict validation.

use pikfic_core::error::GenerationError;
use pikfic_story::domain::aggregates::EpisodeDraft;
use serde_json::{Map, Value, json};

use crate::prompt::ResponseExpectations;

/// Number of continuation suggestions every non-final episode must carry.
pub const SUGGESTION_COUNT: usize = 3;

/// Number of hashtags a final episode carries.
pub const HASHTAG_COUNT: usize = 3;

/// Response schema sent with the request, in the service's schema dialect.
#[must_use]
pub fn response_schema(expects: &ResponseExpectations) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "content".to_owned(),
        json!({ "type": "STRING", "description": "The episode prose." }),
    );
    properties.insert(
        "suggestions".to_owned(),
        json!({
            "type": "ARRAY",
            "items": { "type": "STRING" },
            "description": "Exactly 3 short plot options for the next episode."
        }),
    );
    if expects.title {
        properties.insert(
            "storyTitle".to_owned(),
            json!({ "type": "STRING", "description": "A captivating story title." }),
        );
    }
    if expects.hashtags {
        properties.insert(
            "hashtags".to_owned(),
            json!({
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Exactly 3 hashtags for the whole story."
            }),
        );
    }
    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": ["content", "suggestions"],
    })
}

fn string_array(value: &Value, field: &'static str) -> Result<Vec<String>, GenerationError> {
    let items = value.as_array().ok_or_else(|| GenerationError::InvalidField {
        field,
        reason: "expected an array of strings".to_owned(),
    })?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_owned)
                .ok_or_else(|| GenerationError::InvalidField {
                    field,
                    reason: "expected an array of strings".to_owned(),
                })
        })
        .collect()
}

fn exact_count(
    values: Vec<String>,
    field: &'static str,
    expected: usize,
) -> Result<Vec<String>, GenerationError> {
    if values.len() == expected {
        Ok(values)
    } else {
        Err(GenerationError::InvalidField {
            field,
            reason: format!("expected exactly {expected} entries, got {}", values.len()),
        })
    }
}

/// Parses and validates a complete response body.
///
/// The final episode may omit `suggestions`. Title and hashtags are kept only
/// when they were requested.
///
/// # Errors
///
/// Returns `GenerationError::EmptyResponse` for a blank body,
/// `GenerationError::MalformedJson` when it is not a JSON object, and
/// `GenerationError::MissingField` or `GenerationError::InvalidField` when it
/// does not match the schema.
pub fn parse_episode(
    body: &str,
    expects: &ResponseExpectations,
) -> Result<EpisodeDraft, GenerationError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    let value: Value =
        serde_json::from_str(body).map_err(|e| GenerationError::MalformedJson(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(GenerationError::MalformedJson(
            "expected a JSON object".to_owned(),
        ));
    };

    let content = object
        .get("content")
        .ok_or(GenerationError::MissingField("content"))?
        .as_str()
        .ok_or_else(|| GenerationError::InvalidField {
            field: "content",
            reason: "expected a string".to_owned(),
        })?;
    if content.trim().is_empty() {
        return Err(GenerationError::InvalidField {
            field: "content",
            reason: "must not be blank".to_owned(),
        });
    }

    let suggestions = match object.get("suggestions") {
        Some(value) if expects.closing => string_array(value, "suggestions")?,
        Some(value) => exact_count(
            string_array(value, "suggestions")?,
            "suggestions",
            SUGGESTION_COUNT,
        )?,
        None if expects.closing => Vec::new(),
        None => return Err(GenerationError::MissingField("suggestions")),
    };

    let story_title = match object.get("storyTitle") {
        Some(Value::String(title)) if expects.title => Some(title.clone()),
        _ => None,
    };

    let hashtags = match object.get("hashtags") {
        Some(value) if expects.hashtags => Some(exact_count(
            string_array(value, "hashtags")?,
            "hashtags",
            HASHTAG_COUNT,
        )?),
        _ => None,
    };

    Ok(EpisodeDraft {
        content: content.to_owned(),
        suggestions,
        story_title,
        hashtags,
    })
}
