//! Structured interview feedback
//!
//! Language-model output is untrusted: it is decoded into [`Feedback`] before
//! anything is stored, and a missing or non-string key is a decode failure.

use serde::{Deserialize, Serialize};

/// Rubric keys, exactly as the model is asked to emit them
pub const FEEDBACK_KEYS: [&str; 5] = [
    "Clarity",
    "Structure",
    "Tone",
    "Language",
    "Suggested improvements",
];

/// Five-part rubric feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(rename = "Clarity")]
    pub clarity: String,

    #[serde(rename = "Structure")]
    pub structure: String,

    #[serde(rename = "Tone")]
    pub tone: String,

    #[serde(rename = "Language")]
    pub language: String,

    #[serde(rename = "Suggested improvements")]
    pub suggested_improvements: String,
}

impl Feedback {
    /// Decode the model's primary text into feedback
    ///
    /// Accepts a bare JSON object or one wrapped in a single Markdown code
    /// fence. Keys outside the rubric are dropped.
    pub fn from_model_text(text: &str) -> Result<Self, String> {
        let body = strip_code_fence(text.trim());

        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| format!("Feedback is not valid JSON: {}", e))?;

        let object = value
            .as_object()
            .ok_or_else(|| "Feedback JSON is not an object".to_string())?;

        let missing: Vec<&str> = FEEDBACK_KEYS
            .iter()
            .copied()
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(format!("Feedback JSON missing keys: {}", missing.join(", ")));
        }

        serde_json::from_value(value).map_err(|e| format!("Feedback JSON has wrong shape: {}", e))
    }
}

/// Remove one surrounding ```/```json fence, if present
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return text;
    };
    // Drop the info string ("json") on the opening fence line
    match body.split_once('\n') {
        Some((info, inner)) if !info.trim_start().starts_with('{') => inner.trim(),
        _ => body.trim(),
    }
}
