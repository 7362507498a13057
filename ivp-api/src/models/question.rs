//! Interview questions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Question category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionCategory {
    Technical,
    Behavioral,
    Cultural,
}

impl QuestionCategory {
    pub const ALL: [QuestionCategory; 3] = [
        QuestionCategory::Technical,
        QuestionCategory::Behavioral,
        QuestionCategory::Cultural,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionCategory::Technical => "technical",
            QuestionCategory::Behavioral => "behavioral",
            QuestionCategory::Cultural => "cultural",
        }
    }
}

impl fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "technical" => Ok(QuestionCategory::Technical),
            "behavioral" => Ok(QuestionCategory::Behavioral),
            "cultural" => Ok(QuestionCategory::Cultural),
            other => Err(format!("Unknown question category: {}", other)),
        }
    }
}

/// Stored interview question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub category: QuestionCategory,
    pub job_title: Option<String>,
    pub job_description: Option<String>,
    pub is_generated: bool,
    pub created_at: DateTime<Utc>,
}

/// POST /questions request body
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub text: String,
    pub category: QuestionCategory,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub is_generated: bool,
}

impl NewQuestion {
    /// Trim the prompt text and reject it if empty
    pub fn validated(mut self) -> Result<Self, String> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            return Err("Question text must not be empty".to_string());
        }
        self.text = trimmed.to_string();
        Ok(self)
    }
}
