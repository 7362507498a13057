//! Template-driven interview question generation
//!
//! Questions come from a curated bank of ten prompts per category; nothing is
//! persisted. The job title and summary are derived from the posting text
//! with simple keyword heuristics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::QuestionCategory;

pub const DEFAULT_QUESTIONS_PER_TYPE: usize = 5;
pub const MAX_QUESTIONS_PER_TYPE: usize = 10;

const DEFAULT_JOB_TITLE: &str = "Software Developer";
const GENERAL_SUMMARY: &str = "General position";

const TITLE_KEYWORDS: [&str; 8] = [
    "developer",
    "engineer",
    "manager",
    "analyst",
    "designer",
    "architect",
    "specialist",
    "coordinator",
];

const SUMMARY_ROLE_KEYWORDS: [&str; 6] = [
    "developer",
    "engineer",
    "manager",
    "analyst",
    "designer",
    "architect",
];

const SUMMARY_TECH_KEYWORDS: [&str; 9] = [
    "python",
    "javascript",
    "react",
    "node",
    "java",
    "sql",
    "aws",
    "docker",
    "kubernetes",
];

const TECHNICAL_BANK: [&str; 10] = [
    "How would you approach designing a scalable system for this role?",
    "What programming languages and frameworks are you most comfortable with?",
    "Describe a challenging technical problem you solved recently.",
    "How do you ensure code quality and maintainability?",
    "What's your experience with cloud platforms and DevOps practices?",
    "How would you optimize database performance for high-traffic applications?",
    "Describe your experience with microservices architecture.",
    "How do you handle security vulnerabilities in your code?",
    "What's your approach to testing and quality assurance?",
    "How would you design a real-time data processing system?",
];

const BEHAVIORAL_BANK: [&str; 10] = [
    "Tell me about a time when you had to work under pressure to meet a deadline.",
    "Describe a situation where you had to collaborate with a difficult team member.",
    "Give me an example of how you handled a major project failure.",
    "Tell me about a time when you had to learn a new technology quickly.",
    "Describe a situation where you had to make a difficult decision with limited information.",
    "Tell me about a time when you had to lead a team through a challenging project.",
    "Describe how you handled conflicting priorities from different stakeholders.",
    "Give me an example of when you had to adapt to a significant change in requirements.",
    "Tell me about a time when you had to mentor or train a junior colleague.",
    "Describe a situation where you had to resolve a conflict within your team.",
];

const CULTURAL_BANK: [&str; 10] = [
    "What motivates you in your work?",
    "How do you prefer to receive feedback?",
    "Describe your ideal work environment.",
    "How do you stay updated with industry trends?",
    "What does work-life balance mean to you?",
    "How do you handle stress and maintain productivity?",
    "What values are most important to you in a workplace?",
    "How do you approach continuous learning and professional development?",
    "Describe your communication style and how you work with others.",
    "What kind of company culture do you thrive in?",
];

/// POST /questions/generate request body
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub job_description: String,
    pub question_types: Vec<QuestionCategory>,
    #[serde(default = "default_per_type")]
    pub num_questions_per_type: usize,
    #[serde(default)]
    pub job_title: Option<String>,
}

fn default_per_type() -> usize {
    DEFAULT_QUESTIONS_PER_TYPE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub text: String,
    pub category: QuestionCategory,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub questions: Vec<GeneratedQuestion>,
    pub job_summary: String,
    pub job_title: String,
}

fn bank(category: QuestionCategory) -> &'static [&'static str] {
    match category {
        QuestionCategory::Technical => &TECHNICAL_BANK,
        QuestionCategory::Behavioral => &BEHAVIORAL_BANK,
        QuestionCategory::Cultural => &CULTURAL_BANK,
    }
}

/// Produce questions for each requested category
pub fn generate(request: &GenerateRequest) -> Result<GenerateResponse, String> {
    if request.job_description.trim().is_empty() {
        return Err("job_description must not be empty".to_string());
    }
    if request.question_types.is_empty() {
        return Err("question_types must name at least one category".to_string());
    }
    if !(1..=MAX_QUESTIONS_PER_TYPE).contains(&request.num_questions_per_type) {
        return Err(format!(
            "num_questions_per_type must be between 1 and {}",
            MAX_QUESTIONS_PER_TYPE
        ));
    }

    let questions = request
        .question_types
        .iter()
        .flat_map(|&category| {
            bank(category)
                .iter()
                .take(request.num_questions_per_type)
                .map(move |text| GeneratedQuestion {
                    text: text.to_string(),
                    category,
                    reasoning: format!(
                        "Generated based on job requirements and {} interview best practices",
                        category
                    ),
                })
        })
        .collect();

    let job_title = match request.job_title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => extract_job_title(&request.job_description),
    };

    Ok(GenerateResponse {
        questions,
        job_summary: summarize_job(&request.job_description),
        job_title,
    })
}

/// Guess the role title from the first lines of a posting
pub fn extract_job_title(job_description: &str) -> String {
    let lines: Vec<&str> = job_description.lines().collect();

    for line in lines.iter().take(5).map(|l| l.trim()) {
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if TITLE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            let title: String = line.chars().filter(|c| !matches!(c, '*' | '#' | '-')).collect();
            let title = title.trim();
            if title.chars().count() < 100 {
                return title.to_string();
            }
        }
    }

    for line in lines.iter().take(3).map(|l| l.trim()) {
        let lower = line.to_lowercase();
        let is_preamble = ["we are", "our company", "looking for"]
            .iter()
            .any(|p| lower.starts_with(p));
        if !line.is_empty() && line.chars().count() < 50 && !is_preamble {
            return line.to_string();
        }
    }

    DEFAULT_JOB_TITLE.to_string()
}

/// One-line summary of roles and technologies mentioned in a posting
pub fn summarize_job(job_description: &str) -> String {
    let lower = job_description.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    let roles: BTreeSet<&str> = words
        .iter()
        .copied()
        .filter(|w| SUMMARY_ROLE_KEYWORDS.contains(w))
        .collect();
    let tech: BTreeSet<&str> = words
        .iter()
        .copied()
        .filter(|w| SUMMARY_TECH_KEYWORDS.contains(w))
        .collect();

    let mut parts = Vec::new();
    if !roles.is_empty() {
        parts.push(format!("Role: {}", roles.into_iter().collect::<Vec<_>>().join(", ")));
    }
    if !tech.is_empty() {
        parts.push(format!(
            "Technologies: {}",
            tech.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }

    if parts.is_empty() {
        GENERAL_SUMMARY.to_string()
    } else {
        parts.join(" | ")
    }
}
