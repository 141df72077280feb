use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::policy::ClassScoped;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub class_level: String,
    pub created_by: i64,
    pub created_by_name: String,
    pub time_limit: i32,
    pub passing_score: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub question_count: i64,
}

impl ClassScoped for Quiz {
    fn class_level(&self) -> &str {
        &self.class_level
    }
    fn owner_id(&self) -> i64 {
        self.created_by
    }
}

impl Quiz {
    pub fn class_label(&self) -> String {
        crate::models::class_level::label(&self.class_level)
    }

    pub fn is_timed(&self) -> bool {
        self.time_limit > 0
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_number: i32,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: String,
    pub explanation: String,
}

impl Question {
    /// Non-empty options as (letter, text).
    pub fn options(&self) -> Vec<(&'static str, &str)> {
        [
            ("a", self.option_a.as_str()),
            ("b", self.option_b.as_str()),
            ("c", self.option_c.as_str()),
            ("d", self.option_d.as_str()),
        ]
        .into_iter()
        .filter(|(_, text)| !text.is_empty())
        .collect()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Attempt {
    pub id: i64,
    pub quiz_id: i64,
    pub student_id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub score: Option<i32>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Response {
    pub question_id: i64,
    pub selected_option: String,
}

/// A student's latest completed attempt, for the list page.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CompletedQuiz {
    pub quiz_id: i64,
    pub attempt_id: i64,
    pub title: String,
    pub subject_name: String,
    pub score: i32,
    pub passing_score: i32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct QuizStats {
    pub completions: i64,
    pub average_score: Option<f64>,
    pub pass_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuizForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    #[serde(default)]
    pub time_limit: i32,
    #[serde(default = "default_passing_score")]
    pub passing_score: i32,
    #[serde(default)]
    pub is_active: Option<String>,
    pub csrf_token: String,
}

fn default_passing_score() -> i32 {
    70
}

pub struct NewQuiz {
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    pub created_by: i64,
    pub time_limit: i32,
    pub passing_score: i32,
}

#[derive(Debug, Deserialize)]
pub struct QuestionForm {
    pub question_text: String,
    pub option_a: String,
    #[serde(default)]
    pub option_b: String,
    #[serde(default)]
    pub option_c: String,
    #[serde(default)]
    pub option_d: String,
    pub correct_option: String,
    #[serde(default)]
    pub explanation: String,
    pub csrf_token: String,
}

pub struct NewQuestion {
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: String,
    pub explanation: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    pub num_questions: u8,
    #[serde(default)]
    pub topic: String,
    pub csrf_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveResponseRequest {
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_option: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub attempt_id: i64,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ok: bool,
    pub score: i32,
    pub passed: bool,
    pub redirect_url: String,
}

/// Breakdown shown on the results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutcome {
    pub total: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub unanswered: usize,
    pub score: i32,
}

/// One graded question on the results page.
#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub question: Question,
    pub selected: Option<String>,
    pub is_correct: bool,
}
