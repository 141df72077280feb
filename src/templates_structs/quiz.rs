use askama::Template;

use super::{PageContext, SubjectOption};
use crate::models::class_level::ClassLevelOption;
use crate::models::quiz::{Attempt, CompletedQuiz, Question, Quiz, QuizOutcome, QuizStats, ReviewItem};

#[derive(Template)]
#[template(path = "quizzes/list.html")]
pub struct QuizListTemplate {
    pub ctx: PageContext,
    pub quizzes: Vec<Quiz>,
    pub completed: Vec<CompletedQuiz>,
}

#[derive(Template)]
#[template(path = "quizzes/detail.html")]
pub struct QuizDetailTemplate {
    pub ctx: PageContext,
    pub quiz: Quiz,
    pub stats: QuizStats,
    pub attempts: Vec<Attempt>,
    pub can_manage: bool,
    pub can_take: bool,
}

#[derive(Template)]
#[template(path = "quizzes/form.html")]
pub struct QuizFormTemplate {
    pub ctx: PageContext,
    pub subjects: Vec<SubjectOption>,
    pub classes: Vec<ClassLevelOption>,
    pub errors: Vec<String>,
    pub title: String,
    pub description: String,
    pub subject_id: i64,
    pub class_level: String,
    pub time_limit: i32,
    pub passing_score: i32,
}

#[derive(Template)]
#[template(path = "quizzes/edit.html")]
pub struct QuizEditTemplate {
    pub ctx: PageContext,
    pub quiz: Quiz,
    pub questions: Vec<Question>,
    pub errors: Vec<String>,
    pub ai_enabled: bool,
}

/// A question as shown while taking the quiz, with the saved answer.
pub struct TakeQuestion {
    pub question: Question,
    pub selected: String,
}

#[derive(Template)]
#[template(path = "quizzes/take.html")]
pub struct QuizTakeTemplate {
    pub ctx: PageContext,
    pub quiz: Quiz,
    pub attempt_id: i64,
    pub questions: Vec<TakeQuestion>,
    /// Seconds left when timed.
    pub seconds_remaining: Option<i64>,
}

#[derive(Template)]
#[template(path = "quizzes/results.html")]
pub struct QuizResultsTemplate {
    pub ctx: PageContext,
    pub quiz: Quiz,
    pub attempt: Attempt,
    pub outcome: QuizOutcome,
    pub passed: bool,
    pub minutes_taken: i64,
    pub review: Vec<ReviewItem>,
    pub student_name: String,
}
