//! AI tutor: prompt construction and an OpenAI-compatible chat client.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::OpenAiConfig;
use crate::models::class_level::{self, ENGLISH_COMMUNICATION};
use crate::models::quiz::NewQuestion;
use crate::models::tutor::TutorMessage;
use crate::models::user::Role;

pub const FALLBACK_ANSWER: &str =
    "I'm sorry, I'm having trouble processing your question right now. Please try again in a moment.";

pub const MAX_PRACTICE_QUESTIONS: u8 = 10;

#[derive(Debug, Clone)]
pub enum TutorError {
    NotConfigured,
    Api(String),
    Network(String),
    Parse(String),
}

impl fmt::Display for TutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TutorError::NotConfigured => write!(f, "The AI tutor is not configured"),
            TutorError::Api(msg) => write!(f, "Model API error: {msg}"),
            TutorError::Network(msg) => write!(f, "Model API unreachable: {msg}"),
            TutorError::Parse(msg) => write!(f, "Unexpected model response: {msg}"),
        }
    }
}

impl std::error::Error for TutorError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant", content: content.into() }
    }
}

#[async_trait]
pub trait TutorModel: Send + Sync {
    /// `json_output` asks the model for a single JSON object.
    async fn complete(&self, messages: &[ChatMessage], json_output: bool) -> Result<String, TutorError>;
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &OpenAiConfig) -> Option<Self> {
        let key = config.api_key.as_deref()?;
        Some(Self::new(key, &config.base_url, &config.model))
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl TutorModel for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage], json_output: bool) -> Result<String, TutorError> {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": 800,
            "temperature": 0.7,
        });
        if json_output {
            body["response_format"] = json!({ "type": "json_object" });
            body["max_tokens"] = json!(2000);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TutorError::Network(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| TutorError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(TutorError::Api(format!("HTTP {status}: {text}")));
        }

        let parsed: CompletionResponse = serde_json::from_str(&text).map_err(|e| TutorError::Parse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| TutorError::Parse("Empty completion".to_string()))
    }
}

/// Who is asking and about what.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub role: Role,
    pub class_level: Option<String>,
    pub subject: Option<String>,
    /// Subject names assigned to the asker's class.
    pub curriculum: Vec<String>,
}

fn numeric_level(class_level: &str) -> Option<u8> {
    class_level.parse().ok()
}

fn age_guidance(class_level: &str) -> Option<&'static str> {
    if class_level == ENGLISH_COMMUNICATION {
        return Some(
            "Learners in the English Communication program are building practical language skills. \
             Focus on usage, vocabulary and confident communication.",
        );
    }
    let guidance = match numeric_level(class_level)? {
        1..=2 => "These are young learners (about 6-7 years old). Use simple words, concrete examples and short stories.",
        3..=5 => "These learners are about 8-10 years old. Use concrete examples and simple step-by-step explanations.",
        6..=8 => "These learners are about 11-13 years old and developing abstract thinking. Connect ideas to real-world uses.",
        9..=10 => "These learners are about 14-15 years old and preparing for board exams. Use precise terminology.",
        11..=12 => "These learners are in senior secondary. Give exam-oriented explanations of advanced concepts.",
        _ => return None,
    };
    Some(guidance)
}

fn subject_guidance(subject: &str, class_level: &str) -> Option<&'static str> {
    let subject = subject.to_lowercase();
    if subject.contains("english") {
        return Some(if class_level == ENGLISH_COMMUNICATION {
            "Cover listening, speaking, reading and writing with grammar and vocabulary in context."
        } else {
            "Cover reading comprehension, writing, grammar, vocabulary and literature for this class."
        });
    }

    let level = numeric_level(class_level)?;
    let guidance = if subject.contains("math") {
        match level {
            1..=5 => "Topics include arithmetic, shapes, patterns, measurement and early fractions.",
            6..=8 => "Topics include integers, rational numbers, algebraic expressions, linear equations and geometry.",
            9..=10 => "Topics include real numbers, polynomials, coordinate geometry, quadratic equations and statistics.",
            _ => "Topics include functions, calculus, vectors, probability and three-dimensional geometry.",
        }
    } else if subject.contains("physics") && level > 10 {
        "Topics include kinematics, laws of motion, thermodynamics, electrostatics, optics and modern physics."
    } else if subject.contains("chemistry") && level > 10 {
        "Topics include atomic structure, chemical bonding, equilibrium, redox reactions and hydrocarbons."
    } else if subject.contains("biology") && level > 10 {
        "Topics include cell biology, plant and human physiology, genetics, evolution and ecology."
    } else if subject.contains("science") {
        match level {
            1..=5 => "Topics include living things, plants, animals, the human body and the environment.",
            6..=8 => "Topics include materials, living organisms, motion, natural phenomena and resources.",
            9..=10 => "Topics include matter, motion, force and work, life processes and heredity.",
            _ => return None,
        }
    } else if subject.contains("social") || subject.contains("history") || subject.contains("geography") {
        match level {
            1..=5 => "Topics include family, community, transport and basic history and geography.",
            6..=8 => "Topics include the history and geography of India and civic life.",
            9..=10 => "Topics include contemporary India, the modern world, democratic politics and economics.",
            _ => return None,
        }
    } else {
        return None;
    };
    Some(guidance)
}

/// System prompt shaped by role, class, subject and curriculum.
pub fn system_prompt(app_name: &str, ctx: &PromptContext) -> String {
    let mut prompt = format!(
        "You are an AI tutor for the {app_name} learning platform. \
         Help users understand concepts and learn effectively. "
    );

    prompt.push_str(match ctx.role {
        Role::Student => {
            "You are answering a student. Explain clearly and accurately at their level, break complex \
             topics into parts and be encouraging. Only cover material for their class and curriculum; \
             if a question falls outside it, say so politely and suggest a related topic they study."
        }
        Role::Teacher => {
            "You are answering a teacher. Offer teaching approaches, lesson ideas, classroom activities \
             and assessments suited to their class and subjects."
        }
        Role::Admin => {
            "You are answering a school administrator. Give thorough information that helps with \
             educational management and curriculum planning."
        }
    });

    if let Some(level) = ctx.class_level.as_deref() {
        prompt.push_str(&format!(" The user belongs to {}.", class_level::label(level)));
        if ctx.role == Role::Student {
            if let Some(g) = age_guidance(level) {
                prompt.push(' ');
                prompt.push_str(g);
            }
        }
    }

    if let Some(subject) = ctx.subject.as_deref() {
        prompt.push_str(&format!(
            " The question is about {subject}; keep the answer within that subject."
        ));
        if let (Some(level), true) = (ctx.class_level.as_deref(), ctx.role != Role::Admin) {
            if let Some(g) = subject_guidance(subject, level) {
                prompt.push(' ');
                prompt.push_str(g);
            }
        }
    }

    if !ctx.curriculum.is_empty() {
        prompt.push_str(&format!(
            " The curriculum for this class is: {}. Politely decline subjects outside this list.",
            ctx.curriculum.join(", ")
        ));
    }

    prompt.push_str(
        " Keep content factually accurate and grade-appropriate. Do not invent curriculum details; \
         if unsure, say so and give general guidance instead.",
    );
    prompt
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PracticeQuestion {
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

impl PracticeQuestion {
    /// Multiple-choice form for a quiz: the answer is option A and the
    /// explanation, the other options are placeholders for the teacher to edit.
    pub fn into_quiz_question(self) -> NewQuestion {
        let not_answer = if self.answer.chars().count() < 30 {
            format!("Not {}", self.answer)
        } else {
            "Incorrect option 1".to_string()
        };
        NewQuestion {
            question_text: self.question,
            option_a: self.answer.clone(),
            option_b: not_answer,
            option_c: "Incorrect option 2".to_string(),
            option_d: "None of the above".to_string(),
            correct_option: "a".to_string(),
            explanation: self.answer,
        }
    }
}

#[derive(Deserialize)]
struct PracticeEnvelope {
    #[serde(default)]
    questions: Vec<PracticeQuestion>,
}

pub fn clamp_question_count(requested: u8) -> u8 {
    requested.clamp(1, MAX_PRACTICE_QUESTIONS)
}

pub fn parse_practice_questions(raw: &str) -> Result<Vec<PracticeQuestion>, TutorError> {
    let envelope: PracticeEnvelope = serde_json::from_str(raw).map_err(|e| TutorError::Parse(e.to_string()))?;
    Ok(envelope
        .questions
        .into_iter()
        .filter(|q| !q.question.trim().is_empty())
        .collect())
}

/// Front door for everything that talks to the model.
#[derive(Clone)]
pub struct Tutor {
    model: Option<Arc<dyn TutorModel>>,
    app_name: String,
}

impl Tutor {
    pub fn new(model: Option<Arc<dyn TutorModel>>, app_name: &str) -> Self {
        Self { model, app_name: app_name.to_string() }
    }

    pub fn from_config(config: &OpenAiConfig, app_name: &str) -> Self {
        let model = OpenAiClient::from_config(config).map(|c| Arc::new(c) as Arc<dyn TutorModel>);
        if model.is_none() {
            log::warn!("OPENAI_API_KEY not set; the AI tutor will answer with a fallback message");
        }
        Self::new(model, app_name)
    }

    pub fn is_configured(&self) -> bool {
        self.model.is_some()
    }

    /// Answer a question with prior turns as context. Never fails: model
    /// errors are logged and replaced by an apology.
    pub async fn answer(
        &self,
        ctx: &PromptContext,
        history: &[TutorMessage],
        extra_context: Option<&str>,
        question: &str,
    ) -> String {
        let Some(model) = &self.model else {
            return FALLBACK_ANSWER.to_string();
        };

        let mut messages = vec![ChatMessage::system(system_prompt(&self.app_name, ctx))];
        for m in history {
            if m.is_from_student() {
                messages.push(ChatMessage::user(&m.content));
            } else {
                messages.push(ChatMessage::assistant(&m.content));
            }
        }
        if let Some(extra) = extra_context {
            messages.push(ChatMessage::system(format!("CONTEXT: {extra}")));
        }
        messages.push(ChatMessage::user(question));

        match model.complete(&messages, false).await {
            Ok(answer) => answer,
            Err(e) => {
                log::error!("Tutor answer failed: {e}");
                FALLBACK_ANSWER.to_string()
            }
        }
    }

    pub async fn practice_questions(
        &self,
        topic: &str,
        count: u8,
        difficulty: &str,
    ) -> Result<Vec<PracticeQuestion>, TutorError> {
        let model = self.model.as_ref().ok_or(TutorError::NotConfigured)?;
        let count = clamp_question_count(count);
        let prompt = format!(
            "Generate {count} {difficulty}-level practice questions about '{topic}'. \
             Include a detailed answer for each. Respond with a JSON object with a 'questions' key \
             holding an array of objects with 'question' and 'answer' keys."
        );

        let raw = model.complete(&[ChatMessage::user(prompt)], true).await?;
        let mut questions = parse_practice_questions(&raw)?;
        questions.truncate(count as usize);
        log::info!("Generated {} practice questions on '{topic}'", questions.len());
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<String, TutorError>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl TutorModel for Scripted {
        async fn complete(&self, messages: &[ChatMessage], _json: bool) -> Result<String, TutorError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.reply.clone()
        }
    }

    fn student(level: &str, subject: Option<&str>) -> PromptContext {
        PromptContext {
            role: Role::Student,
            class_level: Some(level.to_string()),
            subject: subject.map(str::to_string),
            curriculum: vec!["Mathematics".to_string(), "Science".to_string()],
        }
    }

    #[test]
    fn student_prompt_mentions_class_subject_and_curriculum() {
        let prompt = system_prompt("ClassLearn", &student("9", Some("Mathematics")));
        assert!(prompt.contains("ClassLearn"));
        assert!(prompt.contains("Class 9"));
        assert!(prompt.contains("quadratic equations"));
        assert!(prompt.contains("Mathematics, Science"));
        assert!(prompt.contains("board exams"));
    }

    #[test]
    fn admin_prompt_skips_age_guidance() {
        let ctx = PromptContext { role: Role::Admin, ..student("3", None) };
        let prompt = system_prompt("ClassLearn", &ctx);
        assert!(prompt.contains("administrator"));
        assert!(!prompt.contains("8-10 years"));
    }

    #[test]
    fn question_count_is_clamped() {
        assert_eq!(clamp_question_count(0), 1);
        assert_eq!(clamp_question_count(5), 5);
        assert_eq!(clamp_question_count(40), 10);
    }

    #[test]
    fn practice_json_drops_blank_questions() {
        let raw = r#"{"questions":[{"question":"What is 2+2?","answer":"4"},{"question":"  ","answer":"x"}]}"#;
        let parsed = parse_practice_questions(raw).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].answer, "4");
        assert!(parse_practice_questions("not json").is_err());
    }

    #[test]
    fn generated_question_has_answer_as_option_a() {
        let q = PracticeQuestion { question: "Capital of France?".to_string(), answer: "Paris".to_string() }
            .into_quiz_question();
        assert_eq!(q.correct_option, "a");
        assert_eq!(q.option_a, "Paris");
        assert_eq!(q.option_b, "Not Paris");
        assert_eq!(q.explanation, "Paris");
    }

    #[tokio::test]
    async fn answer_falls_back_on_model_error() {
        let model = Arc::new(Scripted { reply: Err(TutorError::Api("boom".to_string())), seen: Mutex::new(Vec::new()) });
        let tutor = Tutor::new(Some(model.clone()), "ClassLearn");
        let answer = tutor.answer(&student("5", None), &[], None, "Why is the sky blue?").await;
        assert_eq!(answer, FALLBACK_ANSWER);

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].first().map(|m| m.role), Some("system"));
        assert_eq!(seen[0].last().map(|m| m.content.as_str()), Some("Why is the sky blue?"));
    }

    #[tokio::test]
    async fn unconfigured_tutor_cannot_generate() {
        let tutor = Tutor::new(None, "ClassLearn");
        assert!(matches!(
            tutor.practice_questions("fractions", 3, "easy").await,
            Err(TutorError::NotConfigured)
        ));
    }
}
