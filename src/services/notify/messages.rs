//! Plain-text bodies for every notification the app sends.

use chrono::{DateTime, Utc};

use super::Email;
use crate::models::assignment::Assignment;
use crate::models::conference::Conference;
use crate::models::insights::WeeklySummary;
use crate::models::tutor::{MessageType, TutorMessage, TutorSession};
use crate::models::user::User;

const STAMP: &str = "%Y-%m-%d %H:%M UTC";

pub fn login_notice(app_name: &str, user: &User, ip: &str, at: DateTime<Utc>) -> Email {
    Email::new(
        &user.email,
        format!("New sign-in to your {app_name} account"),
        format!(
            "Hello {},\n\n\
             Your account was signed in at {} from {}.\n\n\
             If this was not you, change your password right away.\n\n\
             {app_name}",
            user.name(),
            at.format(STAMP),
            ip,
        ),
    )
}

pub fn welcome(app_name: &str, user: &User, login_url: &str) -> Email {
    Email::new(
        &user.email,
        format!("Welcome to {app_name}"),
        format!(
            "Hello {},\n\n\
             Your {} account '{}' is ready. Sign in at {login_url}.\n\n\
             {app_name}",
            user.name(),
            user.role().label().to_lowercase(),
            user.username,
        ),
    )
}

pub fn password_reset(app_name: &str, user: &User, reset_url: &str, valid_hours: i64) -> Email {
    Email::new(
        &user.email,
        format!("Reset your {app_name} password"),
        format!(
            "Hello {},\n\n\
             Someone asked to reset the password for the {app_name} account '{}'.\n\
             Choose a new password here within {valid_hours} hours:\n\n\
             {reset_url}\n\n\
             The link works once. If you did not ask for this, ignore this email.\n\n\
             {app_name}",
            user.name(),
            user.username,
        ),
    )
}

pub fn payment_receipt(app_name: &str, user: &User, amount_minor: i64, currency: &str, reference: &str) -> Email {
    Email::new(
        &user.email,
        format!("{app_name} registration payment received"),
        format!(
            "Hello {},\n\n\
             We received your registration payment of {:.2} {}.\n\
             Reference: {reference}\n\n\
             {app_name}",
            user.name(),
            amount_minor as f64 / 100.0,
            currency.to_uppercase(),
        ),
    )
}

/// Invitation for a scheduled class; `join_url` points at the in-app join page.
pub fn conference_invitation(app_name: &str, to: &str, conf: &Conference, join_url: &str) -> Email {
    let mut body = format!(
        "You are invited to '{}' ({}, {}).\n\n\
         Starts: {}\n\
         Ends:   {}\n\
         Platform: {}\n\
         Join: {join_url}\n",
        conf.title,
        conf.subject_name,
        conf.class_label(),
        conf.start_time.format(STAMP),
        conf.end_time.format(STAMP),
        conf.platform,
    );
    if !conf.meeting_password.is_empty() {
        body.push_str(&format!("Password: {}\n", conf.meeting_password));
    }
    if !conf.description.is_empty() {
        body.push_str(&format!("\n{}\n", conf.description));
    }
    body.push_str(&format!("\n{app_name}"));

    Email::new(to, format!("Class scheduled: {}", conf.title), body)
}

pub fn conference_cancelled(app_name: &str, to: &str, conf: &Conference) -> Email {
    Email::new(
        to,
        format!("Class cancelled: {}", conf.title),
        format!(
            "'{}' scheduled for {} has been cancelled.\n\n{app_name}",
            conf.title,
            conf.start_time.format(STAMP),
        ),
    )
}

pub fn assignment_published(app_name: &str, to: &str, assignment: &Assignment, link: &str) -> Email {
    Email::new(
        to,
        format!("New assignment: {}", assignment.title),
        format!(
            "A new {} assignment was posted for {}.\n\n\
             {}\n\
             Due: {}\n\
             Points: {}\n\
             Open: {link}\n\n\
             {app_name}",
            assignment.subject_name,
            assignment.class_label(),
            assignment.title,
            assignment.due_date.format(STAMP),
            assignment.total_points,
        ),
    )
}

pub fn weekly_summary(app_name: &str, user: &User, summary: &WeeklySummary) -> Email {
    let stats = &summary.stats;
    let mut body = format!(
        "Hello {},\n\nYour week since {}:\n\n\
         Assignments submitted: {}\n\
         Classes attended: {}\n\
         Tutor sessions: {} ({} questions)\n\
         Quizzes completed: {}\n",
        user.name(),
        summary.since.format("%Y-%m-%d"),
        stats.assignments_submitted,
        stats.classes_attended,
        stats.tutor_sessions,
        stats.tutor_questions,
        stats.quizzes_completed,
    );
    if let Some(avg) = stats.average_quiz_score {
        body.push_str(&format!("Average quiz score: {avg:.0}%\n"));
    }

    if !summary.top_subjects.is_empty() {
        body.push_str("\nMost studied:\n");
        for s in &summary.top_subjects {
            body.push_str(&format!("  - {} ({} sessions)\n", s.name, s.sessions));
        }
    }
    if !summary.achievements.is_empty() {
        body.push_str("\nAchievements:\n");
        for a in &summary.achievements {
            body.push_str(&format!("  - {a}\n"));
        }
    }
    if !summary.improvement_areas.is_empty() {
        body.push_str("\nAreas to work on:\n");
        for area in &summary.improvement_areas {
            body.push_str(&format!("  - {}: {}\n", area.description, area.suggestion));
        }
    }
    if !summary.upcoming_deadlines.is_empty() {
        body.push_str("\nDue this week:\n");
        for d in &summary.upcoming_deadlines {
            body.push_str(&format!("  - {} ({})\n", d.title, d.due_date.format(STAMP)));
        }
    }
    body.push_str(&format!("\n{app_name}"));

    Email::new(&user.email, format!("Your weekly {app_name} summary"), body)
}

/// Full transcript of a tutor session, oldest message first.
pub fn tutor_transcript(app_name: &str, user: &User, session: &TutorSession, messages: &[TutorMessage]) -> Email {
    let mut body = format!(
        "Transcript of '{}' started {}\n\n",
        session.display_title(),
        session.started_at.format(STAMP),
    );
    for m in messages {
        let speaker = match m.kind() {
            Some(kind) if kind.is_from_student() => "You",
            Some(MessageType::Summary) => "Summary",
            _ => "Tutor",
        };
        body.push_str(&format!("[{}] {speaker}: {}\n\n", m.created_at.format("%H:%M"), m.content));
    }
    body.push_str(app_name);

    Email::new(&user.email, format!("Tutor session: {}", session.display_title()), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user() -> User {
        User {
            id: 7,
            username: "asha".to_string(),
            email: "asha@example.com".to_string(),
            password_hash: String::new(),
            display_name: "Asha".to_string(),
            role: "student".to_string(),
            class_level: Some("10".to_string()),
            bio: String::new(),
            phone_number: String::new(),
            is_active: true,
            payment_status: "paid".to_string(),
            payment_date: None,
            payment_amount: None,
            payment_id: None,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn login_notice_names_ip_and_time() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let mail = login_notice("ClassLearn", &user(), "10.0.0.5", at);
        assert_eq!(mail.to, vec!["asha@example.com".to_string()]);
        assert!(mail.text_body.contains("10.0.0.5"));
        assert!(mail.text_body.contains("2025-03-01 09:30 UTC"));
    }

    #[test]
    fn receipt_formats_minor_units() {
        let mail = payment_receipt("ClassLearn", &user(), 100_000, "inr", "pi_1");
        assert!(mail.text_body.contains("1000.00 INR"));
        assert!(mail.text_body.contains("pi_1"));
    }

    #[test]
    fn reset_mail_carries_link_and_lifetime() {
        let mail = password_reset("ClassLearn", &user(), "https://learn.example.com/reset/abc", 72);
        assert_eq!(mail.to, vec!["asha@example.com".to_string()]);
        assert!(mail.text_body.contains("https://learn.example.com/reset/abc"));
        assert!(mail.text_body.contains("72 hours"));
        assert!(mail.text_body.contains("'asha'"));
    }
}
