use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::types::{Question, QuizOutcome, ReviewItem};

/// Percentage score, rounded down. No questions scores zero.
pub fn score_percent(correct: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    (correct * 100 / total) as i32
}

/// True once more than `time_limit_minutes` have elapsed since `started_at`.
/// A limit of zero means untimed.
pub fn is_expired(started_at: DateTime<Utc>, time_limit_minutes: i32, now: DateTime<Utc>) -> bool {
    if time_limit_minutes <= 0 {
        return false;
    }
    let elapsed_secs = (now - started_at).num_seconds();
    elapsed_secs > i64::from(time_limit_minutes) * 60
}

/// Seconds left on a timed attempt, floored at zero. None when untimed.
pub fn seconds_remaining(started_at: DateTime<Utc>, time_limit_minutes: i32, now: DateTime<Utc>) -> Option<i64> {
    if time_limit_minutes <= 0 {
        return None;
    }
    let deadline = started_at + chrono::Duration::minutes(i64::from(time_limit_minutes));
    Some((deadline - now).num_seconds().max(0))
}

pub fn passed(score: i32, passing_score: i32) -> bool {
    score >= passing_score
}

/// Grade saved answers against the answer key. Unanswered questions count as wrong.
pub fn evaluate(questions: &[Question], answers: &HashMap<i64, String>) -> QuizOutcome {
    let mut correct = 0;
    let mut unanswered = 0;

    for q in questions {
        match answers.get(&q.id) {
            Some(selected) if *selected == q.correct_option => correct += 1,
            Some(_) => {}
            None => unanswered += 1,
        }
    }

    let total = questions.len();
    QuizOutcome {
        total,
        correct,
        incorrect: total - correct - unanswered,
        unanswered,
        score: score_percent(correct, total),
    }
}

pub fn review(questions: Vec<Question>, answers: &HashMap<i64, String>) -> Vec<ReviewItem> {
    questions
        .into_iter()
        .map(|q| {
            let selected = answers.get(&q.id).cloned();
            let is_correct = selected.as_deref() == Some(q.correct_option.as_str());
            ReviewItem { question: q, selected, is_correct }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn question(id: i64, correct: &str) -> Question {
        Question {
            id,
            quiz_id: 1,
            question_number: id as i32,
            question_text: format!("Q{id}"),
            option_a: "A".into(),
            option_b: "B".into(),
            option_c: "C".into(),
            option_d: "D".into(),
            correct_option: correct.into(),
            explanation: String::new(),
        }
    }

    #[test]
    fn score_is_floor_of_percentage() {
        assert_eq!(score_percent(0, 0), 0);
        assert_eq!(score_percent(0, 5), 0);
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 66);
        assert_eq!(score_percent(7, 7), 100);
        assert_eq!(score_percent(29, 30), 96);
    }

    #[test]
    fn score_matches_floor_for_all_small_quizzes() {
        for total in 1..=50usize {
            for correct in 0..=total {
                let expected = ((correct as f64 / total as f64) * 100.0 + 1e-9).floor() as i32;
                assert_eq!(score_percent(correct, total), expected, "{correct}/{total}");
            }
        }
    }

    #[test]
    fn expiry_only_after_limit_passes() {
        let start = Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap();
        assert!(!is_expired(start, 10, start + Duration::minutes(10)));
        assert!(is_expired(start, 10, start + Duration::minutes(10) + Duration::seconds(1)));
        assert!(!is_expired(start, 0, start + Duration::days(3)));
    }

    #[test]
    fn remaining_time_is_clamped() {
        let start = Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap();
        assert_eq!(seconds_remaining(start, 5, start + Duration::minutes(2)), Some(180));
        assert_eq!(seconds_remaining(start, 5, start + Duration::minutes(9)), Some(0));
        assert_eq!(seconds_remaining(start, 0, start), None);
    }

    #[test]
    fn evaluate_counts_unanswered_as_wrong() {
        let questions = vec![question(1, "a"), question(2, "b"), question(3, "c"), question(4, "d")];
        let answers: HashMap<i64, String> =
            [(1, "a".to_string()), (2, "c".to_string()), (4, "d".to_string())].into_iter().collect();

        let outcome = evaluate(&questions, &answers);
        assert_eq!(
            outcome,
            QuizOutcome { total: 4, correct: 2, incorrect: 1, unanswered: 1, score: 50 }
        );
        assert!(passed(outcome.score, 50));
        assert!(!passed(outcome.score, 70));
    }

    #[test]
    fn review_marks_each_question() {
        let answers: HashMap<i64, String> = [(1, "b".to_string())].into_iter().collect();
        let items = review(vec![question(1, "b"), question(2, "a")], &answers);
        assert!(items[0].is_correct);
        assert!(!items[1].is_correct);
        assert_eq!(items[1].selected, None);
    }
}
