use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

pub const REFERRAL_CODE_PREFIX: &str = "GENZ";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAccount {
    pub id: Uuid,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub balance: Decimal,
    pub total_earned: Decimal,
    pub total_withdrawn: Decimal,
    pub is_active: bool,
    pub is_premium: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
            last_name: None,
            email: None,
            referral_code: referral_code_for(id),
            referred_by: None,
            balance: Decimal::ZERO,
            total_earned: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
            is_active: true,
            is_premium: false,
            is_admin: false,
            created_at,
        }
    }

    /// Name shown in commission descriptions and leaderboards.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.first_name.as_deref())
            .unwrap_or("Anonymous")
    }
}

/// `GENZ-` followed by the last eight hex digits of the user id.
pub fn referral_code_for(user_id: Uuid) -> String {
    let simple = user_id.simple().to_string();
    let tail = &simple[simple.len() - 8..];
    format!("{REFERRAL_CODE_PREFIX}-{}", tail.to_ascii_uppercase())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> LedgerResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(LedgerError::Validation(format!(
                "unsupported submission status: {other}"
            ))),
        }
    }
}

/// One uploaded batch of category-tagged records awaiting moderation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Submission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub submitted_count: i32,
    pub approved_count: Option<i32>,
    pub status: SubmissionStatus,
    pub submission_method: String,
    pub content: Option<String>,
    pub rate_per_unit: Option<Decimal>,
    pub total_earning: Decimal,
    pub admin_notes: Option<String>,
    pub file_counter: String,
    pub uploaded_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

impl Submission {
    pub fn is_pending(&self) -> bool {
        self.status == SubmissionStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryRate {
    pub category: String,
    pub subcategory: Option<String>,
    pub rate: Decimal,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Directed referrer -> referred relation at a given upline distance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferralEdge {
    pub id: Uuid,
    pub referrer_id: Uuid,
    pub referred_id: Uuid,
    pub level: i32,
    pub commission_rate: Decimal,
    pub total_commission: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommissionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub from_user_id: Uuid,
    pub amount: Decimal,
    pub level: i32,
    pub transaction_type: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> LedgerResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            other => Err(LedgerError::Validation(format!(
                "unsupported withdrawal status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_details: serde_json::Value,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizQuestion {
    pub prompt: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub answer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<QuizQuestion>,
    pub time_limit_minutes: Option<i32>,
    pub reward_amount: Decimal,
    pub is_active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl Quiz {
    pub fn total_questions(&self) -> i32 {
        self.questions.len() as i32
    }

    /// Counts answers that pick the correct option of the question at the
    /// same position. Extra answers are ignored.
    pub fn score(&self, answers: &[usize]) -> i32 {
        self.questions
            .iter()
            .zip(answers)
            .filter(|(question, answer)| question.answer == **answer)
            .count() as i32
    }

    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= at && at <= self.end_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub answers: Vec<usize>,
    pub score: i32,
    pub total_questions: i32,
    pub reward_earned: Decimal,
    pub completed_at: DateTime<Utc>,
}

impl QuizAttempt {
    pub fn percentage(&self) -> Decimal {
        if self.total_questions == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.score) * Decimal::ONE_HUNDRED / Decimal::from(self.total_questions))
            .round_dp(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn quiz() -> Quiz {
        let now = Utc::now();
        Quiz {
            id: Uuid::new_v4(),
            title: "Daily".to_string(),
            description: None,
            questions: vec![
                QuizQuestion {
                    prompt: "a".to_string(),
                    options: vec!["x".to_string(), "y".to_string()],
                    answer: 1,
                },
                QuizQuestion {
                    prompt: "b".to_string(),
                    options: vec!["x".to_string(), "y".to_string()],
                    answer: 0,
                },
                QuizQuestion {
                    prompt: "c".to_string(),
                    options: vec!["x".to_string(), "y".to_string()],
                    answer: 0,
                },
            ],
            time_limit_minutes: Some(5),
            reward_amount: Decimal::new(50, 2),
            is_active: true,
            start_date: now - Duration::hours(1),
            end_date: now + Duration::hours(1),
        }
    }

    #[test]
    fn referral_code_uses_id_tail() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(referral_code_for(id), "GENZ-0E5FE0C8");
    }

    #[test]
    fn display_name_falls_back() {
        let mut user = UserAccount::new(Uuid::new_v4(), Utc::now());
        assert_eq!(user.display_name(), "Anonymous");
        user.first_name = Some("Rafi".to_string());
        assert_eq!(user.display_name(), "Rafi");
        user.username = Some("rafi99".to_string());
        assert_eq!(user.display_name(), "rafi99");
    }

    #[test]
    fn quiz_scores_matching_answers_only() {
        let quiz = quiz();
        assert_eq!(quiz.score(&[1, 0, 1]), 2);
        assert_eq!(quiz.score(&[1]), 1);
        assert_eq!(quiz.score(&[1, 0, 0, 3, 3]), 3);
        assert_eq!(quiz.total_questions(), 3);
    }

    #[test]
    fn quiz_window_respects_active_flag() {
        let mut quiz = quiz();
        assert!(quiz.is_open_at(Utc::now()));
        assert!(!quiz.is_open_at(Utc::now() + Duration::hours(2)));
        quiz.is_active = false;
        assert!(!quiz.is_open_at(Utc::now()));
    }

    #[test]
    fn attempt_percentage_rounds() {
        let attempt = QuizAttempt {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            quiz_id: Uuid::new_v4(),
            answers: vec![1, 0, 1],
            score: 2,
            total_questions: 3,
            reward_earned: Decimal::ZERO,
            completed_at: Utc::now(),
        };
        assert_eq!(attempt.percentage(), Decimal::new(6667, 2));
    }

    #[test]
    fn status_strings_parse_back() {
        assert_eq!(
            SubmissionStatus::parse("Approved").unwrap(),
            SubmissionStatus::Approved
        );
        assert!(SubmissionStatus::parse("lost").is_err());
        assert_eq!(
            WithdrawalStatus::parse(WithdrawalStatus::Completed.as_str()).unwrap(),
            WithdrawalStatus::Completed
        );
    }
}
