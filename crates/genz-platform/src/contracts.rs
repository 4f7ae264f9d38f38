use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use genz_core::{CommissionRecord, QuizQuestion};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollMemberRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub referred_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberView {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub balance: Decimal,
    pub total_earned: Decimal,
    pub total_withdrawn: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub balance: Decimal,
    pub total_earned: Decimal,
    pub total_withdrawn: Decimal,
    pub total_submissions: i64,
    pub approved_submissions: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRateView {
    pub category: String,
    pub subcategory: Option<String>,
    pub rate: Decimal,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertCategoryRateRequest {
    pub rate: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub subcategory: Option<String>,
    pub admin_user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitFileRequest {
    pub user_id: Uuid,
    pub filename: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub submitted_count: i32,
    pub content: Option<String>,
    pub submission_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionView {
    pub submission_id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub submitted_count: i32,
    pub approved_count: Option<i32>,
    pub status: String,
    pub rate_per_unit: Option<Decimal>,
    pub total_earning: Decimal,
    pub admin_notes: Option<String>,
    pub file_counter: String,
    pub uploaded_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSubmissionView {
    pub submission_id: Uuid,
    pub user_id: Uuid,
    pub submitter: String,
    pub filename: String,
    pub category: String,
    pub submitted_count: i32,
    pub content: Option<String>,
    pub file_counter: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveSubmissionRequest {
    pub admin_user_id: Uuid,
    pub approved_count: Option<i32>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveSubmissionResponse {
    pub submission: SubmissionView,
    pub commissions: Vec<CommissionView>,
    pub commission_total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectSubmissionRequest {
    pub admin_user_id: Uuid,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionView {
    pub commission_id: Uuid,
    pub user_id: Uuid,
    pub from_user_id: Uuid,
    pub amount: Decimal,
    pub level: i32,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<CommissionRecord> for CommissionView {
    fn from(record: CommissionRecord) -> Self {
        Self {
            commission_id: record.id,
            user_id: record.user_id,
            from_user_id: record.from_user_id,
            amount: record.amount,
            level: record.level,
            description: record.description,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelStat {
    pub count: i64,
    pub earnings: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralSummary {
    pub referral_code: String,
    pub total_referrals: i64,
    pub total_commission: Decimal,
    /// Keyed `level1` .. `level5`.
    pub level_stats: BTreeMap<String, LevelStat>,
    pub recent_commissions: Vec<CommissionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuizRequest {
    pub admin_user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<QuizQuestion>,
    pub time_limit_minutes: Option<i32>,
    #[serde(default)]
    pub reward_amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Quiz as shown to members, without the answer key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizView {
    pub quiz_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<QuizQuestionView>,
    pub time_limit_minutes: Option<i32>,
    pub reward_amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestionView {
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitQuizRequest {
    pub user_id: Uuid,
    pub answers: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResultResponse {
    pub attempt_id: Uuid,
    pub score: i32,
    pub total_questions: i32,
    pub reward_earned: Decimal,
    pub percentage: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub username: String,
    pub percentage: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    #[serde(default)]
    pub payment_details: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalView {
    pub withdrawal_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_details: serde_json::Value,
    pub status: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNoticeRequest {
    pub admin_user_id: Uuid,
    pub title: String,
    pub content: String,
    #[serde(default = "default_notice_kind")]
    pub kind: String,
    #[serde(default = "default_audience")]
    pub target_audience: String,
    #[serde(default)]
    pub priority: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeView {
    pub notice_id: Uuid,
    pub title: String,
    pub content: String,
    pub kind: String,
    pub target_audience: String,
    pub priority: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderView {
    pub reminder_id: Uuid,
    pub title: String,
    pub content: String,
    /// Quran, Hadith and similar.
    pub source: Option<String>,
    pub display_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub active_users: i64,
    pub pending_submissions: i64,
    pub total_earnings: Decimal,
    pub active_categories: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyAccountsRequest {
    pub uids: Vec<String>,
    pub report_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountVerification {
    pub status: String,
    pub found: bool,
    pub category: Option<String>,
    pub notes: Option<String>,
    pub report_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodAccount {
    pub uid: String,
    pub category: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReportRequest {
    pub admin_user_id: Uuid,
    pub good_accounts: Vec<GoodAccount>,
    pub report_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReportResponse {
    pub report_date: NaiveDate,
    pub accounts_recorded: usize,
}

fn default_true() -> bool {
    true
}

fn default_notice_kind() -> String {
    "info".to_string()
}

fn default_audience() -> String {
    "all".to_string()
}
