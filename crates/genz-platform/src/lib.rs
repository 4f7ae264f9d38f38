pub mod config;
pub mod contracts;
pub mod db;
pub mod pg_store;

pub use config::ServiceConfig;
pub use contracts::{
    AccountVerification, AdminStats, ApproveSubmissionRequest, ApproveSubmissionResponse,
    CategoryRateView, CommissionView, CreateNoticeRequest, CreateQuizRequest,
    CreateWithdrawalRequest, DailyReportRequest, DailyReportResponse, DashboardStats,
    EnrollMemberRequest, GoodAccount, LeaderboardEntry, LevelStat, MemberView, NoticeView,
    PendingSubmissionView, QuizQuestionView, QuizResultResponse, QuizView, ReferralSummary,
    RejectSubmissionRequest, ReminderView, SubmissionView, SubmitFileRequest,
    SubmitQuizRequest, UpsertCategoryRateRequest, VerifyAccountsRequest, WithdrawalView,
};
pub use db::{apply_schema, connect_database};
pub use pg_store::{
    PgLedgerStore, PgLedgerTx, QUIZ_COLUMNS, SUBMISSION_COLUMNS, USER_COLUMNS, quiz_from_row,
    submission_from_row, user_from_row,
};
