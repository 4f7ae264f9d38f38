pub mod commission;
pub mod error;
pub mod models;
pub mod storage;

pub use commission::{CommissionSchedule, FiveLevelSchedule, commission_amount, round_money};
pub use error::{LedgerError, LedgerResult};
pub use models::{
    CategoryRate, CommissionRecord, Quiz, QuizAttempt, QuizQuestion, ReferralEdge, Submission,
    SubmissionStatus, UserAccount, Withdrawal, WithdrawalStatus, referral_code_for,
};
pub use storage::{LedgerStore, LedgerTx};
