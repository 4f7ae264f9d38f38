use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::models::{
    CommissionRecord, Quiz, QuizAttempt, ReferralEdge, Submission, UserAccount, Withdrawal,
};

/// Source of units of work. Everything done through one `LedgerTx` becomes
/// visible atomically on `commit`; dropping the transaction discards it.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>>;
}

#[async_trait]
pub trait LedgerTx: Send {
    async fn find_user(&mut self, user_id: Uuid) -> LedgerResult<Option<UserAccount>>;
    /// Same as `find_user` but holds the row until commit.
    async fn lock_user(&mut self, user_id: Uuid) -> LedgerResult<Option<UserAccount>>;
    async fn find_user_by_referral_code(&mut self, code: &str)
    -> LedgerResult<Option<UserAccount>>;
    async fn insert_user(&mut self, user: &UserAccount) -> LedgerResult<()>;
    /// Adds `amount` to both `balance` and `total_earned`.
    async fn credit_user(&mut self, user_id: Uuid, amount: Decimal) -> LedgerResult<()>;
    /// Subtracts `amount` from `balance` and adds it to `total_withdrawn`.
    async fn debit_user(&mut self, user_id: Uuid, amount: Decimal) -> LedgerResult<()>;

    async fn active_rate(&mut self, category: &str) -> LedgerResult<Option<Decimal>>;

    async fn insert_submission(&mut self, submission: &Submission) -> LedgerResult<()>;
    async fn lock_submission(&mut self, submission_id: Uuid) -> LedgerResult<Option<Submission>>;
    async fn update_submission(&mut self, submission: &Submission) -> LedgerResult<()>;

    async fn insert_referral_edge(&mut self, edge: &ReferralEdge) -> LedgerResult<()>;
    /// Adds to the cumulative commission of the referrer -> referred edge.
    /// Returns `false` when no such edge exists.
    async fn add_referral_commission(
        &mut self,
        referrer_id: Uuid,
        referred_id: Uuid,
        amount: Decimal,
    ) -> LedgerResult<bool>;
    async fn append_commission(&mut self, record: &CommissionRecord) -> LedgerResult<()>;

    async fn insert_withdrawal(&mut self, withdrawal: &Withdrawal) -> LedgerResult<()>;

    async fn find_quiz(&mut self, quiz_id: Uuid) -> LedgerResult<Option<Quiz>>;
    async fn quiz_attempted(&mut self, user_id: Uuid, quiz_id: Uuid) -> LedgerResult<bool>;
    async fn insert_quiz_attempt(&mut self, attempt: &QuizAttempt) -> LedgerResult<()>;

    async fn commit(self: Box<Self>) -> LedgerResult<()>;
}
