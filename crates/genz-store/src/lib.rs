use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use genz_core::{
    CategoryRate, CommissionRecord, LedgerError, LedgerResult, LedgerStore, LedgerTx, Quiz,
    QuizAttempt, ReferralEdge, Submission, UserAccount, Withdrawal,
};
use rust_decimal::Decimal;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

/// Full contents of the in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub users: HashMap<Uuid, UserAccount>,
    pub submissions: HashMap<Uuid, Submission>,
    pub rates: HashMap<String, CategoryRate>,
    pub referral_edges: Vec<ReferralEdge>,
    pub commissions: Vec<CommissionRecord>,
    pub withdrawals: Vec<Withdrawal>,
    pub quizzes: HashMap<Uuid, Quiz>,
    pub quiz_attempts: Vec<QuizAttempt>,
}

impl MemoryState {
    pub fn commissions_for(&self, user_id: Uuid) -> Vec<&CommissionRecord> {
        self.commissions
            .iter()
            .filter(|record| record.user_id == user_id)
            .collect()
    }

    pub fn edge(&self, referrer_id: Uuid, referred_id: Uuid) -> Option<&ReferralEdge> {
        self.referral_edges
            .iter()
            .find(|edge| edge.referrer_id == referrer_id && edge.referred_id == referred_id)
    }
}

/// Store with one writer at a time. A transaction holds the write lock,
/// mutates a private copy and publishes it on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> MemoryState {
        self.state.read().await.clone()
    }

    pub async fn put_user(&self, user: UserAccount) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn put_rate(&self, category: &str, rate: Decimal, is_active: bool) {
        self.state.write().await.rates.insert(
            category.to_string(),
            CategoryRate {
                category: category.to_string(),
                subcategory: None,
                rate,
                is_active,
                updated_at: Utc::now(),
            },
        );
    }

    pub async fn put_submission(&self, submission: Submission) {
        self.state
            .write()
            .await
            .submissions
            .insert(submission.id, submission);
    }

    pub async fn put_quiz(&self, quiz: Quiz) {
        self.state.write().await.quizzes.insert(quiz.id, quiz);
    }

    pub async fn user(&self, user_id: Uuid) -> Option<UserAccount> {
        self.state.read().await.users.get(&user_id).cloned()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().write_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }
}

struct InMemoryTx {
    guard: OwnedRwLockWriteGuard<MemoryState>,
    working: MemoryState,
}

impl InMemoryTx {
    fn user_mut(&mut self, user_id: Uuid) -> LedgerResult<&mut UserAccount> {
        self.working
            .users
            .get_mut(&user_id)
            .ok_or_else(|| LedgerError::not_found("user", user_id))
    }
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn find_user(&mut self, user_id: Uuid) -> LedgerResult<Option<UserAccount>> {
        Ok(self.working.users.get(&user_id).cloned())
    }

    async fn lock_user(&mut self, user_id: Uuid) -> LedgerResult<Option<UserAccount>> {
        self.find_user(user_id).await
    }

    async fn find_user_by_referral_code(
        &mut self,
        code: &str,
    ) -> LedgerResult<Option<UserAccount>> {
        Ok(self
            .working
            .users
            .values()
            .find(|user| user.referral_code == code)
            .cloned())
    }

    async fn insert_user(&mut self, user: &UserAccount) -> LedgerResult<()> {
        if self.working.users.contains_key(&user.id)
            || self
                .working
                .users
                .values()
                .any(|existing| existing.referral_code == user.referral_code)
        {
            return Err(LedgerError::InvalidState(format!(
                "user {} already exists",
                user.id
            )));
        }
        self.working.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn credit_user(&mut self, user_id: Uuid, amount: Decimal) -> LedgerResult<()> {
        let user = self.user_mut(user_id)?;
        user.balance += amount;
        user.total_earned += amount;
        Ok(())
    }

    async fn debit_user(&mut self, user_id: Uuid, amount: Decimal) -> LedgerResult<()> {
        let user = self.user_mut(user_id)?;
        user.balance -= amount;
        user.total_withdrawn += amount;
        Ok(())
    }

    async fn active_rate(&mut self, category: &str) -> LedgerResult<Option<Decimal>> {
        Ok(self
            .working
            .rates
            .get(category)
            .filter(|rate| rate.is_active)
            .map(|rate| rate.rate))
    }

    async fn insert_submission(&mut self, submission: &Submission) -> LedgerResult<()> {
        self.working
            .submissions
            .insert(submission.id, submission.clone());
        Ok(())
    }

    async fn lock_submission(&mut self, submission_id: Uuid) -> LedgerResult<Option<Submission>> {
        Ok(self.working.submissions.get(&submission_id).cloned())
    }

    async fn update_submission(&mut self, submission: &Submission) -> LedgerResult<()> {
        match self.working.submissions.get_mut(&submission.id) {
            Some(existing) => {
                *existing = submission.clone();
                Ok(())
            }
            None => Err(LedgerError::not_found("submission", submission.id)),
        }
    }

    async fn insert_referral_edge(&mut self, edge: &ReferralEdge) -> LedgerResult<()> {
        self.working.referral_edges.push(edge.clone());
        Ok(())
    }

    async fn add_referral_commission(
        &mut self,
        referrer_id: Uuid,
        referred_id: Uuid,
        amount: Decimal,
    ) -> LedgerResult<bool> {
        let edge = self
            .working
            .referral_edges
            .iter_mut()
            .find(|edge| edge.referrer_id == referrer_id && edge.referred_id == referred_id);
        match edge {
            Some(edge) => {
                edge.total_commission += amount;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_commission(&mut self, record: &CommissionRecord) -> LedgerResult<()> {
        self.working.commissions.push(record.clone());
        Ok(())
    }

    async fn insert_withdrawal(&mut self, withdrawal: &Withdrawal) -> LedgerResult<()> {
        self.working.withdrawals.push(withdrawal.clone());
        Ok(())
    }

    async fn find_quiz(&mut self, quiz_id: Uuid) -> LedgerResult<Option<Quiz>> {
        Ok(self.working.quizzes.get(&quiz_id).cloned())
    }

    async fn quiz_attempted(&mut self, user_id: Uuid, quiz_id: Uuid) -> LedgerResult<bool> {
        Ok(self
            .working
            .quiz_attempts
            .iter()
            .any(|attempt| attempt.user_id == user_id && attempt.quiz_id == quiz_id))
    }

    async fn insert_quiz_attempt(&mut self, attempt: &QuizAttempt) -> LedgerResult<()> {
        self.working.quiz_attempts.push(attempt.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn committed_work_becomes_visible() {
        let store = InMemoryLedgerStore::new();
        let user = UserAccount::new(Uuid::new_v4(), Utc::now());
        store.put_user(user.clone()).await;

        let mut tx = store.begin().await.unwrap();
        tx.credit_user(user.id, Decimal::new(1250, 2)).await.unwrap();
        tx.commit().await.unwrap();

        let stored = store.user(user.id).await.unwrap();
        assert_eq!(stored.balance, Decimal::new(1250, 2));
        assert_eq!(stored.total_earned, Decimal::new(1250, 2));
    }

    #[tokio::test]
    async fn dropped_transaction_discards_work() {
        let store = InMemoryLedgerStore::new();
        let user = UserAccount::new(Uuid::new_v4(), Utc::now());
        store.put_user(user.clone()).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.credit_user(user.id, Decimal::ONE).await.unwrap();
            let seen = tx.find_user(user.id).await.unwrap().unwrap();
            assert_eq!(seen.balance, Decimal::ONE);
        }

        assert_eq!(store.user(user.id).await.unwrap().balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn inactive_rate_is_not_returned() {
        let store = InMemoryLedgerStore::new();
        store.put_rate("facebook", Decimal::new(350, 2), false).await;
        store.put_rate("gmail", Decimal::new(150, 2), true).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.active_rate("facebook").await.unwrap(), None);
        assert_eq!(
            tx.active_rate("gmail").await.unwrap(),
            Some(Decimal::new(150, 2))
        );
        assert_eq!(tx.active_rate("unknown").await.unwrap(), None);
    }

    #[tokio::test]
    async fn credit_of_missing_user_fails() {
        let store = InMemoryLedgerStore::new();
        let mut tx = store.begin().await.unwrap();
        let err = tx.credit_user(Uuid::new_v4(), Decimal::ONE).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "user", .. }));
    }
}
