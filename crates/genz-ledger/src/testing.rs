use std::sync::Arc;

use chrono::Utc;
use genz_core::{Submission, SubmissionStatus, UserAccount};
use genz_store::InMemoryLedgerStore;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::RewardsLedger;

pub fn ledger() -> (InMemoryLedgerStore, RewardsLedger) {
    let store = InMemoryLedgerStore::new();
    let ledger = RewardsLedger::new(Arc::new(store.clone()));
    (store, ledger)
}

pub fn money(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Seeds a user referred by `referrer` (if any) directly into the store.
pub async fn seed_user(
    store: &InMemoryLedgerStore,
    name: &str,
    referrer: Option<&UserAccount>,
) -> UserAccount {
    let mut user = UserAccount::new(Uuid::new_v4(), Utc::now());
    user.username = Some(name.to_string());
    user.referred_by = referrer.map(|referrer| referrer.referral_code.clone());
    store.put_user(user.clone()).await;
    user
}

/// Seeds a straight referral chain; element 0 is the top of the chain and
/// the last element is referred by the one before it.
pub async fn seed_chain(store: &InMemoryLedgerStore, depth: usize) -> Vec<UserAccount> {
    let mut chain: Vec<UserAccount> = Vec::with_capacity(depth);
    for index in 0..depth {
        let user = seed_user(store, &format!("member{index}"), chain.last()).await;
        chain.push(user);
    }
    chain
}

pub async fn seed_submission(
    store: &InMemoryLedgerStore,
    user: &UserAccount,
    category: &str,
    submitted_count: i32,
) -> Submission {
    let submission = Submission {
        id: Uuid::new_v4(),
        user_id: user.id,
        filename: "batch.txt".to_string(),
        category: category.to_string(),
        subcategory: None,
        submitted_count,
        approved_count: None,
        status: SubmissionStatus::Pending,
        submission_method: "web".to_string(),
        content: None,
        rate_per_unit: None,
        total_earning: Decimal::ZERO,
        admin_notes: None,
        file_counter: format!("GENZ-TEST-{}", Uuid::new_v4().simple()),
        uploaded_at: Utc::now(),
        decided_at: None,
    };
    store.put_submission(submission.clone()).await;
    submission
}
