use chrono::Utc;
use genz_core::{LedgerError, LedgerResult, Withdrawal, WithdrawalStatus};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::RewardsLedger;

#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_details: Value,
}

impl RewardsLedger {
    /// Debits the balance and records a pending withdrawal. The user row is
    /// locked so concurrent requests cannot overdraw it.
    pub async fn request_withdrawal(&self, request: WithdrawalRequest) -> LedgerResult<Withdrawal> {
        if request.amount <= Decimal::ZERO {
            return Err(LedgerError::Validation(
                "amount must be greater than zero".to_string(),
            ));
        }
        if request.amount != request.amount.round_dp(2) {
            return Err(LedgerError::Validation(
                "amount must have at most two decimal places".to_string(),
            ));
        }
        let payment_method = request.payment_method.trim();
        if payment_method.is_empty() {
            return Err(LedgerError::Validation(
                "payment_method is required".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let user = tx
            .lock_user(request.user_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("user", request.user_id))?;

        if request.amount > user.balance {
            return Err(LedgerError::InsufficientBalance {
                requested: request.amount,
                available: user.balance,
            });
        }

        let withdrawal = Withdrawal {
            id: Uuid::new_v4(),
            user_id: user.id,
            amount: request.amount,
            payment_method: payment_method.to_string(),
            payment_details: request.payment_details,
            status: WithdrawalStatus::Pending,
            requested_at: Utc::now(),
        };
        tx.debit_user(user.id, withdrawal.amount).await?;
        tx.insert_withdrawal(&withdrawal).await?;
        tx.commit().await?;

        info!(
            withdrawal = %withdrawal.id,
            user = %user.id,
            amount = %withdrawal.amount,
            method = %withdrawal.payment_method,
            "withdrawal requested"
        );
        Ok(withdrawal)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{ledger, money, seed_user};

    fn request(user_id: Uuid, amount: Decimal) -> WithdrawalRequest {
        WithdrawalRequest {
            user_id,
            amount,
            payment_method: "bkash".to_string(),
            payment_details: json!({ "number": "01700000000" }),
        }
    }

    #[tokio::test]
    async fn withdrawal_debits_balance_and_tracks_total() {
        let (store, ledger) = ledger();
        let mut user = seed_user(&store, "saver", None).await;
        user.balance = money(5000);
        user.total_earned = money(5000);
        store.put_user(user.clone()).await;

        let withdrawal = ledger
            .request_withdrawal(request(user.id, money(1250)))
            .await
            .unwrap();

        assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
        let stored = store.user(user.id).await.unwrap();
        assert_eq!(stored.balance, money(3750));
        assert_eq!(stored.total_withdrawn, money(1250));
        assert_eq!(stored.total_earned, money(5000));
        assert_eq!(
            stored.balance,
            stored.total_earned - stored.total_withdrawn
        );
        assert_eq!(store.snapshot().await.withdrawals.len(), 1);
    }

    #[tokio::test]
    async fn overdraw_is_refused() {
        let (store, ledger) = ledger();
        let mut user = seed_user(&store, "saver", None).await;
        user.balance = money(1000);
        store.put_user(user.clone()).await;

        let err = ledger
            .request_withdrawal(request(user.id, money(1001)))
            .await
            .unwrap_err();

        match err {
            LedgerError::InsufficientBalance {
                requested,
                available,
            } => {
                assert_eq!(requested, money(1001));
                assert_eq!(available, money(1000));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(store.user(user.id).await.unwrap().balance, money(1000));
        assert!(store.snapshot().await.withdrawals.is_empty());

        // The full balance can be withdrawn.
        ledger
            .request_withdrawal(request(user.id, money(1000)))
            .await
            .unwrap();
        assert_eq!(store.user(user.id).await.unwrap().balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected() {
        let (store, ledger) = ledger();
        let user = seed_user(&store, "saver", None).await;

        for amount in [Decimal::ZERO, money(-500), Decimal::new(1005, 3)] {
            let err = ledger
                .request_withdrawal(request(user.id, amount))
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::Validation(_)), "{amount}");
        }

        let mut blank_method = request(user.id, money(100));
        blank_method.payment_method = " ".to_string();
        let err = ledger.request_withdrawal(blank_method).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = ledger
            .request_withdrawal(request(Uuid::new_v4(), money(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }
}
