use std::collections::HashSet;

use chrono::Utc;
use genz_core::{
    CommissionRecord, CommissionSchedule, LedgerError, LedgerResult, LedgerTx, ReferralEdge,
    UserAccount, commission_amount,
};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::RewardsLedger;

const COMMISSION_TRANSACTION_TYPE: &str = "commission";

/// One ancestor in a member's upline.
#[derive(Debug, Clone)]
pub struct UplineStep {
    pub ancestor: UserAccount,
    pub level: i32,
    pub rate: Decimal,
}

/// Resolves the upline of a member whose referrer code is `first_code`.
///
/// The walk stops at the schedule depth, at a missing or dangling referrer
/// code, or when an ancestor repeats (a referral cycle). `origin` is the
/// member the walk starts from and counts as already visited.
pub(crate) async fn resolve_upline(
    tx: &mut dyn LedgerTx,
    schedule: &dyn CommissionSchedule,
    origin: Uuid,
    first_code: Option<&str>,
) -> LedgerResult<Vec<UplineStep>> {
    let mut steps = Vec::new();
    let mut visited = HashSet::from([origin]);
    let mut next_code = first_code.and_then(non_blank).map(str::to_string);
    let mut level = 1;

    while let Some(code) = next_code.take() {
        let Some(rate) = schedule.rate_for_level(level) else {
            break;
        };
        let Some(ancestor) = tx.find_user_by_referral_code(&code).await? else {
            warn!(%origin, code = %code, level, "referral code does not resolve, upline ends here");
            break;
        };
        if !visited.insert(ancestor.id) {
            warn!(%origin, ancestor = %ancestor.id, level, "referral cycle detected, upline ends here");
            break;
        }

        next_code = ancestor
            .referred_by
            .as_deref()
            .and_then(non_blank)
            .map(str::to_string);
        steps.push(UplineStep {
            ancestor,
            level,
            rate,
        });
        level += 1;
    }

    Ok(steps)
}

fn non_blank(code: &str) -> Option<&str> {
    let code = code.trim();
    (!code.is_empty()).then_some(code)
}

/// Fans a credited amount out to the beneficiary's upline.
pub struct CommissionPropagator<'a> {
    schedule: &'a dyn CommissionSchedule,
}

impl<'a> CommissionPropagator<'a> {
    pub fn new(schedule: &'a dyn CommissionSchedule) -> Self {
        Self { schedule }
    }

    /// Credits each ancestor `amount * rate(level)` on top of the
    /// beneficiary's own earning and records one commission per level.
    /// Every resolved level gets a record, even when its share rounds to
    /// 0.00.
    pub async fn propagate(
        &self,
        tx: &mut dyn LedgerTx,
        beneficiary: &UserAccount,
        amount: Decimal,
    ) -> LedgerResult<Vec<CommissionRecord>> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::Validation(
                "commission base amount must not be negative".to_string(),
            ));
        }

        let upline = resolve_upline(
            tx,
            self.schedule,
            beneficiary.id,
            beneficiary.referred_by.as_deref(),
        )
        .await?;

        let now = Utc::now();
        let mut records = Vec::with_capacity(upline.len());
        for step in upline {
            let commission = commission_amount(amount, step.rate);

            tx.credit_user(step.ancestor.id, commission).await?;

            let record = CommissionRecord {
                id: Uuid::new_v4(),
                user_id: step.ancestor.id,
                from_user_id: beneficiary.id,
                amount: commission,
                level: step.level,
                transaction_type: COMMISSION_TRANSACTION_TYPE.to_string(),
                description: format!(
                    "Level {} commission from {}",
                    step.level,
                    beneficiary.display_name()
                ),
                created_at: now,
            };
            tx.append_commission(&record).await?;

            let edge_updated = tx
                .add_referral_commission(step.ancestor.id, beneficiary.id, commission)
                .await?;
            if !edge_updated {
                // Members enrolled before edges were tracked per level.
                tx.insert_referral_edge(&ReferralEdge {
                    id: Uuid::new_v4(),
                    referrer_id: step.ancestor.id,
                    referred_id: beneficiary.id,
                    level: step.level,
                    commission_rate: step.rate,
                    total_commission: commission,
                    is_active: true,
                    created_at: now,
                })
                .await?;
            }

            debug!(
                beneficiary = %beneficiary.id,
                ancestor = %step.ancestor.id,
                level = step.level,
                %commission,
                "commission credited"
            );
            records.push(record);
        }

        Ok(records)
    }
}

impl RewardsLedger {
    /// Runs commission propagation for `beneficiary_id` in its own unit of
    /// work.
    pub async fn propagate_commission(
        &self,
        beneficiary_id: Uuid,
        amount: Decimal,
    ) -> LedgerResult<Vec<CommissionRecord>> {
        let mut tx = self.store.begin().await?;
        let beneficiary = tx
            .find_user(beneficiary_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("user", beneficiary_id))?;

        let records = CommissionPropagator::new(self.schedule.as_ref())
            .propagate(tx.as_mut(), &beneficiary, amount)
            .await?;
        tx.commit().await?;

        info!(
            beneficiary = %beneficiary_id,
            %amount,
            levels = records.len(),
            "commission propagated"
        );
        Ok(records)
    }
}
