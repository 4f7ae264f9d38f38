use chrono::Utc;
use genz_core::{
    CommissionRecord, LedgerError, LedgerResult, Submission, SubmissionStatus, round_money,
};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::{CommissionPropagator, RewardsLedger};

const DEFAULT_SUBMISSION_METHOD: &str = "web";

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: Uuid,
    pub filename: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub submitted_count: i32,
    pub content: Option<String>,
    pub submission_method: Option<String>,
}

/// Result of approving a submission.
#[derive(Debug, Clone)]
pub struct Approval {
    pub submission: Submission,
    pub commissions: Vec<CommissionRecord>,
}

impl Approval {
    pub fn commission_total(&self) -> Decimal {
        self.commissions.iter().map(|record| record.amount).sum()
    }
}

impl RewardsLedger {
    pub async fn submit(&self, new: NewSubmission) -> LedgerResult<Submission> {
        let filename = required(&new.filename, "filename")?;
        let category = required(&new.category, "category")?;
        if new.submitted_count <= 0 {
            return Err(LedgerError::Validation(
                "submitted_count must be greater than zero".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        if tx.find_user(new.user_id).await?.is_none() {
            return Err(LedgerError::not_found("user", new.user_id));
        }

        let now = Utc::now();
        let submission = Submission {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            filename,
            category,
            subcategory: new.subcategory.filter(|value| !value.trim().is_empty()),
            submitted_count: new.submitted_count,
            approved_count: None,
            status: SubmissionStatus::Pending,
            submission_method: new
                .submission_method
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SUBMISSION_METHOD.to_string()),
            content: new.content,
            rate_per_unit: None,
            total_earning: Decimal::ZERO,
            admin_notes: None,
            file_counter: file_counter(now.timestamp_millis()),
            uploaded_at: now,
            decided_at: None,
        };
        tx.insert_submission(&submission).await?;
        tx.commit().await?;

        info!(
            submission = %submission.id,
            user = %submission.user_id,
            category = %submission.category,
            count = submission.submitted_count,
            "submission received"
        );
        Ok(submission)
    }

    /// Approves a pending submission, credits the submitter and pays the
    /// submitter's upline, all in one unit of work.
    pub async fn approve(
        &self,
        submission_id: Uuid,
        approved_count: Option<i32>,
        notes: Option<String>,
    ) -> LedgerResult<Approval> {
        let mut tx = self.store.begin().await?;
        let mut submission = tx
            .lock_submission(submission_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("submission", submission_id))?;

        if !submission.is_pending() {
            return Err(LedgerError::InvalidState(format!(
                "submission {submission_id} is already {}",
                submission.status.as_str()
            )));
        }

        let approved_count = approved_count.unwrap_or(submission.submitted_count);
        if !(0..=submission.submitted_count).contains(&approved_count) {
            return Err(LedgerError::Validation(format!(
                "approved_count must be between 0 and {}",
                submission.submitted_count
            )));
        }

        let rate = tx
            .active_rate(&submission.category)
            .await?
            .unwrap_or(self.default_rate);
        let total_earning = round_money(Decimal::from(approved_count) * rate);

        submission.status = SubmissionStatus::Approved;
        submission.approved_count = Some(approved_count);
        submission.rate_per_unit = Some(rate);
        submission.total_earning = total_earning;
        submission.admin_notes = notes;
        submission.decided_at = Some(Utc::now());
        tx.update_submission(&submission).await?;

        let submitter = tx
            .find_user(submission.user_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("user", submission.user_id))?;
        tx.credit_user(submitter.id, total_earning).await?;

        let commissions = CommissionPropagator::new(self.schedule.as_ref())
            .propagate(tx.as_mut(), &submitter, total_earning)
            .await?;

        tx.commit().await?;

        let approval = Approval {
            submission,
            commissions,
        };
        info!(
            submission = %submission_id,
            user = %submitter.id,
            approved_count,
            %rate,
            %total_earning,
            commission_total = %approval.commission_total(),
            "submission approved"
        );
        Ok(approval)
    }

    pub async fn reject(
        &self,
        submission_id: Uuid,
        notes: Option<String>,
    ) -> LedgerResult<Submission> {
        let mut tx = self.store.begin().await?;
        let mut submission = tx
            .lock_submission(submission_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("submission", submission_id))?;

        if !submission.is_pending() {
            return Err(LedgerError::InvalidState(format!(
                "submission {submission_id} is already {}",
                submission.status.as_str()
            )));
        }

        submission.status = SubmissionStatus::Rejected;
        submission.admin_notes = notes;
        submission.decided_at = Some(Utc::now());
        tx.update_submission(&submission).await?;
        tx.commit().await?;

        info!(submission = %submission_id, "submission rejected");
        Ok(submission)
    }
}

fn required(value: &str, field: &str) -> LedgerResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(LedgerError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn file_counter(millis: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("GENZ-{millis}-{}", &suffix[..6])
}
