use async_trait::async_trait;
use chrono::Utc;
use genz_core::{
    CommissionRecord, LedgerError, LedgerResult, LedgerStore, LedgerTx, Quiz, QuizAttempt,
    QuizQuestion, ReferralEdge, Submission, SubmissionStatus, UserAccount, Withdrawal,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

pub const USER_COLUMNS: &str = "id, username, first_name, last_name, email, referral_code, referred_by, balance, total_earned, total_withdrawn, is_active, is_premium, is_admin, created_at";

pub const SUBMISSION_COLUMNS: &str = "id, user_id, filename, category, subcategory, submitted_count, approved_count, status, submission_method, content, rate_per_unit, total_earning, admin_notes, file_counter, uploaded_at, decided_at";

pub const QUIZ_COLUMNS: &str =
    "id, title, description, questions, time_limit_minutes, reward_amount, is_active, start_date, end_date";

/// Postgres-backed ledger storage. Each unit of work is one database
/// transaction.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> LedgerResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await.map_err(storage)?;
        Ok(Box::new(PgLedgerTx { tx }))
    }
}

pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

impl PgLedgerTx {
    async fn fetch_user(&mut self, filter: &str, key: &str) -> LedgerResult<Option<UserAccount>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}");
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn fetch_user_by_id(
        &mut self,
        user_id: Uuid,
        for_update: bool,
    ) -> LedgerResult<Option<UserAccount>> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1{lock}");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage)?;
        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn find_user(&mut self, user_id: Uuid) -> LedgerResult<Option<UserAccount>> {
        self.fetch_user_by_id(user_id, false).await
    }

    async fn lock_user(&mut self, user_id: Uuid) -> LedgerResult<Option<UserAccount>> {
        self.fetch_user_by_id(user_id, true).await
    }

    async fn find_user_by_referral_code(
        &mut self,
        code: &str,
    ) -> LedgerResult<Option<UserAccount>> {
        self.fetch_user("referral_code = $1", code).await
    }

    async fn insert_user(&mut self, user: &UserAccount) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, first_name, last_name, email, referral_code, referred_by,
                balance, total_earned, total_withdrawn, is_active, is_premium, is_admin,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.referral_code)
        .bind(&user.referred_by)
        .bind(user.balance)
        .bind(user.total_earned)
        .bind(user.total_withdrawn)
        .bind(user.is_active)
        .bind(user.is_premium)
        .bind(user.is_admin)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn credit_user(&mut self, user_id: Uuid, amount: Decimal) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = balance + $2,
                total_earned = total_earned + $2,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("user", user_id));
        }
        Ok(())
    }

    async fn debit_user(&mut self, user_id: Uuid, amount: Decimal) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET balance = balance - $2,
                total_withdrawn = total_withdrawn + $2,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("user", user_id));
        }
        Ok(())
    }

    async fn active_rate(&mut self, category: &str) -> LedgerResult<Option<Decimal>> {
        let row = sqlx::query("SELECT rate FROM category_rates WHERE category = $1 AND is_active")
            .bind(category)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage)?;
        row.map(|row| column(&row, "rate")).transpose()
    }

    async fn insert_submission(&mut self, submission: &Submission) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO submissions (
                id, user_id, filename, category, subcategory, submitted_count, approved_count,
                status, submission_method, content, rate_per_unit, total_earning, admin_notes,
                file_counter, uploaded_at, decided_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(submission.id)
        .bind(submission.user_id)
        .bind(&submission.filename)
        .bind(&submission.category)
        .bind(&submission.subcategory)
        .bind(submission.submitted_count)
        .bind(submission.approved_count)
        .bind(submission.status.as_str())
        .bind(&submission.submission_method)
        .bind(&submission.content)
        .bind(submission.rate_per_unit)
        .bind(submission.total_earning)
        .bind(&submission.admin_notes)
        .bind(&submission.file_counter)
        .bind(submission.uploaded_at)
        .bind(submission.decided_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn lock_submission(&mut self, submission_id: Uuid) -> LedgerResult<Option<Submission>> {
        let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(submission_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage)?;
        row.as_ref().map(submission_from_row).transpose()
    }

    async fn update_submission(&mut self, submission: &Submission) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE submissions
            SET status = $2,
                approved_count = $3,
                rate_per_unit = $4,
                total_earning = $5,
                admin_notes = $6,
                decided_at = $7
            WHERE id = $1
            "#,
        )
        .bind(submission.id)
        .bind(submission.status.as_str())
        .bind(submission.approved_count)
        .bind(submission.rate_per_unit)
        .bind(submission.total_earning)
        .bind(&submission.admin_notes)
        .bind(submission.decided_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found("submission", submission.id));
        }
        Ok(())
    }

    async fn insert_referral_edge(&mut self, edge: &ReferralEdge) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO referral_edges (
                id, referrer_id, referred_id, level, commission_rate, total_commission,
                is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(edge.id)
        .bind(edge.referrer_id)
        .bind(edge.referred_id)
        .bind(edge.level)
        .bind(edge.commission_rate)
        .bind(edge.total_commission)
        .bind(edge.is_active)
        .bind(edge.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn add_referral_commission(
        &mut self,
        referrer_id: Uuid,
        referred_id: Uuid,
        amount: Decimal,
    ) -> LedgerResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE referral_edges
            SET total_commission = total_commission + $3
            WHERE referrer_id = $1 AND referred_id = $2
            "#,
        )
        .bind(referrer_id)
        .bind(referred_id)
        .bind(amount)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_commission(&mut self, record: &CommissionRecord) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO commissions (
                id, user_id, from_user_id, amount, level, transaction_type, description, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.from_user_id)
        .bind(record.amount)
        .bind(record.level)
        .bind(&record.transaction_type)
        .bind(&record.description)
        .bind(record.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn insert_withdrawal(&mut self, withdrawal: &Withdrawal) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO withdrawals (
                id, user_id, amount, payment_method, payment_details, status, requested_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(withdrawal.id)
        .bind(withdrawal.user_id)
        .bind(withdrawal.amount)
        .bind(&withdrawal.payment_method)
        .bind(&withdrawal.payment_details)
        .bind(withdrawal.status.as_str())
        .bind(withdrawal.requested_at)
        .execute(&mut *self.tx)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn find_quiz(&mut self, quiz_id: Uuid) -> LedgerResult<Option<Quiz>> {
        let sql = format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(quiz_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(storage)?;
        row.as_ref().map(quiz_from_row).transpose()
    }

    async fn quiz_attempted(&mut self, user_id: Uuid, quiz_id: Uuid) -> LedgerResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2) AS attempted",
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(storage)?;
        column(&row, "attempted")
    }

    async fn insert_quiz_attempt(&mut self, attempt: &QuizAttempt) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO quiz_attempts (
                id, user_id, quiz_id, answers, score, total_questions, reward_earned, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.user_id)
        .bind(attempt.quiz_id)
        .bind(Json(&attempt.answers))
        .bind(attempt.score)
        .bind(attempt.total_questions)
        .bind(attempt.reward_earned)
        .bind(attempt.completed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                LedgerError::InvalidState(format!(
                    "quiz {} was already attempted",
                    attempt.quiz_id
                ))
            } else {
                storage(err)
            }
        })?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        self.tx.commit().await.map_err(storage)
    }
}

pub(crate) fn storage(err: sqlx::Error) -> LedgerError {
    LedgerError::Storage(err.into())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> LedgerResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(storage)
}

pub fn user_from_row(row: &PgRow) -> LedgerResult<UserAccount> {
    Ok(UserAccount {
        id: column(row, "id")?,
        username: column(row, "username")?,
        first_name: column(row, "first_name")?,
        last_name: column(row, "last_name")?,
        email: column(row, "email")?,
        referral_code: column(row, "referral_code")?,
        referred_by: column(row, "referred_by")?,
        balance: column(row, "balance")?,
        total_earned: column(row, "total_earned")?,
        total_withdrawn: column(row, "total_withdrawn")?,
        is_active: column(row, "is_active")?,
        is_premium: column(row, "is_premium")?,
        is_admin: column(row, "is_admin")?,
        created_at: column(row, "created_at")?,
    })
}

pub fn submission_from_row(row: &PgRow) -> LedgerResult<Submission> {
    let status: String = column(row, "status")?;
    Ok(Submission {
        id: column(row, "id")?,
        user_id: column(row, "user_id")?,
        filename: column(row, "filename")?,
        category: column(row, "category")?,
        subcategory: column(row, "subcategory")?,
        submitted_count: column(row, "submitted_count")?,
        approved_count: column(row, "approved_count")?,
        status: SubmissionStatus::parse(&status)?,
        submission_method: column(row, "submission_method")?,
        content: column(row, "content")?,
        rate_per_unit: column(row, "rate_per_unit")?,
        total_earning: column(row, "total_earning")?,
        admin_notes: column(row, "admin_notes")?,
        file_counter: column(row, "file_counter")?,
        uploaded_at: column(row, "uploaded_at")?,
        decided_at: column(row, "decided_at")?,
    })
}

pub fn quiz_from_row(row: &PgRow) -> LedgerResult<Quiz> {
    let Json(questions): Json<Vec<QuizQuestion>> = column(row, "questions")?;
    Ok(Quiz {
        id: column(row, "id")?,
        title: column(row, "title")?,
        description: column(row, "description")?,
        questions,
        time_limit_minutes: column(row, "time_limit_minutes")?,
        reward_amount: column(row, "reward_amount")?,
        is_active: column(row, "is_active")?,
        start_date: column(row, "start_date")?,
        end_date: column(row, "end_date")?,
    })
}
