use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};

use anyhow::Result as AnyResult;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use genz_core::{LedgerError, Quiz, Submission, UserAccount};
use genz_ledger::{NewMember, NewSubmission, RewardsLedger, WithdrawalRequest};
use genz_platform::{
    AccountVerification, AdminStats, ApproveSubmissionRequest, ApproveSubmissionResponse,
    CategoryRateView, CommissionView, CreateNoticeRequest, CreateQuizRequest,
    CreateWithdrawalRequest, DailyReportRequest, DailyReportResponse, DashboardStats,
    EnrollMemberRequest, LeaderboardEntry, LevelStat, MemberView, NoticeView, PgLedgerStore,
    PendingSubmissionView, QUIZ_COLUMNS, QuizQuestionView, QuizResultResponse, QuizView,
    ReferralSummary, RejectSubmissionRequest, ReminderView, SUBMISSION_COLUMNS, ServiceConfig,
    SubmissionView, SubmitFileRequest, SubmitQuizRequest, USER_COLUMNS,
    UpsertCategoryRateRequest, VerifyAccountsRequest, WithdrawalView, apply_schema,
    connect_database, quiz_from_row, submission_from_row, user_from_row,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Deserialize;
use sqlx::{PgPool, Row};
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_VERIFY_UIDS: usize = 1000;
const LEADERBOARD_SIZE: i64 = 10;
const RECENT_COMMISSIONS: i64 = 10;
const NOTICE_AUDIENCES: [&str; 3] = ["all", "premium", "admin"];
const NOTICE_KINDS: [&str; 4] = ["info", "warning", "success", "error"];

#[derive(Clone)]
struct AppState {
    pool: PgPool,
    ledger: RewardsLedger,
}

#[derive(Debug, Clone, Deserialize)]
struct AdminQuery {
    admin_user_id: Uuid,
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "genz_gateway=info,genz_ledger=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:8080")?;
    let pool = connect_database(&config.database_url, config.max_connections).await?;
    apply_schema(&pool).await?;

    let mut ledger = RewardsLedger::new(Arc::new(PgLedgerStore::new(pool.clone())));
    if let Some(rate) = config.default_rate_per_unit {
        ledger = ledger.with_default_rate(rate);
    }
    info!(
        default_rate = %ledger.default_rate(),
        schedule = ledger.schedule().name(),
        "rewards ledger configured"
    );

    let state = AppState { pool, ledger };
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/members", post(enroll_member))
        .route("/members/{user_id}/dashboard", get(member_dashboard))
        .route("/members/{user_id}/submissions", get(list_member_submissions))
        .route("/members/{user_id}/referrals", get(referral_summary))
        .route("/members/{user_id}/withdrawals", get(list_member_withdrawals))
        .route("/members/{user_id}/notices", get(list_member_notices))
        .route("/categories", get(list_categories))
        .route("/categories/{category}", put(upsert_category_rate))
        .route("/submissions", post(submit_file))
        .route("/withdrawals", post(create_withdrawal))
        .route("/quiz/daily", get(daily_quiz))
        .route("/quiz/leaderboard", get(quiz_leaderboard))
        .route("/quiz/{quiz_id}/attempts", post(submit_quiz_attempt))
        .route("/reminders/daily", get(daily_reminder))
        .route("/accounts/verify", post(verify_accounts))
        .route("/admin/stats", get(admin_stats))
        .route("/admin/submissions/pending", get(list_pending_submissions))
        .route(
            "/admin/submissions/{submission_id}/approve",
            post(approve_submission),
        )
        .route(
            "/admin/submissions/{submission_id}/reject",
            post(reject_submission),
        )
        .route("/admin/quizzes", post(create_quiz))
        .route("/admin/notices", post(create_notice))
        .route("/admin/daily-report", post(create_daily_report))
        .with_state(state);

    let addr: SocketAddr = config.http_addr.parse()?;
    info!("rewards gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn enroll_member(
    State(state): State<AppState>,
    Json(payload): Json<EnrollMemberRequest>,
) -> Result<Json<MemberView>, (StatusCode, String)> {
    let user = state
        .ledger
        .enroll(NewMember {
            username: payload.username,
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            referred_by: payload.referred_by,
        })
        .await
        .map_err(ledger_error)?;

    Ok(Json(member_view(user)))
}

async fn member_dashboard(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<DashboardStats>, (StatusCode, String)> {
    let row = sqlx::query(
        r#"
        SELECT
            u.balance,
            u.total_earned,
            u.total_withdrawn,
            (SELECT COUNT(*)::BIGINT FROM submissions s WHERE s.user_id = u.id) AS total_submissions,
            (SELECT COUNT(*)::BIGINT FROM submissions s WHERE s.user_id = u.id AND s.status = 'approved') AS approved_submissions
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await
    .map_err(internal_error)?;

    let Some(row) = row else {
        return Err((StatusCode::NOT_FOUND, "user not found".to_string()));
    };

    Ok(Json(DashboardStats {
        balance: row.try_get("balance").map_err(internal_error)?,
        total_earned: row.try_get("total_earned").map_err(internal_error)?,
        total_withdrawn: row.try_get("total_withdrawn").map_err(internal_error)?,
        total_submissions: row.try_get("total_submissions").map_err(internal_error)?,
        approved_submissions: row
            .try_get("approved_submissions")
            .map_err(internal_error)?,
    }))
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryRateView>>, (StatusCode, String)> {
    let rows = sqlx::query(
        r#"
        SELECT category, subcategory, rate, is_active, updated_at
        FROM category_rates
        WHERE is_active
        ORDER BY category
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    rows.iter()
        .map(category_rate_view)
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
}

async fn upsert_category_rate(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Json(payload): Json<UpsertCategoryRateRequest>,
) -> Result<Json<CategoryRateView>, (StatusCode, String)> {
    require_admin(&state.pool, payload.admin_user_id).await?;

    let category = category.trim();
    if category.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "category is required".to_string()));
    }
    if payload.rate < Decimal::ZERO {
        return Err((
            StatusCode::BAD_REQUEST,
            "rate must not be negative".to_string(),
        ));
    }

    let row = sqlx::query(
        r#"
        INSERT INTO category_rates (category, subcategory, rate, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        ON CONFLICT (category) DO UPDATE
        SET subcategory = EXCLUDED.subcategory,
            rate = EXCLUDED.rate,
            is_active = EXCLUDED.is_active,
            updated_at = EXCLUDED.updated_at
        RETURNING category, subcategory, rate, is_active, updated_at
        "#,
    )
    .bind(category)
    .bind(&payload.subcategory)
    .bind(payload.rate.round_dp(2))
    .bind(payload.is_active)
    .bind(Utc::now())
    .fetch_one(&state.pool)
    .await
    .map_err(internal_error)?;

    let view = category_rate_view(&row)?;
    info!(
        category = %view.category,
        rate = %view.rate,
        active = view.is_active,
        "category rate updated"
    );
    Ok(Json(view))
}

async fn submit_file(
    State(state): State<AppState>,
    Json(payload): Json<SubmitFileRequest>,
) -> Result<Json<SubmissionView>, (StatusCode, String)> {
    let submission = state
        .ledger
        .submit(NewSubmission {
            user_id: payload.user_id,
            filename: payload.filename,
            category: payload.category,
            subcategory: payload.subcategory,
            submitted_count: payload.submitted_count,
            content: payload.content,
            submission_method: payload.submission_method,
        })
        .await
        .map_err(ledger_error)?;

    Ok(Json(submission_view(submission)))
}

async fn list_member_submissions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<SubmissionView>>, (StatusCode, String)> {
    let sql = format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE user_id = $1 ORDER BY uploaded_at DESC"
    );
    let rows = sqlx::query(&sql)
        .bind(user_id)
        .fetch_all(&state.pool)
        .await
        .map_err(internal_error)?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        items.push(submission_view(
            submission_from_row(row).map_err(ledger_error)?,
        ));
    }
    Ok(Json(items))
}

async fn list_pending_submissions(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Json<Vec<PendingSubmissionView>>, (StatusCode, String)> {
    require_admin(&state.pool, query.admin_user_id).await?;

    let rows = sqlx::query(
        r#"
        SELECT
            s.id,
            s.user_id,
            COALESCE(u.username, u.first_name, 'Anonymous') AS submitter,
            s.filename,
            s.category,
            s.submitted_count,
            s.content,
            s.file_counter,
            s.uploaded_at
        FROM submissions s
        LEFT JOIN users u ON u.id = s.user_id
        WHERE s.status = 'pending'
        ORDER BY s.uploaded_at DESC
        "#,
    )
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(PendingSubmissionView {
            submission_id: row.try_get("id").map_err(internal_error)?,
            user_id: row.try_get("user_id").map_err(internal_error)?,
            submitter: row.try_get("submitter").map_err(internal_error)?,
            filename: row.try_get("filename").map_err(internal_error)?,
            category: row.try_get("category").map_err(internal_error)?,
            submitted_count: row.try_get("submitted_count").map_err(internal_error)?,
            content: row.try_get("content").map_err(internal_error)?,
            file_counter: row.try_get("file_counter").map_err(internal_error)?,
            uploaded_at: row.try_get("uploaded_at").map_err(internal_error)?,
        });
    }
    Ok(Json(items))
}

async fn approve_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<Uuid>,
    Json(payload): Json<ApproveSubmissionRequest>,
) -> Result<Json<ApproveSubmissionResponse>, (StatusCode, String)> {
    require_admin(&state.pool, payload.admin_user_id).await?;

    let approval = state
        .ledger
        .approve(submission_id, payload.approved_count, payload.admin_notes)
        .await
        .map_err(ledger_error)?;

    let commission_total = approval.commission_total();
    Ok(Json(ApproveSubmissionResponse {
        submission: submission_view(approval.submission),
        commissions: approval
            .commissions
            .into_iter()
            .map(CommissionView::from)
            .collect(),
        commission_total,
    }))
}

async fn reject_submission(
    State(state): State<AppState>,
    Path(submission_id): Path<Uuid>,
    Json(payload): Json<RejectSubmissionRequest>,
) -> Result<Json<SubmissionView>, (StatusCode, String)> {
    require_admin(&state.pool, payload.admin_user_id).await?;

    let submission = state
        .ledger
        .reject(submission_id, payload.admin_notes)
        .await
        .map_err(ledger_error)?;

    Ok(Json(submission_view(submission)))
}

async fn referral_summary(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ReferralSummary>, (StatusCode, String)> {
    let user = fetch_user(&state.pool, user_id).await?;

    let totals = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*)::BIGINT FROM referral_edges WHERE referrer_id = $1 AND level = 1) AS total_referrals,
            (SELECT COALESCE(SUM(amount), 0) FROM commissions WHERE user_id = $1) AS total_commission
        "#,
    )
    .bind(user_id)
    .fetch_one(&state.pool)
    .await
    .map_err(internal_error)?;

    let level_rows = sqlx::query(
        r#"
        SELECT level, COUNT(*)::BIGINT AS referrals, COALESCE(SUM(total_commission), 0) AS earnings
        FROM referral_edges
        WHERE referrer_id = $1
        GROUP BY level
        ORDER BY level
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut levels = Vec::with_capacity(level_rows.len());
    for row in &level_rows {
        levels.push((
            row.try_get::<i32, _>("level").map_err(internal_error)?,
            row.try_get::<i64, _>("referrals").map_err(internal_error)?,
            row.try_get::<Decimal, _>("earnings")
                .map_err(internal_error)?,
        ));
    }

    let recent_rows = sqlx::query(
        r#"
        SELECT id, user_id, from_user_id, amount, level, description, created_at
        FROM commissions
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(RECENT_COMMISSIONS)
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut recent_commissions = Vec::with_capacity(recent_rows.len());
    for row in recent_rows {
        recent_commissions.push(CommissionView {
            commission_id: row.try_get("id").map_err(internal_error)?,
            user_id: row.try_get("user_id").map_err(internal_error)?,
            from_user_id: row.try_get("from_user_id").map_err(internal_error)?,
            amount: row.try_get("amount").map_err(internal_error)?,
            level: row.try_get("level").map_err(internal_error)?,
            description: row.try_get("description").map_err(internal_error)?,
            created_at: row.try_get("created_at").map_err(internal_error)?,
        });
    }

    Ok(Json(ReferralSummary {
        referral_code: user.referral_code,
        total_referrals: totals
            .try_get("total_referrals")
            .map_err(internal_error)?,
        total_commission: totals
            .try_get("total_commission")
            .map_err(internal_error)?,
        level_stats: level_stats(state.ledger.schedule().max_depth(), &levels),
        recent_commissions,
    }))
}

async fn daily_quiz(
    State(state): State<AppState>,
) -> Result<Json<Option<QuizView>>, (StatusCode, String)> {
    let (day_start, day_end) = day_bounds(Utc::now());
    let sql = format!(
        r#"
        SELECT {QUIZ_COLUMNS}
        FROM quizzes
        WHERE is_active AND end_date >= $1 AND start_date <= $2
        ORDER BY start_date DESC
        LIMIT 1
        "#
    );
    let row = sqlx::query(&sql)
        .bind(day_start)
        .bind(day_end)
        .fetch_optional(&state.pool)
        .await
        .map_err(internal_error)?;

    let quiz = row
        .as_ref()
        .map(quiz_from_row)
        .transpose()
        .map_err(ledger_error)?;
    Ok(Json(quiz.map(quiz_view)))
}

async fn create_quiz(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<Json<QuizView>, (StatusCode, String)> {
    require_admin(&state.pool, payload.admin_user_id).await?;
    validate_quiz(&payload).map_err(|message| (StatusCode::BAD_REQUEST, message))?;

    let quiz = Quiz {
        id: Uuid::new_v4(),
        title: payload.title.trim().to_string(),
        description: payload.description,
        questions: payload.questions,
        time_limit_minutes: payload.time_limit_minutes,
        reward_amount: payload.reward_amount.round_dp(2),
        is_active: true,
        start_date: payload.start_date,
        end_date: payload.end_date,
    };

    sqlx::query(
        r#"
        INSERT INTO quizzes (
            id, title, description, questions, time_limit_minutes, reward_amount,
            is_active, start_date, end_date, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(quiz.id)
    .bind(&quiz.title)
    .bind(&quiz.description)
    .bind(sqlx::types::Json(&quiz.questions))
    .bind(quiz.time_limit_minutes)
    .bind(quiz.reward_amount)
    .bind(quiz.is_active)
    .bind(quiz.start_date)
    .bind(quiz.end_date)
    .bind(Utc::now())
    .execute(&state.pool)
    .await
    .map_err(internal_error)?;

    info!(quiz = %quiz.id, title = %quiz.title, "quiz created");
    Ok(Json(quiz_view(quiz)))
}

async fn submit_quiz_attempt(
    State(state): State<AppState>,
    Path(quiz_id): Path<Uuid>,
    Json(payload): Json<SubmitQuizRequest>,
) -> Result<Json<QuizResultResponse>, (StatusCode, String)> {
    let attempt = state
        .ledger
        .submit_quiz_attempt(payload.user_id, quiz_id, payload.answers)
        .await
        .map_err(ledger_error)?;

    Ok(Json(QuizResultResponse {
        attempt_id: attempt.id,
        score: attempt.score,
        total_questions: attempt.total_questions,
        reward_earned: attempt.reward_earned,
        percentage: attempt.percentage(),
    }))
}

async fn quiz_leaderboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, (StatusCode, String)> {
    let (day_start, _) = day_bounds(Utc::now());
    let rows = sqlx::query(
        r#"
        SELECT
            COALESCE(u.username, u.first_name, 'Anonymous') AS username,
            (a.score * 100.0 / NULLIF(a.total_questions, 0))::NUMERIC AS percentage
        FROM quiz_attempts a
        LEFT JOIN users u ON u.id = a.user_id
        WHERE a.completed_at >= $1
        ORDER BY percentage DESC NULLS LAST, a.completed_at ASC
        LIMIT $2
        "#,
    )
    .bind(day_start)
    .bind(LEADERBOARD_SIZE)
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut scores = Vec::with_capacity(rows.len());
    for row in rows {
        scores.push((
            row.try_get::<String, _>("username")
                .map_err(internal_error)?,
            row.try_get::<Option<Decimal>, _>("percentage")
                .map_err(internal_error)?,
        ));
    }
    Ok(Json(rank_leaderboard(scores)))
}

async fn daily_reminder(
    State(state): State<AppState>,
) -> Result<Json<Option<ReminderView>>, (StatusCode, String)> {
    let now = Utc::now();
    let (day_start, day_end) = day_bounds(now);
    let rows = sqlx::query(
        r#"
        SELECT id, title, content, source, display_date, created_at
        FROM islamic_reminders
        WHERE is_active
          AND (display_date IS NULL OR (display_date >= $1 AND display_date < $2))
        ORDER BY created_at DESC
        "#,
    )
    .bind(day_start)
    .bind(day_end)
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut candidates = Vec::with_capacity(rows.len());
    for row in rows {
        candidates.push(ReminderView {
            reminder_id: row.try_get("id").map_err(internal_error)?,
            title: row.try_get("title").map_err(internal_error)?,
            content: row.try_get("content").map_err(internal_error)?,
            source: row.try_get("source").map_err(internal_error)?,
            display_date: row.try_get("display_date").map_err(internal_error)?,
            created_at: row.try_get("created_at").map_err(internal_error)?,
        });
    }
    Ok(Json(pick_daily_reminder(candidates, now)))
}

async fn create_withdrawal(
    State(state): State<AppState>,
    Json(payload): Json<CreateWithdrawalRequest>,
) -> Result<Json<WithdrawalView>, (StatusCode, String)> {
    let withdrawal = state
        .ledger
        .request_withdrawal(WithdrawalRequest {
            user_id: payload.user_id,
            amount: payload.amount,
            payment_method: payload.payment_method,
            payment_details: payload.payment_details,
        })
        .await
        .map_err(ledger_error)?;

    Ok(Json(WithdrawalView {
        withdrawal_id: withdrawal.id,
        user_id: withdrawal.user_id,
        amount: withdrawal.amount,
        payment_method: withdrawal.payment_method,
        payment_details: withdrawal.payment_details,
        status: withdrawal.status.as_str().to_string(),
        requested_at: withdrawal.requested_at,
    }))
}

async fn list_member_withdrawals(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<WithdrawalView>>, (StatusCode, String)> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, amount, payment_method, payment_details, status, requested_at
        FROM withdrawals
        WHERE user_id = $1
        ORDER BY requested_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(WithdrawalView {
            withdrawal_id: row.try_get("id").map_err(internal_error)?,
            user_id: row.try_get("user_id").map_err(internal_error)?,
            amount: row.try_get("amount").map_err(internal_error)?,
            payment_method: row.try_get("payment_method").map_err(internal_error)?,
            payment_details: row.try_get("payment_details").map_err(internal_error)?,
            status: row.try_get("status").map_err(internal_error)?,
            requested_at: row.try_get("requested_at").map_err(internal_error)?,
        });
    }
    Ok(Json(items))
}

async fn list_member_notices(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<NoticeView>>, (StatusCode, String)> {
    let user = fetch_user(&state.pool, user_id).await?;
    let audiences: Vec<String> = audiences_for(&user)
        .into_iter()
        .map(str::to_string)
        .collect();

    let rows = sqlx::query(
        r#"
        SELECT id, title, content, kind, target_audience, priority, expires_at, created_at
        FROM notices
        WHERE is_active
          AND target_audience = ANY($1)
          AND (expires_at IS NULL OR expires_at >= $2)
        ORDER BY priority DESC, created_at DESC
        "#,
    )
    .bind(&audiences)
    .bind(Utc::now())
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(NoticeView {
            notice_id: row.try_get("id").map_err(internal_error)?,
            title: row.try_get("title").map_err(internal_error)?,
            content: row.try_get("content").map_err(internal_error)?,
            kind: row.try_get("kind").map_err(internal_error)?,
            target_audience: row.try_get("target_audience").map_err(internal_error)?,
            priority: row.try_get("priority").map_err(internal_error)?,
            expires_at: row.try_get("expires_at").map_err(internal_error)?,
            created_at: row.try_get("created_at").map_err(internal_error)?,
        });
    }
    Ok(Json(items))
}

async fn create_notice(
    State(state): State<AppState>,
    Json(payload): Json<CreateNoticeRequest>,
) -> Result<Json<NoticeView>, (StatusCode, String)> {
    require_admin(&state.pool, payload.admin_user_id).await?;

    let title = payload.title.trim();
    let content = payload.content.trim();
    if title.is_empty() || content.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "title and content are required".to_string(),
        ));
    }
    let kind = one_of(&payload.kind, &NOTICE_KINDS, "kind")?;
    let target_audience = one_of(&payload.target_audience, &NOTICE_AUDIENCES, "target_audience")?;

    let notice = NoticeView {
        notice_id: Uuid::new_v4(),
        title: title.to_string(),
        content: content.to_string(),
        kind: kind.to_string(),
        target_audience: target_audience.to_string(),
        priority: payload.priority,
        expires_at: payload.expires_at,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO notices (
            id, title, content, kind, target_audience, priority, is_active, expires_at, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $8)
        "#,
    )
    .bind(notice.notice_id)
    .bind(&notice.title)
    .bind(&notice.content)
    .bind(&notice.kind)
    .bind(&notice.target_audience)
    .bind(notice.priority)
    .bind(notice.expires_at)
    .bind(notice.created_at)
    .execute(&state.pool)
    .await
    .map_err(internal_error)?;

    info!(notice = %notice.notice_id, audience = %notice.target_audience, "notice published");
    Ok(Json(notice))
}

async fn admin_stats(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Json<AdminStats>, (StatusCode, String)> {
    require_admin(&state.pool, query.admin_user_id).await?;

    let row = sqlx::query(
        r#"
        SELECT
            (SELECT COUNT(*)::BIGINT FROM users) AS total_users,
            (SELECT COUNT(*)::BIGINT FROM users WHERE is_active) AS active_users,
            (SELECT COUNT(*)::BIGINT FROM submissions WHERE status = 'pending') AS pending_submissions,
            (SELECT COALESCE(SUM(total_earned), 0) FROM users) AS total_earnings,
            (SELECT COUNT(*)::BIGINT FROM category_rates WHERE is_active) AS active_categories
        "#,
    )
    .fetch_one(&state.pool)
    .await
    .map_err(internal_error)?;

    Ok(Json(AdminStats {
        total_users: row.try_get("total_users").map_err(internal_error)?,
        active_users: row.try_get("active_users").map_err(internal_error)?,
        pending_submissions: row
            .try_get("pending_submissions")
            .map_err(internal_error)?,
        total_earnings: row.try_get("total_earnings").map_err(internal_error)?,
        active_categories: row.try_get("active_categories").map_err(internal_error)?,
    }))
}

async fn verify_accounts(
    State(state): State<AppState>,
    Json(payload): Json<VerifyAccountsRequest>,
) -> Result<Json<BTreeMap<String, AccountVerification>>, (StatusCode, String)> {
    if payload.uids.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "uids are required".to_string()));
    }
    if payload.uids.len() > MAX_VERIFY_UIDS {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("at most {MAX_VERIFY_UIDS} uids per request"),
        ));
    }
    let report_date = payload
        .report_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let rows = sqlx::query(
        r#"
        SELECT uid, status, category, admin_notes
        FROM account_reports
        WHERE uid = ANY($1) AND report_date = $2 AND is_active
        "#,
    )
    .bind(&payload.uids)
    .bind(report_date)
    .fetch_all(&state.pool)
    .await
    .map_err(internal_error)?;

    let mut reports = Vec::with_capacity(rows.len());
    for row in rows {
        reports.push(ReportRow {
            uid: row.try_get("uid").map_err(internal_error)?,
            status: row.try_get("status").map_err(internal_error)?,
            category: row.try_get("category").map_err(internal_error)?,
            notes: row.try_get("admin_notes").map_err(internal_error)?,
        });
    }

    Ok(Json(verification_results(
        &payload.uids,
        reports,
        report_date,
    )))
}

async fn create_daily_report(
    State(state): State<AppState>,
    Json(payload): Json<DailyReportRequest>,
) -> Result<Json<DailyReportResponse>, (StatusCode, String)> {
    require_admin(&state.pool, payload.admin_user_id).await?;
    let report_date = payload
        .report_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let mut tx = state.pool.begin().await.map_err(internal_error)?;
    sqlx::query("DELETE FROM account_reports WHERE report_date = $1")
        .bind(report_date)
        .execute(&mut *tx)
        .await
        .map_err(internal_error)?;

    let now = Utc::now();
    let mut recorded = 0;
    for account in &payload.good_accounts {
        let uid = account.uid.trim();
        if uid.is_empty() {
            warn!(%report_date, "skipping good account with empty uid");
            continue;
        }
        sqlx::query(
            r#"
            INSERT INTO account_reports (
                id, uid, category, status, admin_notes, report_date, is_active, created_at
            )
            VALUES ($1, $2, $3, 'good', $4, $5, TRUE, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(uid)
        .bind(account.category.as_deref().unwrap_or("unknown"))
        .bind(account.notes.as_deref().unwrap_or(""))
        .bind(report_date)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(internal_error)?;
        recorded += 1;
    }
    tx.commit().await.map_err(internal_error)?;

    info!(%report_date, recorded, "daily account report stored");
    Ok(Json(DailyReportResponse {
        report_date,
        accounts_recorded: recorded,
    }))
}

async fn fetch_user(pool: &PgPool, user_id: Uuid) -> Result<UserAccount, (StatusCode, String)> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    let row = sqlx::query(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(internal_error)?;

    let Some(row) = row else {
        return Err((StatusCode::NOT_FOUND, "user not found".to_string()));
    };
    user_from_row(&row).map_err(ledger_error)
}

async fn require_admin(pool: &PgPool, user_id: Uuid) -> Result<(), (StatusCode, String)> {
    let is_admin = sqlx::query("SELECT is_admin FROM users WHERE id = $1 AND is_active")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(internal_error)?
        .map(|row| row.try_get::<bool, _>("is_admin"))
        .transpose()
        .map_err(internal_error)?
        .unwrap_or(false);

    if !is_admin {
        warn!(user = %user_id, "admin access denied");
        return Err((StatusCode::FORBIDDEN, "admin access required".to_string()));
    }
    Ok(())
}

fn category_rate_view(row: &sqlx::postgres::PgRow) -> Result<CategoryRateView, (StatusCode, String)> {
    Ok(CategoryRateView {
        category: row.try_get("category").map_err(internal_error)?,
        subcategory: row.try_get("subcategory").map_err(internal_error)?,
        rate: row.try_get("rate").map_err(internal_error)?,
        is_active: row.try_get("is_active").map_err(internal_error)?,
        updated_at: row.try_get("updated_at").map_err(internal_error)?,
    })
}

fn member_view(user: UserAccount) -> MemberView {
    MemberView {
        user_id: user.id,
        username: user.username,
        referral_code: user.referral_code,
        referred_by: user.referred_by,
        balance: user.balance,
        total_earned: user.total_earned,
        total_withdrawn: user.total_withdrawn,
        created_at: user.created_at,
    }
}

fn submission_view(submission: Submission) -> SubmissionView {
    SubmissionView {
        submission_id: submission.id,
        user_id: submission.user_id,
        filename: submission.filename,
        category: submission.category,
        subcategory: submission.subcategory,
        submitted_count: submission.submitted_count,
        approved_count: submission.approved_count,
        status: submission.status.as_str().to_string(),
        rate_per_unit: submission.rate_per_unit,
        total_earning: submission.total_earning,
        admin_notes: submission.admin_notes,
        file_counter: submission.file_counter,
        uploaded_at: submission.uploaded_at,
        decided_at: submission.decided_at,
    }
}

fn quiz_view(quiz: Quiz) -> QuizView {
    QuizView {
        quiz_id: quiz.id,
        title: quiz.title,
        description: quiz.description,
        questions: quiz
            .questions
            .into_iter()
            .map(|question| QuizQuestionView {
                prompt: question.prompt,
                options: question.options,
            })
            .collect(),
        time_limit_minutes: quiz.time_limit_minutes,
        reward_amount: quiz.reward_amount,
        start_date: quiz.start_date,
        end_date: quiz.end_date,
    }
}

fn validate_quiz(payload: &CreateQuizRequest) -> Result<(), String> {
    if payload.title.trim().is_empty() {
        return Err("title is required".to_string());
    }
    if payload.questions.is_empty() {
        return Err("at least one question is required".to_string());
    }
    for (index, question) in payload.questions.iter().enumerate() {
        if question.options.len() < 2 {
            return Err(format!("question {index} needs at least two options"));
        }
        if question.answer >= question.options.len() {
            return Err(format!("question {index} answer is out of range"));
        }
    }
    if payload.end_date <= payload.start_date {
        return Err("end_date must be after start_date".to_string());
    }
    if payload.reward_amount < Decimal::ZERO {
        return Err("reward_amount must not be negative".to_string());
    }
    if let Some(limit) = payload.time_limit_minutes
        && limit <= 0
    {
        return Err("time_limit_minutes must be positive".to_string());
    }
    Ok(())
}

/// Start of the UTC day containing `now` and start of the next one.
fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);
    (start, start + Duration::days(1))
}

/// A reminder scheduled for today wins over an undated one; within each
/// group the newest is taken.
fn pick_daily_reminder(
    candidates: Vec<ReminderView>,
    now: DateTime<Utc>,
) -> Option<ReminderView> {
    let (day_start, day_end) = day_bounds(now);
    let mut undated = None;
    let mut dated = None;
    for reminder in candidates {
        match reminder.display_date {
            Some(date) if date >= day_start && date < day_end => {
                if dated
                    .as_ref()
                    .is_none_or(|best: &ReminderView| reminder.created_at > best.created_at)
                {
                    dated = Some(reminder);
                }
            }
            Some(_) => {}
            None => {
                if undated
                    .as_ref()
                    .is_none_or(|best: &ReminderView| reminder.created_at > best.created_at)
                {
                    undated = Some(reminder);
                }
            }
        }
    }
    dated.or(undated)
}

fn rank_leaderboard(scores: Vec<(String, Option<Decimal>)>) -> Vec<LeaderboardEntry> {
    scores
        .into_iter()
        .enumerate()
        .map(|(index, (username, percentage))| LeaderboardEntry {
            rank: index as i64 + 1,
            username,
            percentage: percentage
                .unwrap_or_default()
                .round()
                .to_i64()
                .unwrap_or_default(),
        })
        .collect()
}

fn level_stats(max_depth: i32, levels: &[(i32, i64, Decimal)]) -> BTreeMap<String, LevelStat> {
    let mut stats: BTreeMap<String, LevelStat> = (1..=max_depth)
        .map(|level| (format!("level{level}"), LevelStat::default()))
        .collect();
    for (level, count, earnings) in levels {
        stats.insert(
            format!("level{level}"),
            LevelStat {
                count: *count,
                earnings: earnings.round_dp(2),
            },
        );
    }
    stats
}

fn audiences_for(user: &UserAccount) -> Vec<&'static str> {
    let mut audiences = vec!["all"];
    if user.is_premium {
        audiences.push("premium");
    }
    if user.is_admin {
        audiences.push("admin");
    }
    audiences
}

fn one_of(
    value: &str,
    allowed: &[&'static str],
    field: &str,
) -> Result<&'static str, (StatusCode, String)> {
    let normalized = value.trim().to_ascii_lowercase();
    allowed
        .iter()
        .copied()
        .find(|candidate| *candidate == normalized)
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("{field} must be one of {}", allowed.join(", ")),
            )
        })
}

struct ReportRow {
    uid: String,
    status: String,
    category: String,
    notes: Option<String>,
}

fn verification_results(
    uids: &[String],
    reports: Vec<ReportRow>,
    report_date: NaiveDate,
) -> BTreeMap<String, AccountVerification> {
    let mut by_uid: BTreeMap<String, ReportRow> = BTreeMap::new();
    for report in reports {
        by_uid.entry(report.uid.clone()).or_insert(report);
    }

    uids.iter()
        .map(|uid| {
            let verification = match by_uid.get(uid) {
                Some(report) => AccountVerification {
                    status: report.status.clone(),
                    found: true,
                    category: Some(report.category.clone()),
                    notes: report.notes.clone(),
                    report_date,
                },
                None => AccountVerification {
                    status: "not_found".to_string(),
                    found: false,
                    category: None,
                    notes: None,
                    report_date,
                },
            };
            (uid.clone(), verification)
        })
        .collect()
}

fn ledger_error(err: LedgerError) -> (StatusCode, String) {
    let status = match &err {
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::InvalidState(_) => StatusCode::CONFLICT,
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::Storage(_) => {
            error!("ledger storage failure: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

fn internal_error<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use genz_core::QuizQuestion;

    use super::*;

    fn quiz_request() -> CreateQuizRequest {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        CreateQuizRequest {
            admin_user_id: Uuid::new_v4(),
            title: "Daily".to_string(),
            description: None,
            questions: vec![QuizQuestion {
                prompt: "2 + 2".to_string(),
                options: vec!["3".to_string(), "4".to_string()],
                answer: 1,
            }],
            time_limit_minutes: Some(10),
            reward_amount: Decimal::new(100, 2),
            start_date: start,
            end_date: start + Duration::days(1),
        }
    }

    #[test]
    fn ledger_errors_map_to_statuses() {
        assert_eq!(
            ledger_error(LedgerError::not_found("submission", "x")).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ledger_error(LedgerError::InvalidState("done".to_string())).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ledger_error(LedgerError::Validation("bad".to_string())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ledger_error(LedgerError::InsufficientBalance {
                requested: Decimal::TEN,
                available: Decimal::ONE,
            })
            .0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ledger_error(LedgerError::Storage(anyhow::anyhow!("connection reset"))).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn quiz_validation_catches_bad_payloads() {
        assert!(validate_quiz(&quiz_request()).is_ok());

        let mut out_of_range = quiz_request();
        out_of_range.questions[0].answer = 2;
        assert!(validate_quiz(&out_of_range).is_err());

        let mut backwards = quiz_request();
        backwards.end_date = backwards.start_date;
        assert!(validate_quiz(&backwards).is_err());

        let mut empty = quiz_request();
        empty.questions.clear();
        assert!(validate_quiz(&empty).is_err());

        let mut negative = quiz_request();
        negative.reward_amount = Decimal::NEGATIVE_ONE;
        assert!(validate_quiz(&negative).is_err());
    }

    #[test]
    fn quiz_view_hides_answers() {
        let request = quiz_request();
        let view = quiz_view(Quiz {
            id: Uuid::new_v4(),
            title: request.title,
            description: None,
            questions: request.questions,
            time_limit_minutes: None,
            reward_amount: Decimal::ZERO,
            is_active: true,
            start_date: request.start_date,
            end_date: request.end_date,
        });
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["questions"][0].get("answer").is_none());
        assert_eq!(json["questions"][0]["options"][1], "4");
    }

    #[test]
    fn day_bounds_cover_the_utc_day() {
        let now = Utc.with_ymd_and_hms(2026, 5, 17, 15, 42, 7).unwrap();
        let (start, end) = day_bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 5, 17, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 5, 18, 0, 0, 0).unwrap());
    }

    fn reminder(display_date: Option<DateTime<Utc>>, created_at: DateTime<Utc>) -> ReminderView {
        ReminderView {
            reminder_id: Uuid::new_v4(),
            title: "Patience".to_string(),
            content: "Indeed, Allah is with the patient.".to_string(),
            source: Some("Quran 2:153".to_string()),
            display_date,
            created_at,
        }
    }

    #[test]
    fn daily_reminder_prefers_todays_over_undated() {
        let now = Utc.with_ymd_and_hms(2026, 5, 17, 15, 42, 7).unwrap();
        let older = now - Duration::days(30);
        let undated_new = reminder(None, now - Duration::hours(1));
        let undated_old = reminder(None, older);
        let today = reminder(
            Some(Utc.with_ymd_and_hms(2026, 5, 17, 6, 0, 0).unwrap()),
            older,
        );
        let tomorrow = reminder(
            Some(Utc.with_ymd_and_hms(2026, 5, 18, 0, 0, 0).unwrap()),
            now,
        );

        let picked = pick_daily_reminder(
            vec![
                tomorrow.clone(),
                undated_new.clone(),
                today.clone(),
                undated_old.clone(),
            ],
            now,
        );
        assert_eq!(picked, Some(today));

        let picked = pick_daily_reminder(vec![undated_old, undated_new.clone(), tomorrow], now);
        assert_eq!(picked, Some(undated_new));

        assert_eq!(pick_daily_reminder(Vec::new(), now), None);
    }

    #[test]
    fn leaderboard_ranks_in_order_and_rounds() {
        let ranked = rank_leaderboard(vec![
            ("amina".to_string(), Some(Decimal::new(10000, 2))),
            ("rafi".to_string(), Some(Decimal::new(6667, 2))),
            ("Anonymous".to_string(), None),
        ]);
        assert_eq!(
            ranked
                .iter()
                .map(|entry| (entry.rank, entry.username.as_str(), entry.percentage))
                .collect::<Vec<_>>(),
            vec![(1, "amina", 100), (2, "rafi", 67), (3, "Anonymous", 0)]
        );
    }

    #[test]
    fn level_stats_fill_missing_levels() {
        let stats = level_stats(5, &[(1, 3, Decimal::new(1550, 2)), (3, 1, Decimal::ONE)]);
        assert_eq!(stats.len(), 5);
        assert_eq!(stats["level1"].count, 3);
        assert_eq!(stats["level1"].earnings, Decimal::new(1550, 2));
        assert_eq!(stats["level2"].count, 0);
        assert_eq!(stats["level3"].earnings, Decimal::ONE);
    }

    #[test]
    fn notice_audiences_follow_flags() {
        let mut user = UserAccount::new(Uuid::new_v4(), Utc::now());
        assert_eq!(audiences_for(&user), vec!["all"]);
        user.is_premium = true;
        user.is_admin = true;
        assert_eq!(audiences_for(&user), vec!["all", "premium", "admin"]);
    }

    #[test]
    fn one_of_normalizes_case() {
        assert_eq!(one_of(" Premium ", &NOTICE_AUDIENCES, "audience").unwrap(), "premium");
        let err = one_of("vip", &NOTICE_AUDIENCES, "audience").unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn verification_marks_unknown_uids() {
        let date = NaiveDate::from_ymd_opt(2026, 4, 2).unwrap();
        let results = verification_results(
            &["100".to_string(), "200".to_string()],
            vec![ReportRow {
                uid: "100".to_string(),
                status: "good".to_string(),
                category: "facebook".to_string(),
                notes: Some(String::new()),
            }],
            date,
        );

        assert_eq!(results.len(), 2);
        assert!(results["100"].found);
        assert_eq!(results["100"].status, "good");
        assert_eq!(results["100"].category.as_deref(), Some("facebook"));
        assert_eq!(
            results["200"],
            AccountVerification {
                status: "not_found".to_string(),
                found: false,
                category: None,
                notes: None,
                report_date: date,
            }
        );
    }
}
