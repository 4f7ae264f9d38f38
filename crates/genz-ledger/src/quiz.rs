use chrono::Utc;
use genz_core::{LedgerError, LedgerResult, QuizAttempt};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::RewardsLedger;

impl RewardsLedger {
    /// Scores a quiz attempt and credits the quiz reward. Rewards are not
    /// commissionable. One attempt per member per quiz.
    pub async fn submit_quiz_attempt(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
        answers: Vec<usize>,
    ) -> LedgerResult<QuizAttempt> {
        let mut tx = self.store.begin().await?;
        let quiz = tx
            .find_quiz(quiz_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("quiz", quiz_id))?;
        // Held until commit so concurrent attempts by the same member queue
        // behind each other and see the recorded attempt.
        if tx.lock_user(user_id).await?.is_none() {
            return Err(LedgerError::not_found("user", user_id));
        }

        let now = Utc::now();
        if !quiz.is_open_at(now) {
            return Err(LedgerError::InvalidState(format!(
                "quiz {quiz_id} is not open"
            )));
        }
        if tx.quiz_attempted(user_id, quiz_id).await? {
            return Err(LedgerError::InvalidState(format!(
                "quiz {quiz_id} was already attempted"
            )));
        }

        let reward = quiz.reward_amount.max(Decimal::ZERO);
        let attempt = QuizAttempt {
            id: Uuid::new_v4(),
            user_id,
            quiz_id,
            score: quiz.score(&answers),
            total_questions: quiz.total_questions(),
            answers,
            reward_earned: reward,
            completed_at: now,
        };
        tx.insert_quiz_attempt(&attempt).await?;
        if reward > Decimal::ZERO {
            tx.credit_user(user_id, reward).await?;
        }
        tx.commit().await?;

        info!(
            user = %user_id,
            quiz = %quiz_id,
            score = attempt.score,
            total = attempt.total_questions,
            %reward,
            "quiz attempt recorded"
        );
        Ok(attempt)
    }
}
