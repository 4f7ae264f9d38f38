use chrono::Utc;
use genz_core::{LedgerError, LedgerResult, ReferralEdge, UserAccount};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::RewardsLedger;
use crate::commission::resolve_upline;

#[derive(Debug, Clone, Default)]
pub struct NewMember {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    /// Referral code of the member who invited this one.
    pub referred_by: Option<String>,
}

impl RewardsLedger {
    /// Creates a member and one referral edge per upline ancestor, tagged
    /// with its distance and the schedule rate for that distance.
    ///
    /// Enrolled members never carry the admin flag; admin accounts are
    /// provisioned directly in the users table.
    pub async fn enroll(&self, member: NewMember) -> LedgerResult<UserAccount> {
        let mut tx = self.store.begin().await?;
        let now = Utc::now();

        let mut user = UserAccount::new(Uuid::new_v4(), now);
        user.username = trimmed(member.username);
        user.first_name = trimmed(member.first_name);
        user.last_name = trimmed(member.last_name);
        user.email = trimmed(member.email);
        user.referred_by = trimmed(member.referred_by);

        if let Some(code) = user.referred_by.as_deref()
            && tx.find_user_by_referral_code(code).await?.is_none()
        {
            return Err(LedgerError::Validation(format!(
                "unknown referral code {code}"
            )));
        }

        let upline = resolve_upline(
            tx.as_mut(),
            self.schedule.as_ref(),
            user.id,
            user.referred_by.as_deref(),
        )
        .await?;

        tx.insert_user(&user).await?;
        for step in &upline {
            tx.insert_referral_edge(&ReferralEdge {
                id: Uuid::new_v4(),
                referrer_id: step.ancestor.id,
                referred_id: user.id,
                level: step.level,
                commission_rate: step.rate,
                total_commission: Decimal::ZERO,
                is_active: true,
                created_at: now,
            })
            .await?;
        }
        tx.commit().await?;

        info!(
            user = %user.id,
            referral_code = %user.referral_code,
            upline_depth = upline.len(),
            "member enrolled"
        );
        Ok(user)
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ledger, money};

    fn invited_by(name: &str, code: Option<&str>) -> NewMember {
        NewMember {
            username: Some(name.to_string()),
            referred_by: code.map(str::to_string),
            ..NewMember::default()
        }
    }

    #[tokio::test]
    async fn enrollment_creates_edges_at_true_distance() {
        let (store, ledger) = ledger();
        let mut previous: Option<UserAccount> = None;
        let mut members = Vec::new();
        for index in 0..7 {
            let code = previous.as_ref().map(|user| user.referral_code.clone());
            let user = ledger
                .enroll(invited_by(&format!("m{index}"), code.as_deref()))
                .await
                .unwrap();
            previous = Some(user.clone());
            members.push(user);
        }

        let newest = members.last().unwrap();
        let state = store.snapshot().await;
        let mut edges: Vec<_> = state
            .referral_edges
            .iter()
            .filter(|edge| edge.referred_id == newest.id)
            .collect();
        edges.sort_by_key(|edge| edge.level);

        assert_eq!(
            edges
                .iter()
                .map(|edge| (edge.referrer_id, edge.level, edge.commission_rate))
                .collect::<Vec<_>>(),
            vec![
                (members[5].id, 1, Decimal::new(5, 2)),
                (members[4].id, 2, Decimal::new(3, 2)),
                (members[3].id, 3, Decimal::new(2, 2)),
                (members[2].id, 4, Decimal::new(15, 3)),
                (members[1].id, 5, Decimal::new(1, 2)),
            ]
        );
        assert_eq!(newest.referred_by.as_ref(), Some(&members[5].referral_code));
        assert_eq!(newest.balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn propagation_updates_enrolled_edges() {
        let (store, ledger) = ledger();
        let top = ledger.enroll(invited_by("top", None)).await.unwrap();
        let mid = ledger
            .enroll(invited_by("mid", Some(&top.referral_code)))
            .await
            .unwrap();
        let earner = ledger
            .enroll(invited_by("earner", Some(&mid.referral_code)))
            .await
            .unwrap();

        ledger
            .propagate_commission(earner.id, money(10000))
            .await
            .unwrap();

        let state = store.snapshot().await;
        assert_eq!(state.referral_edges.len(), 3);
        assert_eq!(
            state.edge(mid.id, earner.id).unwrap().total_commission,
            money(500)
        );
        assert_eq!(
            state.edge(top.id, earner.id).unwrap().total_commission,
            money(300)
        );
        assert_eq!(
            state.edge(top.id, mid.id).unwrap().total_commission,
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn unknown_referral_code_is_rejected() {
        let (store, ledger) = ledger();
        let err = ledger
            .enroll(invited_by("stray", Some("GENZ-NOPE0000")))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(store.snapshot().await.users.is_empty());
    }

    #[tokio::test]
    async fn blank_fields_are_dropped() {
        let (_store, ledger) = ledger();
        let user = ledger
            .enroll(NewMember {
                username: Some("  ".to_string()),
                first_name: Some(" Nadia ".to_string()),
                referred_by: Some(String::new()),
                ..NewMember::default()
            })
            .await
            .unwrap();

        assert_eq!(user.username, None);
        assert_eq!(user.first_name.as_deref(), Some("Nadia"));
        assert_eq!(user.referred_by, None);
        assert!(user.referral_code.starts_with("GENZ-"));
    }

    #[tokio::test]
    async fn enrolled_members_are_never_admins() {
        let (store, ledger) = ledger();
        let mut admin = UserAccount::new(Uuid::new_v4(), Utc::now());
        admin.username = Some("ops".to_string());
        admin.is_admin = true;
        store.put_user(admin.clone()).await;

        let member = ledger
            .enroll(invited_by("newcomer", Some(&admin.referral_code)))
            .await
            .unwrap();

        assert!(!member.is_admin);
        let state = store.snapshot().await;
        assert!(!state.users[&member.id].is_admin);
        assert!(state.users[&admin.id].is_admin);
    }
}
