use rust_decimal::{Decimal, RoundingStrategy};

/// Per-level commission rates paid to the upline of a credited user.
pub trait CommissionSchedule: Send + Sync {
    fn name(&self) -> &'static str;
    fn max_depth(&self) -> i32;
    /// Rate as a fraction (0.05 = 5%). `None` past the schedule depth.
    fn rate_for_level(&self, level: i32) -> Option<Decimal>;
}

/// 5% / 3% / 2% / 1.5% / 1% over five levels.
#[derive(Debug, Clone, Default)]
pub struct FiveLevelSchedule;

impl CommissionSchedule for FiveLevelSchedule {
    fn name(&self) -> &'static str {
        "five-level"
    }

    fn max_depth(&self) -> i32 {
        5
    }

    fn rate_for_level(&self, level: i32) -> Option<Decimal> {
        match level {
            1 => Some(Decimal::new(5, 2)),
            2 => Some(Decimal::new(3, 2)),
            3 => Some(Decimal::new(2, 2)),
            4 => Some(Decimal::new(15, 3)),
            5 => Some(Decimal::new(1, 2)),
            _ => None,
        }
    }
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn commission_amount(credited: Decimal, rate: Decimal) -> Decimal {
    round_money(credited * rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_level_rates_are_fixed() {
        let schedule = FiveLevelSchedule;
        let rates: Vec<Decimal> = (1..=5)
            .map(|level| schedule.rate_for_level(level).unwrap())
            .collect();
        assert_eq!(
            rates,
            vec![
                Decimal::new(5, 2),
                Decimal::new(3, 2),
                Decimal::new(2, 2),
                Decimal::new(15, 3),
                Decimal::new(1, 2),
            ]
        );
        assert_eq!(schedule.rate_for_level(0), None);
        assert_eq!(schedule.rate_for_level(6), None);
        assert_eq!(schedule.max_depth(), 5);
    }

    #[test]
    fn commission_rounds_to_cents() {
        assert_eq!(
            commission_amount(Decimal::new(20000, 2), Decimal::new(15, 3)),
            Decimal::new(300, 2)
        );
        // 3.30 * 0.015 = 0.0495
        assert_eq!(
            commission_amount(Decimal::new(330, 2), Decimal::new(15, 3)),
            Decimal::new(5, 2)
        );
        // 0.50 * 0.01 = 0.005
        assert_eq!(
            commission_amount(Decimal::new(50, 2), Decimal::new(1, 2)),
            Decimal::new(1, 2)
        );
    }
}
