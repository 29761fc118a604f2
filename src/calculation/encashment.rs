//! Leave encashment eligibility.

use rust_decimal::Decimal;

use crate::config::LeaveTypePolicy;

/// How many days of a balance can be converted to a payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncashmentEligibility {
    /// Whether the leave type allows encashment at all.
    pub allowed: bool,
    /// Days that can still be encashed this year.
    pub eligible_days: Decimal,
    /// Days already encashed this year.
    pub already_encashed: Decimal,
}

/// Computes encashment eligibility for a balance.
///
/// Eligible days are the available balance, further limited by
/// `max_encashment_days` less what was already encashed in the same year.
pub fn encashment_eligibility(
    policy: &LeaveTypePolicy,
    available: Decimal,
    already_encashed: Decimal,
) -> EncashmentEligibility {
    if !policy.allow_encashment {
        return EncashmentEligibility {
            allowed: false,
            eligible_days: Decimal::ZERO,
            already_encashed,
        };
    }

    let remaining_cap = policy
        .max_encashment_days
        .map(|max| (max - already_encashed).max(Decimal::ZERO));
    let available = available.max(Decimal::ZERO);
    let eligible_days = match remaining_cap {
        Some(cap) => available.min(cap),
        None => available,
    };

    EncashmentEligibility {
        allowed: true,
        eligible_days,
        already_encashed,
    }
}
