//! Credit balances and the pure arithmetic behind debits and credits.
//!
//! Persistence lives in [`crate::database`]; the functions here only decide
//! what a balance looks like after an operation so they can be tested without
//! a database and applied atomically by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger entry category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Usage,
    Topup,
    Subscription,
    Refund,
    Linkbuilding,
    Image,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usage => "usage",
            Self::Topup => "topup",
            Self::Subscription => "subscription",
            Self::Refund => "refund",
            Self::Linkbuilding => "linkbuilding",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "usage" => Ok(Self::Usage),
            "topup" => Ok(Self::Topup),
            "subscription" => Ok(Self::Subscription),
            "refund" => Ok(Self::Refund),
            "linkbuilding" => Ok(Self::Linkbuilding),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown transaction type '{other}'")),
        }
    }
}

/// Per-tenant credit state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalance {
    pub tenant_id: String,
    pub subscription_credits: i64,
    pub top_up_credits: i64,
    /// Never decreases.
    pub total_credits_used: i64,
    pub is_unlimited: bool,
    pub updated_at: DateTime<Utc>,
}

impl CreditBalance {
    /// Zero balance, as created on a tenant's first access.
    pub fn empty(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            subscription_credits: 0,
            top_up_credits: 0,
            total_credits_used: 0,
            is_unlimited: false,
            updated_at: Utc::now(),
        }
    }

    /// Spendable credits across both buckets.
    ///
    /// Saturates; [`plan_credit`] keeps the sum in range for stored balances.
    pub fn available(&self) -> i64 {
        self.subscription_credits.saturating_add(self.top_up_credits)
    }

    /// Whether a debit of `amount` would succeed.
    pub fn can_afford(&self, amount: i64) -> bool {
        self.is_unlimited || self.available() >= amount
    }
}

/// Append-only journal row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditTransaction {
    pub id: String,
    pub tenant_id: String,
    /// Negative for debits.
    pub amount: i64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub description: String,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    pub fn new(
        tenant_id: impl Into<String>,
        amount: i64,
        transaction_type: TransactionType,
        description: impl Into<String>,
        balance_after: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            amount,
            transaction_type,
            description: description.into(),
            balance_after,
            created_at: Utc::now(),
        }
    }
}

/// An operator grant: an optional credit and an optional change of the
/// unlimited flag, applied together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditGrant {
    pub amount: Option<i64>,
    pub transaction_type: TransactionType,
    pub description: String,
    pub unlimited: Option<bool>,
}

/// Result of an applied [`CreditGrant`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantOutcome {
    /// Present when credits were added.
    pub transaction: Option<CreditTransaction>,
    pub balance: CreditBalance,
}

/// Errors produced by ledger arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: i64, available: i64 },
    #[error("credit amount must be positive, got {0}")]
    NonPositiveAmount(i64),
    #[error("{amount} credits would overflow the balance")]
    Overflow { amount: i64 },
}

/// Apply a debit to `balance`, spending subscription credits first.
///
/// Returns the updated balance and the `balanceAfter` to journal. The input
/// is left untouched on error.
pub fn plan_debit(balance: &CreditBalance, amount: i64) -> Result<CreditBalance, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::NonPositiveAmount(amount));
    }

    let mut next = balance.clone();
    next.total_credits_used = balance
        .total_credits_used
        .checked_add(amount)
        .ok_or(LedgerError::Overflow { amount })?;
    next.updated_at = Utc::now();

    if balance.is_unlimited {
        return Ok(next);
    }

    let available = balance.available();
    if available < amount {
        return Err(LedgerError::InsufficientCredits {
            required: amount,
            available,
        });
    }

    let from_subscription = amount.min(balance.subscription_credits);
    next.subscription_credits -= from_subscription;
    next.top_up_credits -= amount - from_subscription;
    Ok(next)
}

/// Apply a credit of `amount`. Subscription grants land in the subscription
/// bucket, everything else in the top-up bucket.
pub fn plan_credit(
    balance: &CreditBalance,
    amount: i64,
    transaction_type: TransactionType,
) -> Result<CreditBalance, LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::NonPositiveAmount(amount));
    }

    let overflow = LedgerError::Overflow { amount };
    let mut next = balance.clone();
    if transaction_type == TransactionType::Subscription {
        next.subscription_credits = balance
            .subscription_credits
            .checked_add(amount)
            .ok_or(overflow.clone())?;
    } else {
        next.top_up_credits = balance
            .top_up_credits
            .checked_add(amount)
            .ok_or(overflow.clone())?;
    }
    // balanceAfter is the bucket sum, so it must fit too.
    next.subscription_credits
        .checked_add(next.top_up_credits)
        .ok_or(overflow)?;
    next.updated_at = Utc::now();
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(subscription: i64, top_up: i64) -> CreditBalance {
        CreditBalance {
            subscription_credits: subscription,
            top_up_credits: top_up,
            ..CreditBalance::empty("tenant-1")
        }
    }

    #[test]
    fn test_debit_spends_subscription_first() {
        let next = plan_debit(&balance(5, 10), 12).unwrap();
        assert_eq!(next.subscription_credits, 0);
        assert_eq!(next.top_up_credits, 3);
        assert_eq!(next.available(), 3);
        assert_eq!(next.total_credits_used, 12);
    }

    #[test]
    fn test_debit_insufficient() {
        let before = balance(2, 3);
        let err = plan_debit(&before, 6).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientCredits {
                required: 6,
                available: 5
            }
        );
        assert_eq!(before.available(), 5);
    }

    #[test]
    fn test_unlimited_debit_keeps_buckets() {
        let mut before = balance(0, 0);
        before.is_unlimited = true;
        let next = plan_debit(&before, 50).unwrap();
        assert_eq!(next.available(), 0);
        assert_eq!(next.total_credits_used, 50);
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        assert_eq!(
            plan_debit(&balance(5, 5), 0),
            Err(LedgerError::NonPositiveAmount(0))
        );
        assert_eq!(
            plan_credit(&balance(5, 5), -3, TransactionType::Topup),
            Err(LedgerError::NonPositiveAmount(-3))
        );
    }

    #[test]
    fn test_credit_bucket_selection() {
        let start = balance(1, 1);
        let sub = plan_credit(&start, 100, TransactionType::Subscription).unwrap();
        assert_eq!((sub.subscription_credits, sub.top_up_credits), (101, 1));

        let refund = plan_credit(&start, 4, TransactionType::Refund).unwrap();
        assert_eq!((refund.subscription_credits, refund.top_up_credits), (1, 5));
    }

    #[test]
    fn test_credit_overflow_rejected() {
        let full = balance(0, i64::MAX);
        assert_eq!(
            plan_credit(&full, 1, TransactionType::Topup),
            Err(LedgerError::Overflow { amount: 1 })
        );
        // Each bucket fits on its own but the sum does not.
        assert_eq!(
            plan_credit(&full, 1, TransactionType::Subscription),
            Err(LedgerError::Overflow { amount: 1 })
        );

        let mut used_up = balance(0, 0);
        used_up.is_unlimited = true;
        used_up.total_credits_used = i64::MAX;
        assert_eq!(
            plan_debit(&used_up, 1),
            Err(LedgerError::Overflow { amount: 1 })
        );
    }

    #[test]
    fn test_transaction_type_wire_format() {
        let tx = CreditTransaction::new("t", -12, TransactionType::Usage, "publish", 3);
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "usage");
        assert_eq!(json["balanceAfter"], 3);
        assert_eq!(json["amount"], -12);
    }
}
