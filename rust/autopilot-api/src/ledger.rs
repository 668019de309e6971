//! Credit ledger service.
//!
//! Thin layer over [`CreditRepository`] that turns ledger rule violations
//! into [`AppError`]s and logs every balance change.

use std::sync::Arc;

use crate::database::CreditRepository;
use crate::domain::{
    CreditBalance, CreditGrant, CreditTransaction, GrantOutcome, LedgerError, TransactionType,
};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct CreditLedger {
    repo: Arc<dyn CreditRepository>,
}

impl std::fmt::Debug for CreditLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreditLedger").finish_non_exhaustive()
    }
}

impl CreditLedger {
    pub fn new(repo: Arc<dyn CreditRepository>) -> Self {
        Self { repo }
    }

    pub async fn balance(&self, tenant_id: &str) -> AppResult<CreditBalance> {
        Ok(self.repo.get_balance(tenant_id).await?)
    }

    /// Fail with [`AppError::InsufficientCredits`] unless `required` is affordable.
    pub async fn ensure_available(&self, tenant_id: &str, required: i64) -> AppResult<CreditBalance> {
        let balance = self.repo.get_balance(tenant_id).await?;
        if !balance.can_afford(required) {
            return Err(AppError::InsufficientCredits {
                required,
                available: balance.available(),
            });
        }
        Ok(balance)
    }

    /// Spend `amount` credits, subscription bucket first.
    pub async fn debit(
        &self,
        tenant_id: &str,
        amount: i64,
        transaction_type: TransactionType,
        description: &str,
    ) -> AppResult<CreditTransaction> {
        if amount <= 0 {
            return Err(LedgerError::NonPositiveAmount(amount).into());
        }
        let tx = self
            .repo
            .apply_debit(tenant_id, amount, transaction_type, description)
            .await?;
        tracing::info!(
            tenant_id = %tenant_id,
            amount,
            transaction_type = %transaction_type,
            balance_after = tx.balance_after,
            "Credits debited"
        );
        Ok(tx)
    }

    /// Apply an operator grant. `subscription` credits go to the subscription
    /// bucket, everything else to top-up. Nothing changes unless the whole
    /// grant is valid.
    pub async fn grant(&self, tenant_id: &str, grant: &CreditGrant) -> AppResult<GrantOutcome> {
        if grant.transaction_type == TransactionType::Usage {
            return Err(AppError::Validation(
                "usage transactions cannot be granted".to_string(),
            ));
        }
        match (grant.amount, grant.unlimited) {
            (None, None) => {
                return Err(AppError::Validation(
                    "a grant needs an amount, an unlimited flag, or both".to_string(),
                ));
            }
            (Some(amount), _) if amount <= 0 => {
                return Err(LedgerError::NonPositiveAmount(amount).into());
            }
            _ => {}
        }

        let outcome = self.repo.apply_grant(tenant_id, grant).await?;
        tracing::info!(
            tenant_id = %tenant_id,
            amount = ?grant.amount,
            unlimited = ?grant.unlimited,
            transaction_type = %grant.transaction_type,
            balance_after = outcome.balance.available(),
            "Credit grant applied"
        );
        Ok(outcome)
    }

    pub async fn transactions(
        &self,
        tenant_id: &str,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<CreditTransaction>> {
        Ok(self.repo.list_transactions(tenant_id, limit, offset).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteStore;

    fn ledger() -> CreditLedger {
        CreditLedger::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    fn grant(amount: Option<i64>, unlimited: Option<bool>) -> CreditGrant {
        CreditGrant {
            amount,
            transaction_type: TransactionType::Topup,
            description: "grant".to_string(),
            unlimited,
        }
    }

    #[tokio::test]
    async fn test_ensure_available_reports_shortfall() {
        let ledger = ledger();
        ledger.grant("t1", &grant(Some(5), None)).await.unwrap();

        assert!(ledger.ensure_available("t1", 5).await.is_ok());
        let err = ledger.ensure_available("t1", 12).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientCredits {
                required: 12,
                available: 5
            }
        ));
    }

    #[tokio::test]
    async fn test_debit_insufficient_maps_to_app_error() {
        let ledger = ledger();
        let err = ledger
            .debit("t1", 1, TransactionType::Usage, "publish")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientCredits {
                required: 1,
                available: 0
            }
        ));
    }

    #[tokio::test]
    async fn test_non_positive_amounts_rejected() {
        let ledger = ledger();
        assert!(matches!(
            ledger.grant("t1", &grant(Some(0), None)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            ledger.debit("t1", -4, TransactionType::Usage, "x").await,
            Err(AppError::Validation(_))
        ));
        assert!(ledger.transactions("t1", 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_grant_is_rejected_untouched() {
        let ledger = ledger();
        ledger
            .grant("t1", &grant(Some(i64::MAX), None))
            .await
            .unwrap();

        let err = ledger
            .grant("t1", &grant(Some(1), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("overflow")));

        let balance = ledger.balance("t1").await.unwrap();
        assert_eq!(balance.top_up_credits, i64::MAX);
        assert_eq!(ledger.transactions("t1", 10, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_grant_changes_nothing() {
        let ledger = ledger();

        let err = ledger.grant("t1", &grant(Some(0), Some(true))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(matches!(
            ledger.grant("t1", &grant(None, None)).await,
            Err(AppError::Validation(_))
        ));

        let balance = ledger.balance("t1").await.unwrap();
        assert!(!balance.is_unlimited);
        assert_eq!(balance.available(), 0);
    }

    #[tokio::test]
    async fn test_flag_only_grant() {
        let ledger = ledger();
        let outcome = ledger.grant("t1", &grant(None, Some(true))).await.unwrap();
        assert!(outcome.transaction.is_none());
        assert!(outcome.balance.is_unlimited);
        assert!(ledger.transactions("t1", 10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unlimited_tenant_can_always_afford() {
        let ledger = ledger();
        ledger.grant("t1", &grant(None, Some(true))).await.unwrap();
        assert!(ledger.ensure_available("t1", 1_000).await.is_ok());

        let tx = ledger
            .debit("t1", 50, TransactionType::Usage, "publish")
            .await
            .unwrap();
        assert_eq!(tx.amount, -50);
        let balance = ledger.balance("t1").await.unwrap();
        assert_eq!(balance.total_credits_used, 50);
        assert_eq!(balance.available(), 0);
    }
}
