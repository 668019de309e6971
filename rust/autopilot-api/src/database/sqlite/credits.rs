use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, Row, params};

use super::{SqliteStore, sql_limit};
use crate::database::repository::CreditRepository;
use crate::database::schema::{format_ts, parse_ts};
use crate::domain::{
    CreditBalance, CreditGrant, CreditTransaction, GrantOutcome, TransactionType, plan_credit,
    plan_debit,
};

fn ensure_balance_row(conn: &Connection, tenant_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO credit_balances (tenant_id, updated_at) VALUES (?1, ?2)",
        params![tenant_id, format_ts(Utc::now())],
    )?;
    Ok(())
}

fn load_balance(conn: &Connection, tenant_id: &str) -> anyhow::Result<CreditBalance> {
    ensure_balance_row(conn, tenant_id)?;
    let (subscription_credits, top_up_credits, total_credits_used, is_unlimited, updated_at) = conn
        .query_row(
            "SELECT subscription_credits, top_up_credits, total_credits_used, is_unlimited, updated_at
             FROM credit_balances WHERE tenant_id = ?1",
            params![tenant_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;

    Ok(CreditBalance {
        tenant_id: tenant_id.to_string(),
        subscription_credits,
        top_up_credits,
        total_credits_used,
        is_unlimited,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn store_balance(conn: &Connection, balance: &CreditBalance) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE credit_balances
         SET subscription_credits = ?2, top_up_credits = ?3, total_credits_used = ?4,
             is_unlimited = ?5, updated_at = ?6
         WHERE tenant_id = ?1",
        params![
            balance.tenant_id,
            balance.subscription_credits,
            balance.top_up_credits,
            balance.total_credits_used,
            balance.is_unlimited,
            format_ts(balance.updated_at)
        ],
    )?;
    Ok(())
}

fn insert_transaction(conn: &Connection, tx: &CreditTransaction) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO credit_transactions
         (id, tenant_id, amount, transaction_type, description, balance_after, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tx.id,
            tx.tenant_id,
            tx.amount,
            tx.transaction_type.as_str(),
            tx.description,
            tx.balance_after,
            format_ts(tx.created_at)
        ],
    )?;
    Ok(())
}

fn transaction_from_row(row: &Row<'_>) -> anyhow::Result<CreditTransaction> {
    let transaction_type: String = row.get(3)?;
    let created_at: String = row.get(6)?;
    Ok(CreditTransaction {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        amount: row.get(2)?,
        transaction_type: transaction_type
            .parse::<TransactionType>()
            .map_err(anyhow::Error::msg)?,
        description: row.get(4)?,
        balance_after: row.get(5)?,
        created_at: parse_ts(&created_at)?,
    })
}

#[async_trait]
impl CreditRepository for SqliteStore {
    async fn get_balance(&self, tenant_id: &str) -> anyhow::Result<CreditBalance> {
        let tenant_id = tenant_id.to_string();
        self.blocking(move |conn| load_balance(conn, &tenant_id)).await
    }

    async fn apply_debit(
        &self,
        tenant_id: &str,
        amount: i64,
        transaction_type: TransactionType,
        description: &str,
    ) -> anyhow::Result<CreditTransaction> {
        let tenant_id = tenant_id.to_string();
        let description = description.to_string();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let balance = load_balance(&tx, &tenant_id)?;
            let next = plan_debit(&balance, amount)?;
            store_balance(&tx, &next)?;

            let entry = CreditTransaction::new(
                tenant_id,
                -amount,
                transaction_type,
                description,
                next.available(),
            );
            insert_transaction(&tx, &entry)?;
            tx.commit()?;
            Ok(entry)
        })
        .await
    }

    async fn apply_grant(
        &self,
        tenant_id: &str,
        grant: &CreditGrant,
    ) -> anyhow::Result<GrantOutcome> {
        let tenant_id = tenant_id.to_string();
        let grant = grant.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let mut balance = load_balance(&tx, &tenant_id)?;
            if let Some(unlimited) = grant.unlimited {
                balance.is_unlimited = unlimited;
                balance.updated_at = Utc::now();
            }

            let mut entry = None;
            if let Some(amount) = grant.amount {
                balance = plan_credit(&balance, amount, grant.transaction_type)?;
                let credit = CreditTransaction::new(
                    tenant_id.as_str(),
                    amount,
                    grant.transaction_type,
                    grant.description,
                    balance.available(),
                );
                insert_transaction(&tx, &credit)?;
                entry = Some(credit);
            }

            store_balance(&tx, &balance)?;
            tx.commit()?;
            Ok(GrantOutcome {
                transaction: entry,
                balance,
            })
        })
        .await
    }

    async fn list_transactions(
        &self,
        tenant_id: &str,
        limit: usize,
        offset: usize,
    ) -> anyhow::Result<Vec<CreditTransaction>> {
        let tenant_id = tenant_id.to_string();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, amount, transaction_type, description, balance_after, created_at
                 FROM credit_transactions WHERE tenant_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let mut rows = stmt.query(params![tenant_id, sql_limit(limit), sql_limit(offset)])?;
            let mut transactions = Vec::new();
            while let Some(row) = rows.next()? {
                transactions.push(transaction_from_row(row)?);
            }
            Ok(transactions)
        })
        .await
    }
}
