use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use bazaar_core::{Account, CoreError, CoreResult, Credit, Reference, WalletTransaction};

use crate::database::{db_err, from_text, to_text};

#[derive(sqlx::FromRow)]
pub(crate) struct TransactionRow {
    id: Uuid,
    user_id: Option<Uuid>,
    transaction_type: String,
    amount: Decimal,
    status: String,
    description: String,
    reference_kind: Option<String>,
    reference_id: Option<Uuid>,
    wallet_before: Option<Decimal>,
    wallet_after: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for WalletTransaction {
    type Error = CoreError;

    fn try_from(row: TransactionRow) -> CoreResult<Self> {
        let reference = match (row.reference_kind, row.reference_id) {
            (Some(kind), Some(id)) => Some(Reference { kind: from_text(&kind)?, id }),
            _ => None,
        };
        Ok(WalletTransaction {
            id: row.id,
            account: row.user_id.map_or(Account::System, Account::User),
            transaction_type: from_text(&row.transaction_type)?,
            amount: row.amount,
            status: from_text(&row.status)?,
            description: row.description,
            reference,
            wallet_before: row.wallet_before,
            wallet_after: row.wallet_after,
            created_at: row.created_at,
        })
    }
}

pub(crate) const TRANSACTION_COLUMNS: &str = "id, user_id, transaction_type, amount, status, description, \
     reference_kind, reference_id, wallet_before, wallet_after, created_at";

/// Reads the balance and holds a row lock on it until the transaction ends.
pub(crate) async fn lock_balance(conn: &mut PgConnection, account: Account) -> CoreResult<Decimal> {
    match account {
        Account::System => sqlx::query_scalar::<_, Decimal>("SELECT system_balance FROM platform_settings WHERE id = 1 FOR UPDATE")
            .fetch_one(&mut *conn)
            .await
            .map_err(db_err),
        Account::User(id) => sqlx::query_scalar::<_, Decimal>("SELECT balance FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CoreError::not_found("user", id)),
    }
}

pub(crate) async fn write_balance(conn: &mut PgConnection, account: Account, value: Decimal) -> CoreResult<()> {
    let query = match account {
        Account::System => sqlx::query("UPDATE platform_settings SET system_balance = $1 WHERE id = 1").bind(value),
        Account::User(id) => sqlx::query("UPDATE users SET balance = $1 WHERE id = $2").bind(value).bind(id),
    };
    query.execute(&mut *conn).await.map_err(db_err)?;
    Ok(())
}

pub(crate) async fn insert_transaction(conn: &mut PgConnection, tx: &WalletTransaction) -> CoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO wallet_transactions
            (id, user_id, transaction_type, amount, status, description,
             reference_kind, reference_id, wallet_before, wallet_after, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(tx.id)
    .bind(tx.account.user_id())
    .bind(to_text(&tx.transaction_type))
    .bind(tx.amount)
    .bind(to_text(&tx.status))
    .bind(&tx.description)
    .bind(tx.reference.map(|r| to_text(&r.kind)))
    .bind(tx.reference.map(|r| r.id))
    .bind(tx.wallet_before)
    .bind(tx.wallet_after)
    .bind(tx.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

pub(crate) async fn update_transaction(conn: &mut PgConnection, tx: &WalletTransaction) -> CoreResult<()> {
    sqlx::query(
        r#"
        UPDATE wallet_transactions
        SET transaction_type = $2, status = $3, description = $4, wallet_before = $5, wallet_after = $6
        WHERE id = $1
        "#,
    )
    .bind(tx.id)
    .bind(to_text(&tx.transaction_type))
    .bind(to_text(&tx.status))
    .bind(&tx.description)
    .bind(tx.wallet_before)
    .bind(tx.wallet_after)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// True when a completed ledger line already points at the record.
pub(crate) async fn has_completed(conn: &mut PgConnection, reference: Reference) -> CoreResult<bool> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM wallet_transactions WHERE reference_kind = $1 AND reference_id = $2 AND status = 'completed')",
    )
    .bind(to_text(&reference.kind))
    .bind(reference.id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)
}

/// Applies each credit on top of the locked balance and records the line.
pub(crate) async fn apply_credits(
    conn: &mut PgConnection,
    credits: &[Credit],
    at: DateTime<Utc>,
) -> CoreResult<Vec<WalletTransaction>> {
    let mut written = Vec::with_capacity(credits.len());
    for credit in credits {
        let before = lock_balance(conn, credit.account).await?;
        let (after, tx) = credit.settle(before, at);
        write_balance(conn, credit.account, after).await?;
        insert_transaction(conn, &tx).await?;
        written.push(tx);
    }
    Ok(written)
}
