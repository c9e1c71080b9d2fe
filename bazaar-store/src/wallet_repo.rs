use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use bazaar_core::repository::WalletRepository;
use bazaar_core::withdrawal::{available_balance, BankDetails, PaymentSetting};
use bazaar_core::{
    Account, CoreError, CoreResult, Reference, TransactionFilter, WalletTransaction, Withdrawal, WithdrawalError,
    WithdrawalStatus,
};
use bazaar_shared::Masked;

use crate::account_repo::PaymentSettingRow;
use crate::database::{db_err, from_text, to_text};
use crate::ledger::{self, TransactionRow, TRANSACTION_COLUMNS};

pub struct StoreWalletRepository {
    pool: PgPool,
}

impl StoreWalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct WithdrawalRow {
    id: Uuid,
    merchant_id: Uuid,
    amount: Decimal,
    account_holder_name: String,
    bank_name: String,
    account_number: String,
    ifsc: String,
    payment_setting_id: Option<Uuid>,
    status: String,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl TryFrom<WithdrawalRow> for Withdrawal {
    type Error = CoreError;

    fn try_from(row: WithdrawalRow) -> CoreResult<Self> {
        Ok(Withdrawal {
            id: row.id,
            merchant_id: row.merchant_id,
            amount: row.amount,
            bank: BankDetails {
                account_holder_name: row.account_holder_name,
                bank_name: row.bank_name,
                account_number: Masked(row.account_number),
                ifsc: row.ifsc,
            },
            payment_setting_id: row.payment_setting_id,
            status: from_text(&row.status)?,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            reviewed_at: row.reviewed_at,
        })
    }
}

async fn outstanding(conn: &mut PgConnection, user_id: Uuid, exclude: Option<Uuid>) -> CoreResult<Decimal> {
    sqlx::query_scalar::<_, Decimal>(
        r#"
        SELECT COALESCE(SUM(amount), 0) FROM withdrawals
        WHERE merchant_id = $1 AND status IN ('pending', 'processing')
          AND ($2::uuid IS NULL OR id <> $2)
        "#,
    )
    .bind(user_id)
    .bind(exclude)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_err)
}

async fn lock_withdrawal(conn: &mut PgConnection, id: Uuid) -> CoreResult<Withdrawal> {
    sqlx::query_as::<_, WithdrawalRow>("SELECT * FROM withdrawals WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| CoreError::not_found("withdrawal", id))
        .and_then(Withdrawal::try_from)
}

async fn pending_line(conn: &mut PgConnection, id: Uuid) -> CoreResult<WalletTransaction> {
    sqlx::query_as::<_, TransactionRow>(&format!(
        "SELECT {} FROM wallet_transactions WHERE reference_kind = 'withdrawal' AND reference_id = $1 AND status = 'pending' FOR UPDATE",
        TRANSACTION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?
    .ok_or_else(|| CoreError::InternalError(format!("Withdrawal {} has no pending ledger line", id)))
    .and_then(WalletTransaction::try_from)
}

async fn save_review(conn: &mut PgConnection, w: &Withdrawal) -> CoreResult<()> {
    sqlx::query("UPDATE withdrawals SET status = $2, rejection_reason = $3, reviewed_at = $4 WHERE id = $1")
        .bind(w.id)
        .bind(to_text(&w.status))
        .bind(&w.rejection_reason)
        .bind(w.reviewed_at)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

#[async_trait]
impl WalletRepository for StoreWalletRepository {
    async fn balance(&self, account: Account) -> CoreResult<Decimal> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        match account {
            Account::System => sqlx::query_scalar::<_, Decimal>("SELECT system_balance FROM platform_settings WHERE id = 1")
                .fetch_one(&mut *conn)
                .await
                .map_err(db_err),
            Account::User(id) => sqlx::query_scalar::<_, Decimal>("SELECT balance FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(db_err)?
                .ok_or_else(|| CoreError::not_found("user", id)),
        }
    }

    async fn list_transactions(&self, filter: &TransactionFilter) -> CoreResult<Vec<WalletTransaction>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM wallet_transactions WHERE TRUE", TRANSACTION_COLUMNS));
        match filter.account {
            Some(Account::User(id)) => {
                qb.push(" AND user_id = ").push_bind(id);
            }
            Some(Account::System) => {
                qb.push(" AND user_id IS NULL");
            }
            None => {}
        }
        if let Some(t) = filter.transaction_type {
            qb.push(" AND transaction_type = ").push_bind(to_text(&t));
        }
        if let Some(s) = filter.status {
            qb.push(" AND status = ").push_bind(to_text(&s));
        }
        if let Some(Reference { kind, id }) = filter.reference {
            qb.push(" AND reference_kind = ").push_bind(to_text(&kind));
            qb.push(" AND reference_id = ").push_bind(id);
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at <= ").push_bind(to);
        }
        qb.push(" ORDER BY created_at DESC");

        qb.build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(WalletTransaction::try_from)
            .collect()
    }

    async fn outstanding_withdrawals(&self, user_id: Uuid, exclude: Option<Uuid>) -> CoreResult<Decimal> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        outstanding(&mut conn, user_id, exclude).await
    }

    async fn create_withdrawal(&self, withdrawal: &Withdrawal, pending: &WalletTransaction) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let balance = ledger::lock_balance(&mut tx, Account::User(withdrawal.merchant_id)).await?;
        let available = available_balance(balance, outstanding(&mut tx, withdrawal.merchant_id, None).await?);
        if withdrawal.amount > available {
            return Err(WithdrawalError::InsufficientBalance { available, requested: withdrawal.amount }.into());
        }

        sqlx::query(
            r#"
            INSERT INTO withdrawals
                (id, merchant_id, amount, account_holder_name, bank_name, account_number, ifsc,
                 payment_setting_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(withdrawal.id)
        .bind(withdrawal.merchant_id)
        .bind(withdrawal.amount)
        .bind(&withdrawal.bank.account_holder_name)
        .bind(&withdrawal.bank.bank_name)
        .bind(withdrawal.bank.account_number.expose())
        .bind(&withdrawal.bank.ifsc)
        .bind(withdrawal.payment_setting_id)
        .bind(to_text(&withdrawal.status))
        .bind(withdrawal.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        ledger::insert_transaction(&mut tx, pending).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn get_withdrawal(&self, id: Uuid) -> CoreResult<Option<Withdrawal>> {
        sqlx::query_as::<_, WithdrawalRow>("SELECT * FROM withdrawals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(Withdrawal::try_from)
            .transpose()
    }

    async fn list_withdrawals(
        &self,
        merchant_id: Option<Uuid>,
        status: Option<WithdrawalStatus>,
    ) -> CoreResult<Vec<Withdrawal>> {
        sqlx::query_as::<_, WithdrawalRow>(
            r#"
            SELECT * FROM withdrawals
            WHERE ($1::uuid IS NULL OR merchant_id = $1) AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(merchant_id)
        .bind(status.map(|s| to_text(&s)))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(Withdrawal::try_from)
        .collect()
    }

    async fn mark_withdrawal_processing(&self, id: Uuid) -> CoreResult<Withdrawal> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut withdrawal = lock_withdrawal(&mut tx, id).await?;
        withdrawal.check_reviewable()?;
        withdrawal.status = WithdrawalStatus::Processing;
        save_review(&mut tx, &withdrawal).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(withdrawal)
    }

    async fn approve_withdrawal(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<Withdrawal> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut withdrawal = lock_withdrawal(&mut tx, id).await?;
        let account = Account::User(withdrawal.merchant_id);

        let setting = sqlx::query_as::<_, PaymentSettingRow>(
            "SELECT * FROM payment_settings WHERE user_id = $1 AND status = 'approved' ORDER BY created_at DESC LIMIT 1",
        )
        .bind(withdrawal.merchant_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .map(PaymentSetting::try_from)
        .transpose()?;

        let balance = ledger::lock_balance(&mut tx, account).await?;
        let others = outstanding(&mut tx, withdrawal.merchant_id, Some(id)).await?;
        withdrawal.check_approvable(setting.as_ref(), balance, others)?;

        let mut line = pending_line(&mut tx, id).await?;
        let after = withdrawal.approve(&mut line, balance, at);

        ledger::write_balance(&mut tx, account, after).await?;
        ledger::update_transaction(&mut tx, &line).await?;
        save_review(&mut tx, &withdrawal).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(withdrawal)
    }

    async fn reject_withdrawal(&self, id: Uuid, reason: &str, at: DateTime<Utc>) -> CoreResult<Withdrawal> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let mut withdrawal = lock_withdrawal(&mut tx, id).await?;
        withdrawal.check_reviewable()?;
        let mut line = pending_line(&mut tx, id).await?;
        withdrawal.reject(&mut line, reason, at)?;

        ledger::update_transaction(&mut tx, &line).await?;
        save_review(&mut tx, &withdrawal).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(withdrawal)
    }
}
