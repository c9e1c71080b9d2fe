use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_core::withdrawal::{available_balance, ApprovalStatus, PaymentMethodType, PaymentSetting, WithdrawalRequest};
use bazaar_core::{
    Account, CoreError, TransactionFilter, TransactionStatus, TransactionType, WalletTransaction, Withdrawal,
    WithdrawalStatus,
};

use crate::error::{ApiResult, AppError};
use crate::middleware::auth::{require_user, Claims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/wallet", get(summary))
        .route("/v1/wallet/transactions", get(transactions))
        .route("/v1/withdrawals", get(list_withdrawals).post(request_withdrawal))
        .route("/v1/withdrawals/{id}", get(withdrawal_detail))
        .route("/v1/payment-settings", get(list_payment_settings).post(create_payment_setting))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

#[derive(Debug, Serialize)]
struct WalletSummary {
    balance: Decimal,
    outstanding_withdrawals: Decimal,
    available: Decimal,
}

async fn summary(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<Json<WalletSummary>> {
    let balance = state.wallet.balance(Account::User(claims.sub)).await?;
    let outstanding = state.wallet.outstanding_withdrawals(claims.sub, None).await?;
    Ok(Json(WalletSummary {
        balance,
        outstanding_withdrawals: outstanding,
        available: available_balance(balance, outstanding),
    }))
}

#[derive(Debug, Deserialize)]
struct TransactionQuery {
    transaction_type: Option<TransactionType>,
    status: Option<TransactionStatus>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
}

async fn transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<TransactionQuery>,
) -> ApiResult<Json<Vec<WalletTransaction>>> {
    let filter = TransactionFilter {
        account: Some(Account::User(claims.sub)),
        transaction_type: q.transaction_type,
        status: q.status,
        reference: None,
        from: q.from,
        to: q.to,
    };
    Ok(Json(state.wallet.list_transactions(&filter).await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct WithdrawalQuery {
    pub status: Option<WithdrawalStatus>,
}

async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(q): Query<WithdrawalQuery>,
) -> ApiResult<Json<Vec<Withdrawal>>> {
    Ok(Json(state.withdrawals.list_for(claims.sub, q.status).await?))
}

async fn request_withdrawal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<WithdrawalRequest>,
) -> ApiResult<Json<Withdrawal>> {
    Ok(Json(state.withdrawals.request(claims.sub, req).await?))
}

async fn withdrawal_detail(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Withdrawal>> {
    Ok(Json(state.withdrawals.get_for(claims.sub, id).await?))
}

#[derive(Debug, Deserialize)]
struct NewPaymentSetting {
    method: PaymentMethodType,
    details: serde_json::Value,
}

async fn list_payment_settings(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<Vec<PaymentSetting>>> {
    Ok(Json(state.accounts.list_payment_settings(Some(claims.sub)).await?))
}

/// New settings wait for admin approval before payouts may use them.
async fn create_payment_setting(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewPaymentSetting>,
) -> ApiResult<Json<PaymentSetting>> {
    if !req.details.is_object() {
        return Err(AppError::Validation("Payment details must be an object".into()));
    }
    let setting = PaymentSetting {
        id: Uuid::new_v4(),
        user_id: claims.sub,
        method: req.method,
        details: req.details,
        status: ApprovalStatus::Pending,
        created_at: Utc::now(),
    };
    if setting.method == PaymentMethodType::BankAccount {
        setting.bank_details().map_err(CoreError::from)?;
    }
    state.accounts.create_payment_setting(&setting).await?;
    tracing::info!(setting_id = %setting.id, user_id = %claims.sub, "Payment setting submitted");
    Ok(Json(setting))
}
