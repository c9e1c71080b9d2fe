use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use bazaar_core::otp::OtpChallenge;
use bazaar_core::repository::AccountRepository;
use bazaar_core::withdrawal::{ApprovalStatus, PaymentSetting};
use bazaar_core::{Address, CoreError, CoreResult, Notification, Place, PlatformSettings, User};

use crate::database::{db_err, from_text, to_text};

pub struct StoreAccountRepository {
    pool: PgPool,
}

impl StoreAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, phone, name, email, country_code, country, is_merchant, is_driver, is_admin, balance, created_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    phone: String,
    name: String,
    email: Option<String>,
    country_code: String,
    country: String,
    is_merchant: bool,
    is_driver: bool,
    is_admin: bool,
    balance: Decimal,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            phone: row.phone,
            name: row.name,
            email: row.email,
            country_code: row.country_code,
            country: row.country,
            is_merchant: row.is_merchant,
            is_driver: row.is_driver,
            is_admin: row.is_admin,
            balance: row.balance,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SettingsRow {
    sales_commission: Decimal,
    shipping_charge_commission: Decimal,
    system_balance: Decimal,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct PaymentSettingRow {
    id: Uuid,
    user_id: Uuid,
    method: String,
    details: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentSettingRow> for PaymentSetting {
    type Error = CoreError;

    fn try_from(row: PaymentSettingRow) -> CoreResult<Self> {
        Ok(PaymentSetting {
            id: row.id,
            user_id: row.user_id,
            method: from_text(&row.method)?,
            details: row.details,
            status: from_text(&row.status)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    full_name: String,
    phone: String,
    address: String,
    city: String,
    state: String,
    zip_code: String,
    latitude: Option<Decimal>,
    longitude: Option<Decimal>,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Address {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            full_name: row.full_name,
            phone: row.phone,
            address: row.address,
            city: row.city,
            state: row.state,
            zip_code: row.zip_code,
            latitude: row.latitude,
            longitude: row.longitude,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    message: String,
    notification_type: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = CoreError;

    fn try_from(row: NotificationRow) -> CoreResult<Self> {
        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            message: row.message,
            notification_type: from_text(&row.notification_type)?,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OtpRow {
    phone: String,
    code: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl AccountRepository for StoreAccountRepository {
    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_phone(&self, phone: &str) -> CoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE phone = $1", USER_COLUMNS))
            .bind(phone)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(User::from))
    }

    async fn create_user(&self, user: &User) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, phone, name, email, country_code, country, is_merchant, is_driver, is_admin, balance, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id)
        .bind(&user.phone)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.country_code)
        .bind(&user.country)
        .bind(user.is_merchant)
        .bind(user.is_driver)
        .bind(user.is_admin)
        .bind(user.balance)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3, country_code = $4, country = $5,
                is_merchant = $6, is_driver = $7, is_admin = $8
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.country_code)
        .bind(&user.country)
        .bind(user.is_merchant)
        .bind(user.is_driver)
        .bind(user.is_admin)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("user", user.id));
        }
        Ok(())
    }

    async fn save_otp(&self, challenge: &OtpChallenge) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_challenges (phone, code, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (phone) DO UPDATE
            SET code = EXCLUDED.code, expires_at = EXCLUDED.expires_at, created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&challenge.phone)
        .bind(&challenge.code)
        .bind(challenge.expires_at)
        .bind(challenge.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn take_otp(&self, phone: &str) -> CoreResult<Option<OtpChallenge>> {
        let row = sqlx::query_as::<_, OtpRow>(
            "DELETE FROM otp_challenges WHERE phone = $1 RETURNING phone, code, expires_at, created_at",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(|r| OtpChallenge {
            phone: r.phone,
            code: r.code,
            expires_at: r.expires_at,
            created_at: r.created_at,
        }))
    }

    async fn get_settings(&self) -> CoreResult<PlatformSettings> {
        let row = sqlx::query_as::<_, SettingsRow>(
            "SELECT sales_commission, shipping_charge_commission, system_balance, updated_at FROM platform_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map_or_else(PlatformSettings::default, |r| PlatformSettings {
            sales_commission: r.sales_commission,
            shipping_charge_commission: r.shipping_charge_commission,
            system_balance: r.system_balance,
            updated_at: r.updated_at,
        }))
    }

    async fn save_commission_rates(&self, settings: &PlatformSettings) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO platform_settings (id, sales_commission, shipping_charge_commission, updated_at)
            VALUES (1, $1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET sales_commission = EXCLUDED.sales_commission,
                shipping_charge_commission = EXCLUDED.shipping_charge_commission,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(settings.sales_commission)
        .bind(settings.shipping_charge_commission)
        .bind(settings.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn create_payment_setting(&self, setting: &PaymentSetting) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO payment_settings (id, user_id, method, details, status, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(setting.id)
        .bind(setting.user_id)
        .bind(to_text(&setting.method))
        .bind(&setting.details)
        .bind(to_text(&setting.status))
        .bind(setting.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn get_payment_setting(&self, id: Uuid) -> CoreResult<Option<PaymentSetting>> {
        sqlx::query_as::<_, PaymentSettingRow>("SELECT * FROM payment_settings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(PaymentSetting::try_from)
            .transpose()
    }

    async fn list_payment_settings(&self, user_id: Option<Uuid>) -> CoreResult<Vec<PaymentSetting>> {
        sqlx::query_as::<_, PaymentSettingRow>(
            "SELECT * FROM payment_settings WHERE ($1::uuid IS NULL OR user_id = $1) ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(PaymentSetting::try_from)
        .collect()
    }

    async fn approved_payment_setting(&self, user_id: Uuid) -> CoreResult<Option<PaymentSetting>> {
        sqlx::query_as::<_, PaymentSettingRow>(
            "SELECT * FROM payment_settings WHERE user_id = $1 AND status = 'approved' ORDER BY created_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(PaymentSetting::try_from)
        .transpose()
    }

    async fn set_payment_setting_status(&self, id: Uuid, status: ApprovalStatus) -> CoreResult<PaymentSetting> {
        sqlx::query_as::<_, PaymentSettingRow>("UPDATE payment_settings SET status = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(to_text(&status))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| CoreError::not_found("payment setting", id))
            .and_then(PaymentSetting::try_from)
    }

    async fn create_place(&self, place: &Place) -> CoreResult<()> {
        sqlx::query("INSERT INTO places (id, name) VALUES ($1, $2)")
            .bind(place.id)
            .bind(&place.name)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_places(&self) -> CoreResult<Vec<Place>> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as("SELECT id, name FROM places ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(|(id, name)| Place { id, name }).collect())
    }

    async fn get_place(&self, id: Uuid) -> CoreResult<Option<Place>> {
        let row: Option<(Uuid, String)> = sqlx::query_as("SELECT id, name FROM places WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|(id, name)| Place { id, name }))
    }

    async fn list_addresses(&self, user_id: Uuid) -> CoreResult<Vec<Address>> {
        let rows = sqlx::query_as::<_, AddressRow>(
            "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn get_address(&self, id: Uuid) -> CoreResult<Option<Address>> {
        let row = sqlx::query_as::<_, AddressRow>("SELECT * FROM addresses WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Address::from))
    }

    async fn save_address(&self, address: &Address) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND id <> $2")
                .bind(address.user_id)
                .bind(address.id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        sqlx::query(
            r#"
            INSERT INTO addresses (
                id, user_id, title, full_name, phone, address, city, state, zip_code,
                latitude, longitude, is_default, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title, full_name = EXCLUDED.full_name, phone = EXCLUDED.phone,
                address = EXCLUDED.address, city = EXCLUDED.city, state = EXCLUDED.state,
                zip_code = EXCLUDED.zip_code, latitude = EXCLUDED.latitude, longitude = EXCLUDED.longitude,
                is_default = EXCLUDED.is_default, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(address.id)
        .bind(address.user_id)
        .bind(&address.title)
        .bind(&address.full_name)
        .bind(&address.phone)
        .bind(&address.address)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.zip_code)
        .bind(address.latitude)
        .bind(address.longitude)
        .bind(address.is_default)
        .bind(address.created_at)
        .bind(address.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)
    }

    async fn delete_address(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("address", id));
        }
        Ok(())
    }

    async fn create_notification(&self, notification: &Notification) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, title, message, notification_type, is_read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(to_text(&notification.notification_type))
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_notifications(&self, user_id: Uuid, unread_only: bool) -> CoreResult<Vec<Notification>> {
        sqlx::query_as::<_, NotificationRow>(
            "SELECT * FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT is_read) ORDER BY created_at DESC",
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(Notification::try_from)
        .collect()
    }

    async fn mark_notifications_read(&self, user_id: Uuid, id: Option<Uuid>) -> CoreResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE \
             WHERE user_id = $1 AND NOT is_read AND ($2::uuid IS NULL OR id = $2)",
        )
        .bind(user_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }
}
