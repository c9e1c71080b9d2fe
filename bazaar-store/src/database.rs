use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use bazaar_core::CoreError;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Unique violations become `Conflict` and dangling references a validation
/// error; everything else is internal.
pub(crate) fn db_err(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => return CoreError::Conflict(db.message().to_string()),
            Some("23503") => {
                let target = db.constraint().unwrap_or("reference");
                return CoreError::ValidationError(format!("Unknown value for {}", target));
            }
            _ => {}
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::InternalError(err.to_string())
}

/// Enums are stored as their serde string form.
pub(crate) fn to_text<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => String::new(),
    }
}

pub(crate) fn from_text<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, CoreError> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|e| CoreError::InternalError(format!("Unexpected stored value {:?}: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_commerce::OrderStatus;
    use bazaar_travel::SeatSide;

    #[test]
    fn test_text_codec() {
        assert_eq!(to_text(&OrderStatus::Shipped), "shipped");
        assert_eq!(to_text(&SeatSide::B), "B");
        let status: OrderStatus = from_text("refunded").unwrap();
        assert_eq!(status, OrderStatus::Refunded);
        assert!(from_text::<OrderStatus>("lost").is_err());
    }
}
