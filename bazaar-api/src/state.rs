use std::sync::Arc;

use tokio::sync::broadcast;

use bazaar_commerce::{CommerceRepository, CommerceService};
use bazaar_core::otp::{LogOtpSender, OtpSender};
use bazaar_core::repository::{AccountRepository, WalletRepository};
use bazaar_core::WithdrawalDesk;
use bazaar_shared::models::events::DomainEvent;
use bazaar_store::{
    DbClient, MemoryStore, RedisClient, StoreAccountRepository, StoreCommerceRepository, StoreTaxiRepository,
    StoreTravelRepository, StoreWalletRepository,
};
use bazaar_taxi::{TaxiRepository, TaxiService};
use bazaar_travel::{TravelRepository, TravelService};

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

/// One handle per persistence seam.
#[derive(Clone)]
pub struct Repositories {
    pub accounts: Arc<dyn AccountRepository>,
    pub wallet: Arc<dyn WalletRepository>,
    pub travel: Arc<dyn TravelRepository>,
    pub taxi: Arc<dyn TaxiRepository>,
    pub commerce: Arc<dyn CommerceRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            accounts: store.clone(),
            wallet: store.clone(),
            travel: store.clone(),
            taxi: store.clone(),
            commerce: store,
        }
    }

    pub fn postgres(db: &DbClient) -> Self {
        Self {
            accounts: Arc::new(StoreAccountRepository::new(db.pool.clone())),
            wallet: Arc::new(StoreWalletRepository::new(db.pool.clone())),
            travel: Arc::new(StoreTravelRepository::new(db.pool.clone())),
            taxi: Arc::new(StoreTaxiRepository::new(db.pool.clone())),
            commerce: Arc::new(StoreCommerceRepository::new(db.pool.clone())),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountRepository>,
    pub wallet: Arc<dyn WalletRepository>,
    pub travel: Arc<TravelService>,
    pub taxi: Arc<TaxiService>,
    pub commerce: Arc<CommerceService>,
    pub withdrawals: Arc<WithdrawalDesk>,
    pub otp_sender: Arc<dyn OtpSender>,
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit_per_minute: i64,
    pub events: broadcast::Sender<DomainEvent>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(repos: Repositories, auth: AuthConfig) -> Result<Self, prometheus::Error> {
        let (events, _) = broadcast::channel(100);
        Ok(Self {
            travel: Arc::new(TravelService::new(repos.travel, repos.accounts.clone(), repos.wallet.clone())),
            taxi: Arc::new(TaxiService::new(repos.taxi, repos.accounts.clone())),
            commerce: Arc::new(CommerceService::new(repos.commerce, repos.accounts.clone())),
            withdrawals: Arc::new(WithdrawalDesk::new(repos.accounts.clone(), repos.wallet.clone())),
            accounts: repos.accounts,
            wallet: repos.wallet,
            otp_sender: Arc::new(LogOtpSender),
            redis: None,
            rate_limit_per_minute: 100,
            events,
            metrics: Arc::new(Metrics::new()?),
            auth,
        })
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, per_minute: i64) -> Self {
        self.redis = Some(redis);
        self.rate_limit_per_minute = per_minute;
        self
    }

    /// Counts the event and hands it to live subscribers. Having no
    /// subscribers is normal.
    pub fn publish(&self, event: DomainEvent) {
        self.metrics.record_event(event.name());
        tracing::debug!(event = event.name(), "Domain event published");
        let _ = self.events.send(event);
    }
}
