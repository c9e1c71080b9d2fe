pub mod account_repo;
pub mod app_config;
pub mod commerce_repo;
pub mod database;
mod ledger;
pub mod memory;
pub mod redis_repo;
pub mod taxi_repo;
pub mod travel_repo;
pub mod wallet_repo;

pub use account_repo::StoreAccountRepository;
pub use app_config::{Config, StorageBackend};
pub use commerce_repo::StoreCommerceRepository;
pub use database::DbClient;
pub use memory::MemoryStore;
pub use redis_repo::RedisClient;
pub use taxi_repo::StoreTaxiRepository;
pub use travel_repo::StoreTravelRepository;
pub use wallet_repo::StoreWalletRepository;
