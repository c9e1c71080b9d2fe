pub mod models;
pub mod money;
pub mod pii;

pub use money::{percent_of, round_money, sum_money};
pub use pii::{mask_phone, Masked};
