//! Referral, client, finance and commission tracking for mortgage brokers.
//!
//! Every entity is read and written through a [`store::RowStore`]. When
//! the store is unprovisioned or refuses the signed-in broker, lists fall
//! back to bundled sample rows and mutations answer with demo records so
//! the app stays usable.

pub mod availability;
pub mod commission_rates;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod embed;
pub mod entity;
pub mod error;
pub mod fetch;
pub mod id;
pub mod list_state;
pub mod logging;
pub mod migrate;
pub mod model_finance;
pub mod model_referral;
pub mod notify;
pub mod operations;
pub mod referral_mapper;
pub mod resource;
pub mod sample;
pub mod session;
pub mod state;
pub mod store;
pub mod time;
pub mod util;

pub use error::{AppError, AppResult};
pub use logging::init_logging;
pub use state::AppState;
