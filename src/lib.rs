// Simple Banking System - Core Library
// Card issuing, PIN login, balances and transfers over a local SQLite file

pub mod account;
pub mod config;
pub mod db;
pub mod error;
pub mod luhn;
pub mod session;

// Re-export commonly used types
pub use account::{
    Account, generate_card_number, generate_pin, mask_card_number,
    validate_card_number, validate_pin,
};
pub use config::BankConfig;
pub use db::{AccountStore, Event, EventType, setup_database};
pub use error::{BankError, BankResult};
pub use luhn::{compute_check_digit, is_valid};
pub use session::{Session, open_account};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
