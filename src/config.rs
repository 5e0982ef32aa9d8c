// Store configuration
// Built by the caller (the CLI maps its flags onto it) and handed to AccountStore::open.

use crate::account::ISSUER_PREFIX_LENGTH;
use crate::error::{BankError, BankResult};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankConfig {
    /// SQLite file, created on first use
    pub database_path: PathBuf,

    /// BIN shared by every card this store issues
    pub issuer_prefix: String,

    /// Upper bound on card-number regeneration when inserts collide
    pub max_create_attempts: u32,

    /// Use the WAL journal for file-backed stores
    pub wal: bool,
}

impl Default for BankConfig {
    fn default() -> Self {
        BankConfig {
            database_path: PathBuf::from("card.s3db"),
            issuer_prefix: "400000".to_string(),
            max_create_attempts: 10_000,
            wal: true,
        }
    }
}

impl BankConfig {
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn with_issuer_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.issuer_prefix = prefix.into();
        self
    }

    pub fn validate(&self) -> BankResult<()> {
        let prefix = &self.issuer_prefix;
        if prefix.len() != ISSUER_PREFIX_LENGTH || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BankError::InvalidIssuerPrefix(prefix.clone()));
        }
        if self.max_create_attempts == 0 {
            return Err(BankError::CardSpaceExhausted(0));
        }
        Ok(())
    }
}
