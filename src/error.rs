// Error taxonomy for the card system
//
// Lookups that find nothing are not errors: they come back as Ok(None) / Ok(false).
// Everything here is a definite failure the caller has to handle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BankError {
    /// Not 16 characters, or contains something other than ASCII digits
    #[error("card number must be 16 digits, got {0:?}")]
    MalformedCardNumber(String),

    /// Well-formed but the last digit does not match the Luhn check digit
    #[error("card number {0} fails the Luhn checksum")]
    ChecksumMismatch(String),

    /// PIN values are never echoed back
    #[error("PIN must be exactly 4 digits")]
    MalformedPin,

    #[error("issuer prefix must be 6 digits, got {0:?}")]
    InvalidIssuerPrefix(String),

    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("wrong card number or PIN")]
    WrongCredentials,

    #[error("card {0} does not exist")]
    CardNotFound(String),

    #[error("cannot transfer money to the same account")]
    SameAccount,

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: i64, requested: i64 },

    /// Applying the amount would take the balance outside the i64 range
    #[error("balance of card {0} would overflow")]
    BalanceOverflow(String),

    /// Every generated card number collided with an existing row
    #[error("no unique card number found after {0} attempts")]
    CardSpaceExhausted(u32),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("failed to encode event data: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type BankResult<T> = Result<T, BankError>;
