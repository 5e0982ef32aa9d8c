// Logged-in card holder
//
// The store trusts its callers on funds, self-transfers and recipient validity.
// Session is the caller that does those checks before touching the store.

use crate::account::{validate_card_number, validate_pin, Account};
use crate::db::{AccountStore, Event};
use crate::error::{BankError, BankResult};
use tracing::info;

pub struct Session<'s> {
    store: &'s AccountStore,
    card_number: String,
}

impl<'s> Session<'s> {
    /// Authenticate by card number and PIN
    pub fn login(store: &'s AccountStore, card_number: &str, pin: &str) -> BankResult<Self> {
        validate_card_number(card_number)?;
        validate_pin(pin)?;

        let account = store
            .find_account(card_number, pin)?
            .ok_or(BankError::WrongCredentials)?;

        info!(card = %account.masked_number(), "logged in");
        Ok(Session {
            store,
            card_number: account.number,
        })
    }

    pub fn card_number(&self) -> &str {
        &self.card_number
    }

    pub fn balance(&self) -> BankResult<i64> {
        self.store.get_balance(&self.card_number)
    }

    /// Deposit into the logged-in account, returning the new balance
    pub fn add_income(&self, amount: i64) -> BankResult<i64> {
        self.store.deposit(&self.card_number, amount)
    }

    /// Checks run in the order a card holder would hit them: recipient first, then amount.
    pub fn transfer(&self, to_card: &str, amount: i64) -> BankResult<()> {
        if to_card == self.card_number {
            return Err(BankError::SameAccount);
        }
        validate_card_number(to_card)?;
        if !self.store.account_exists(to_card)? {
            return Err(BankError::CardNotFound(to_card.to_string()));
        }
        if amount <= 0 {
            return Err(BankError::InvalidAmount(amount));
        }
        let balance = self.balance()?;
        if balance < amount {
            return Err(BankError::InsufficientFunds {
                balance,
                requested: amount,
            });
        }

        self.store.transfer(&self.card_number, to_card, amount)
    }

    pub fn history(&self) -> BankResult<Vec<Event>> {
        self.store.events_for_card(&self.card_number)
    }

    /// Delete the logged-in account and end the session
    pub fn close(self) -> BankResult<()> {
        self.store.delete_account(&self.card_number)
    }
}

/// Issue a new card; the returned account carries the PIN the holder needs to log in
pub fn open_account(store: &AccountStore) -> BankResult<Account> {
    store.create_account()
}
