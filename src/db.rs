use crate::account::{mask_card_number, Account};
use crate::config::BankConfig;
use crate::error::{BankError, BankResult};
use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Audit record for a balance or lifecycle change (one per affected card)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub card_number: String,
    pub amount: i64,
    /// Other side of a transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CardCreated,
    Deposit,
    TransferOut,
    TransferIn,
    CardClosed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::CardCreated => "card_created",
            EventType::Deposit => "deposit",
            EventType::TransferOut => "transfer_out",
            EventType::TransferIn => "transfer_in",
            EventType::CardClosed => "card_closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "card_created" => Some(EventType::CardCreated),
            "deposit" => Some(EventType::Deposit),
            "transfer_out" => Some(EventType::TransferOut),
            "transfer_in" => Some(EventType::TransferIn),
            "card_closed" => Some(EventType::CardClosed),
            _ => None,
        }
    }
}

impl Event {
    pub fn new(event_type: EventType, card_number: &str, amount: i64) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            card_number: card_number.to_string(),
            amount,
            counterparty: None,
            data: serde_json::json!({}),
        }
    }

    pub fn with_counterparty(mut self, counterparty: &str) -> Self {
        self.counterparty = Some(counterparty.to_string());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Idempotent schema creation
pub fn setup_database(conn: &Connection) -> BankResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS card (
            id INTEGER PRIMARY KEY,
            number TEXT NOT NULL UNIQUE,
            pin TEXT NOT NULL,
            balance INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // Audit trail, append-only. Rows survive card deletion.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            card_number TEXT NOT NULL,
            amount INTEGER NOT NULL,
            counterparty TEXT,
            data TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_card ON events(card_number)",
        [],
    )?;

    Ok(())
}

/// Append an event; callers pass the open transaction so it commits or rolls back with the mutation
pub fn insert_event(conn: &Connection, event: &Event) -> BankResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, card_number, amount, counterparty, data
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type.as_str(),
            event.card_number,
            event.amount,
            event.counterparty,
            data_json,
        ],
    )?;

    Ok(())
}

/// Events for one card, oldest first
pub fn get_events_for_card(conn: &Connection, card_number: &str) -> BankResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, card_number, amount, counterparty, data
         FROM events
         WHERE card_number = ?1
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map(params![card_number], |row| {
            let timestamp_str: String = row.get(1)?;
            let event_type_str: String = row.get(2)?;
            let data_json: String = row.get(6)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
                    })?
                    .with_timezone(&Utc),
                event_type: EventType::parse(&event_type_str)
                    .ok_or(rusqlite::Error::InvalidColumnType(
                        2,
                        "event_type".to_string(),
                        rusqlite::types::Type::Text,
                    ))?,
                card_number: row.get(3)?,
                amount: row.get(4)?,
                counterparty: row.get(5)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
                })?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Owner of the single SQLite connection.
///
/// Constructed explicitly and passed to whoever needs it. Every public
/// operation runs in its own transaction that is committed or rolled back
/// before the call returns.
pub struct AccountStore {
    conn: Connection,
    issuer_prefix: String,
    max_create_attempts: u32,
}

impl AccountStore {
    /// Open (creating if absent) the file named by `config.database_path`
    pub fn open(config: &BankConfig) -> BankResult<Self> {
        config.validate()?;
        let conn = Connection::open(&config.database_path)?;
        if config.wal {
            // In-memory and some filesystems answer with a different mode; that is fine
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!(journal_mode = %mode, "journal mode set");
        }
        info!(path = %config.database_path.display(), "opened account store");
        Self::with_connection(conn, config)
    }

    pub fn open_in_memory(config: &BankConfig) -> BankResult<Self> {
        config.validate()?;
        Self::with_connection(Connection::open_in_memory()?, config)
    }

    fn with_connection(conn: Connection, config: &BankConfig) -> BankResult<Self> {
        setup_database(&conn)?;
        Ok(AccountStore {
            conn,
            issuer_prefix: config.issuer_prefix.clone(),
            max_create_attempts: config.max_create_attempts,
        })
    }

    /// Release the connection. Dropping the store also closes it, but this surfaces the error.
    pub fn close(self) -> BankResult<()> {
        self.conn.close().map_err(|(_, e)| BankError::Storage(e))
    }

    /// Run `f` inside a transaction: commit on Ok, roll back on Err.
    fn in_transaction<T, F>(&self, op: &str, f: F) -> BankResult<T>
    where
        F: FnOnce(&Connection) -> BankResult<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        match f(&tx) {
            Ok(value) => {
                if let Err(commit_err) = tx.commit() {
                    warn!(op, error = %commit_err, "commit failed, rolling back");
                    if !self.conn.is_autocommit() {
                        if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                            warn!(op, error = %rollback_err, "rollback failed");
                        }
                    }
                    return Err(commit_err.into());
                }
                Ok(value)
            }
            Err(err) => {
                warn!(op, error = %err, "rolling back");
                if let Err(rollback_err) = tx.rollback() {
                    warn!(op, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    // ========================================================================
    // CREATE
    // ========================================================================

    pub fn create_account(&self) -> BankResult<Account> {
        self.create_account_with(&mut rand::thread_rng())
    }

    /// Generate and insert a new account, regenerating the number whenever the insert is rejected
    pub fn create_account_with<R: Rng + ?Sized>(&self, rng: &mut R) -> BankResult<Account> {
        for attempt in 1..=self.max_create_attempts {
            let account = Account::generate(&self.issuer_prefix, rng)?;

            let inserted = self.in_transaction("create_account", |tx| {
                let rows = tx.execute(
                    "INSERT OR IGNORE INTO card (number, pin, balance) VALUES (?1, ?2, ?3)",
                    params![account.number, account.pin, account.balance],
                )?;
                if rows == 1 {
                    insert_event(tx, &Event::new(EventType::CardCreated, &account.number, 0))?;
                }
                Ok(rows == 1)
            })?;

            if inserted {
                info!(card = %account.masked_number(), attempt, "account created");
                return Ok(account);
            }
            debug!(card = %account.masked_number(), attempt, "card number taken, regenerating");
        }

        Err(BankError::CardSpaceExhausted(self.max_create_attempts))
    }

    // ========================================================================
    // READ
    // ========================================================================

    /// Exact match on number and PIN. This is the only form of login.
    pub fn find_account(&self, card_number: &str, pin: &str) -> BankResult<Option<Account>> {
        let account = self
            .conn
            .query_row(
                "SELECT number, pin, balance FROM card WHERE number = ?1 AND pin = ?2",
                params![card_number, pin],
                |row| {
                    Ok(Account {
                        number: row.get(0)?,
                        pin: row.get(1)?,
                        balance: row.get(2)?,
                    })
                },
            )
            .optional()?;

        debug!(card = %mask_card_number(card_number), found = account.is_some(), "find_account");
        Ok(account)
    }

    pub fn account_exists(&self, card_number: &str) -> BankResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM card WHERE number = ?1",
                params![card_number],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_balance(&self, card_number: &str) -> BankResult<i64> {
        self.conn
            .query_row(
                "SELECT balance FROM card WHERE number = ?1",
                params![card_number],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| BankError::CardNotFound(card_number.to_string()))
    }

    pub fn account_count(&self) -> BankResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM card", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn events_for_card(&self, card_number: &str) -> BankResult<Vec<Event>> {
        get_events_for_card(&self.conn, card_number)
    }

    // ========================================================================
    // MUTATE
    // ========================================================================

    /// Add `amount` to the stored balance; the delta is applied in SQL. Returns the new balance.
    pub fn deposit(&self, card_number: &str, amount: i64) -> BankResult<i64> {
        if amount <= 0 {
            return Err(BankError::InvalidAmount(amount));
        }

        let balance = self.in_transaction("deposit", |tx| {
            credit(tx, card_number, amount)?;
            insert_event(tx, &Event::new(EventType::Deposit, card_number, amount))?;
            Ok(tx.query_row(
                "SELECT balance FROM card WHERE number = ?1",
                params![card_number],
                |row| row.get(0),
            )?)
        })?;

        info!(card = %mask_card_number(card_number), amount, "deposit applied");
        Ok(balance)
    }

    /// Move `amount` from `from_card` to `to_card` in one transaction.
    ///
    /// Sufficient funds, distinct cards and recipient checksum are the
    /// caller's checks. Both rows must exist though: a missing one rolls back
    /// the debit so money is never removed without being credited.
    pub fn transfer(&self, from_card: &str, to_card: &str, amount: i64) -> BankResult<()> {
        if amount <= 0 {
            return Err(BankError::InvalidAmount(amount));
        }

        self.in_transaction("transfer", |tx| {
            debit(tx, from_card, amount)?;
            credit(tx, to_card, amount)?;

            insert_event(
                tx,
                &Event::new(EventType::TransferOut, from_card, amount).with_counterparty(to_card),
            )?;
            insert_event(
                tx,
                &Event::new(EventType::TransferIn, to_card, amount).with_counterparty(from_card),
            )?;
            Ok(())
        })?;

        info!(
            from = %mask_card_number(from_card),
            to = %mask_card_number(to_card),
            amount,
            "transfer committed"
        );
        Ok(())
    }

    /// Remove the card row. Absent cards are not an error.
    pub fn delete_account(&self, card_number: &str) -> BankResult<()> {
        let removed = self.in_transaction("delete_account", |tx| {
            let balance: Option<i64> = tx
                .query_row(
                    "SELECT balance FROM card WHERE number = ?1",
                    params![card_number],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(balance) = balance else {
                return Ok(false);
            };

            tx.execute("DELETE FROM card WHERE number = ?1", params![card_number])?;
            insert_event(
                tx,
                &Event::new(EventType::CardClosed, card_number, 0)
                    .with_data(serde_json::json!({ "final_balance": balance })),
            )?;
            Ok(true)
        })?;

        if removed {
            info!(card = %mask_card_number(card_number), "account closed");
        } else {
            debug!(card = %mask_card_number(card_number), "delete_account: no such card");
        }
        Ok(())
    }
}

// SQLite turns an overflowing INTEGER into REAL without failing the UPDATE,
// so both deltas are bounded in the WHERE clause.

fn credit(conn: &Connection, card_number: &str, amount: i64) -> BankResult<()> {
    let changed = conn.execute(
        "UPDATE card SET balance = balance + ?1 WHERE number = ?2 AND balance <= ?3 - ?1",
        params![amount, card_number, i64::MAX],
    )?;
    if changed != 1 {
        return Err(unchanged_row_error(conn, card_number)?);
    }
    Ok(())
}

fn debit(conn: &Connection, card_number: &str, amount: i64) -> BankResult<()> {
    let changed = conn.execute(
        "UPDATE card SET balance = balance - ?1 WHERE number = ?2 AND balance >= ?3 + ?1",
        params![amount, card_number, i64::MIN],
    )?;
    if changed != 1 {
        return Err(unchanged_row_error(conn, card_number)?);
    }
    Ok(())
}

/// Why a balance UPDATE matched no row: the card is missing or the bound was hit
fn unchanged_row_error(conn: &Connection, card_number: &str) -> BankResult<BankError> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM card WHERE number = ?1",
            params![card_number],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    if exists {
        Ok(BankError::BalanceOverflow(card_number.to_string()))
    } else {
        Ok(BankError::CardNotFound(card_number.to_string()))
    }
}
