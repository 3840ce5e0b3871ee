use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use tracing::warn;

use crate::calendar::{self, PeriodKey};
use crate::catalog::ReferenceData;
use crate::error::TrackerError;
use crate::models::{Category, HeldCard, SpendingProfile};
use crate::settings::Settings;
use crate::store::{MemoryStatusStore, PaymentStatusStore};

const SETTINGS_KEY: &str = "settings";

/// Creates tables on the given connection.
pub fn init_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS held_cards (
            card_id         TEXT PRIMARY KEY,
            is_active       INTEGER NOT NULL DEFAULT 1,
            credit_limit    TEXT,
            added_date      TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS payment_statuses (
            card_id         TEXT NOT NULL,
            period_key      TEXT NOT NULL,
            paid            INTEGER NOT NULL,
            PRIMARY KEY (card_id, period_key)
        );
        CREATE TABLE IF NOT EXISTS spending_profile (
            category        TEXT PRIMARY KEY,
            amount          TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS settings (
            key             TEXT PRIMARY KEY,
            value           TEXT NOT NULL
        );",
    )?;
    Ok(())
}

/// Opens (or creates) the SQLite database file and ensures tables exist.
pub fn init_db(path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    init_tables(&conn)?;
    Ok(conn)
}

/// Adds a catalog card to the collection. Returns `false` if it is already held.
pub fn add_held_card(
    conn: &Connection,
    reference: &ReferenceData,
    card_id: &str,
    added_date: NaiveDate,
) -> Result<bool, TrackerError> {
    if reference.card(card_id).is_none() {
        return Err(TrackerError::unknown_card(card_id));
    }
    let changed = conn.execute(
        "INSERT OR IGNORE INTO held_cards (card_id, is_active, added_date) VALUES (?1, 1, ?2)",
        params![card_id, added_date.to_string()],
    )?;
    Ok(changed > 0)
}

struct HeldCardRow {
    card_id: String,
    is_active: bool,
    credit_limit: Option<String>,
    added_date: String,
}

/// Resolves a stored row against the catalog. Rows that no longer resolve
/// are skipped.
fn resolve_row(reference: &ReferenceData, row: HeldCardRow) -> Option<HeldCard> {
    let Some(card) = reference.card(&row.card_id) else {
        warn!(card_id = %row.card_id, "Skipping held card missing from catalog");
        return None;
    };
    let added_date = match NaiveDate::from_str(&row.added_date) {
        Ok(date) => date,
        Err(e) => {
            warn!(card_id = %row.card_id, error = %e, "Skipping held card with bad added date");
            return None;
        }
    };
    let credit_limit = row.credit_limit.and_then(|s| match Decimal::from_str(&s) {
        Ok(limit) => Some(limit),
        Err(e) => {
            warn!(card_id = %row.card_id, error = %e, "Ignoring unparsable credit limit");
            None
        }
    });
    Some(HeldCard {
        card: card.clone(),
        is_active: row.is_active,
        credit_limit,
        added_date,
    })
}

/// Held cards in the order they were added.
pub fn list_held_cards(
    conn: &Connection,
    reference: &ReferenceData,
) -> Result<Vec<HeldCard>, TrackerError> {
    let mut stmt = conn.prepare(
        "SELECT card_id, is_active, credit_limit, added_date FROM held_cards ORDER BY rowid",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(HeldCardRow {
            card_id: row.get(0)?,
            is_active: row.get(1)?,
            credit_limit: row.get(2)?,
            added_date: row.get(3)?,
        })
    })?;

    let mut cards = Vec::new();
    for row in rows {
        if let Some(card) = resolve_row(reference, row?) {
            cards.push(card);
        }
    }
    Ok(cards)
}

pub fn get_held_card(
    conn: &Connection,
    reference: &ReferenceData,
    card_id: &str,
) -> Result<Option<HeldCard>, TrackerError> {
    let row = conn
        .query_row(
            "SELECT card_id, is_active, credit_limit, added_date FROM held_cards WHERE card_id = ?1",
            params![card_id],
            |row| {
                Ok(HeldCardRow {
                    card_id: row.get(0)?,
                    is_active: row.get(1)?,
                    credit_limit: row.get(2)?,
                    added_date: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row.and_then(|row| resolve_row(reference, row)))
}

/// Removes a held card together with its payment statuses.
pub fn remove_held_card(conn: &Connection, card_id: &str) -> Result<bool, TrackerError> {
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute("DELETE FROM held_cards WHERE card_id = ?1", params![card_id])?;
    tx.execute(
        "DELETE FROM payment_statuses WHERE card_id = ?1",
        params![card_id],
    )?;
    tx.commit()?;
    Ok(changed > 0)
}

pub fn set_card_active(conn: &Connection, card_id: &str, active: bool) -> Result<bool, TrackerError> {
    let changed = conn.execute(
        "UPDATE held_cards SET is_active = ?2 WHERE card_id = ?1",
        params![card_id, active],
    )?;
    Ok(changed > 0)
}

pub fn set_credit_limit(
    conn: &Connection,
    card_id: &str,
    limit: Option<Decimal>,
) -> Result<bool, TrackerError> {
    let changed = conn.execute(
        "UPDATE held_cards SET credit_limit = ?2 WHERE card_id = ?1",
        params![card_id, limit.map(|l| l.to_string())],
    )?;
    Ok(changed > 0)
}

/// Sets the monthly spend for a category. Zero removes the entry.
pub fn set_spend(conn: &Connection, category: Category, amount: Decimal) -> Result<(), TrackerError> {
    if amount.is_zero() {
        conn.execute(
            "DELETE FROM spending_profile WHERE category = ?1",
            params![category.id()],
        )?;
    } else {
        conn.execute(
            "INSERT INTO spending_profile (category, amount) VALUES (?1, ?2)
             ON CONFLICT(category) DO UPDATE SET amount = excluded.amount",
            params![category.id(), amount.to_string()],
        )?;
    }
    Ok(())
}

pub fn load_spending_profile(conn: &Connection) -> Result<SpendingProfile, TrackerError> {
    let mut stmt = conn.prepare("SELECT category, amount FROM spending_profile")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

    let mut profile = SpendingProfile::new();
    for row in rows {
        let (category, amount) = row?;
        match (category.parse::<Category>(), Decimal::from_str(&amount)) {
            (Ok(category), Ok(amount)) => profile.set(category, amount),
            _ => warn!(%category, %amount, "Skipping unreadable spending entry"),
        }
    }
    Ok(profile)
}

/// Stored settings, or the defaults when none are saved or they don't parse.
pub fn load_settings(conn: &Connection) -> Result<Settings, TrackerError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![SETTINGS_KEY],
            |row| row.get(0),
        )
        .optional()?;

    let Some(raw) = raw else {
        return Ok(Settings::default());
    };
    match serde_json::from_str::<Settings>(&raw) {
        Ok(settings) if settings.validate().is_ok() => Ok(settings),
        Ok(_) => {
            warn!("Stored settings are out of range, using defaults");
            Ok(Settings::default())
        }
        Err(e) => {
            warn!(error = %e, "Stored settings are malformed, using defaults");
            Ok(Settings::default())
        }
    }
}

pub fn save_settings(conn: &Connection, settings: &Settings) -> Result<(), TrackerError> {
    settings.validate()?;
    let json = serde_json::to_string(settings)?;
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![SETTINGS_KEY, json],
    )?;
    Ok(())
}

pub fn reset_settings(conn: &Connection) -> Result<(), TrackerError> {
    conn.execute("DELETE FROM settings WHERE key = ?1", params![SETTINGS_KEY])?;
    Ok(())
}

/// Imports a `{"<card id>_<period>": bool}` map. Malformed input imports
/// nothing. Returns the number of statuses written.
///
/// Entries for catalog cards are checked against the card's closing
/// schedule. Dates that rolled past a short month are moved back to its
/// clamped closing; anything else off schedule is skipped.
pub fn import_statuses_json(
    conn: &Connection,
    reference: &ReferenceData,
    json: &str,
) -> Result<usize, TrackerError> {
    let parsed = MemoryStatusStore::from_json(json);
    let mut store = SqliteStatusStore::new(conn);
    let mut written = 0;
    for (card_id, period, paid) in parsed.entries() {
        let period = match reference.card(card_id) {
            Some(card) => {
                let day = card.closing_day()?;
                let closing = calendar::realign_rolled_over(period.closing_date(), day)?;
                if !calendar::is_on_schedule(closing, day)? {
                    warn!(card_id, period = %period, "Skipping payment status off the closing schedule");
                    continue;
                }
                PeriodKey::from_closing(closing)
            }
            None => *period,
        };
        store.set_paid(card_id, &period, paid)?;
        written += 1;
    }
    Ok(written)
}

/// Payment statuses in the `payment_statuses` table. Every call hits the
/// database.
pub struct SqliteStatusStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStatusStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl PaymentStatusStore for SqliteStatusStore<'_> {
    fn is_paid(&self, card_id: &str, period: &PeriodKey) -> Result<bool, TrackerError> {
        let paid: Option<bool> = self
            .conn
            .query_row(
                "SELECT paid FROM payment_statuses WHERE card_id = ?1 AND period_key = ?2",
                params![card_id, period.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(paid.unwrap_or(false))
    }

    fn set_paid(
        &mut self,
        card_id: &str,
        period: &PeriodKey,
        paid: bool,
    ) -> Result<(), TrackerError> {
        self.conn.execute(
            "INSERT INTO payment_statuses (card_id, period_key, paid) VALUES (?1, ?2, ?3)
             ON CONFLICT(card_id, period_key) DO UPDATE SET paid = excluded.paid",
            params![card_id, period.to_string(), paid],
        )?;
        Ok(())
    }
}
