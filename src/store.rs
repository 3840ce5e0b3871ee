//! Payment status storage
//!
//! Paid flags are keyed by `(card id, statement period)`. A missing entry
//! means unpaid. The engines read through [`PaymentStatusStore`] on every
//! call and never keep their own copy, so a store reset between calls is
//! visible immediately.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::warn;

use crate::calendar::PeriodKey;
use crate::error::TrackerError;

/// Key-value access to paid flags, owned by an external collaborator.
pub trait PaymentStatusStore {
    /// Whether the statement is recorded as paid; `false` when absent
    fn is_paid(&self, card_id: &str, period: &PeriodKey) -> Result<bool, TrackerError>;

    /// Record the paid flag for a statement
    fn set_paid(&mut self, card_id: &str, period: &PeriodKey, paid: bool)
    -> Result<(), TrackerError>;
}

/// Flat key used by the JSON form of the store: `<card id>_<YYYY-MM-DD>`.
pub fn status_key(card_id: &str, period: &PeriodKey) -> String {
    format!("{card_id}_{period}")
}

/// Splits a flat status key back into its parts.
///
/// Also accepts the older `<card id>_<year>_<zero-based month>_<day>` form.
/// Those keys may hold a date rolled past a short month's end; see
/// [`crate::calendar::realign_rolled_over`].
pub fn parse_status_key(key: &str) -> Option<(String, PeriodKey)> {
    if let Some((card_id, period)) = key.rsplit_once('_') {
        if let Ok(period) = period.parse::<PeriodKey>() {
            return Some((card_id.to_string(), period));
        }
    }

    let mut parts = key.rsplitn(4, '_');
    let day: u32 = parts.next()?.parse().ok()?;
    let month0: u32 = parts.next()?.parse().ok()?;
    let year: i32 = parts.next()?.parse().ok()?;
    let card_id = parts.next()?;
    let closing = NaiveDate::from_ymd_opt(year, month0.checked_add(1)?, day)?;
    Some((card_id.to_string(), PeriodKey::from_closing(closing)))
}

/// In-memory store, loadable from the JSON map the web app persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusStore {
    statuses: HashMap<(String, PeriodKey), bool>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{"<card>_<period>": bool}`. Malformed JSON yields an empty store.
    pub fn from_json(json: &str) -> Self {
        let raw: HashMap<String, bool> = match serde_json::from_str(json) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed payment status JSON");
                return Self::new();
            }
        };

        let mut store = Self::new();
        for (key, paid) in raw {
            match parse_status_key(&key) {
                Some(entry) => {
                    store.statuses.insert(entry, paid);
                }
                None => warn!(key = %key, "Skipping unrecognised payment status key"),
            }
        }
        store
    }

    pub fn to_json(&self) -> String {
        let flat: HashMap<String, bool> = self
            .statuses
            .iter()
            .map(|((card_id, period), paid)| (status_key(card_id, period), *paid))
            .collect();
        serde_json::to_string(&flat).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &PeriodKey, bool)> {
        self.statuses
            .iter()
            .map(|((card_id, period), paid)| (card_id.as_str(), period, *paid))
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn clear(&mut self) {
        self.statuses.clear();
    }
}

impl PaymentStatusStore for MemoryStatusStore {
    fn is_paid(&self, card_id: &str, period: &PeriodKey) -> Result<bool, TrackerError> {
        Ok(self
            .statuses
            .get(&(card_id.to_string(), *period))
            .copied()
            .unwrap_or(false))
    }

    fn set_paid(
        &mut self,
        card_id: &str,
        period: &PeriodKey,
        paid: bool,
    ) -> Result<(), TrackerError> {
        self.statuses.insert((card_id.to_string(), *period), paid);
        Ok(())
    }
}
