//! Error types for the tracker
//!
//! Only configuration problems and store failures are errors. Missing data
//! (no payment status recorded, no spend for a category, no matching reward
//! rule) resolves to a typed default inside the engines instead.

use thiserror::Error;

/// Main error type for the billing and rewards engines
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    /// A card's statement closing day is outside 1-31
    ///
    /// Never clamped: a silently corrected closing day would shift every
    /// statement boundary for the card.
    #[error("Card {card_id} has invalid closing day {day} (expected 1-31)")]
    InvalidClosingDay {
        /// Catalog id of the misconfigured card
        card_id: String,
        /// The configured day of month
        day: u32,
    },

    /// A grace period override of zero or fewer days
    #[error("Grace period for {issuer} must be a positive number of days, got {days}")]
    InvalidGracePeriod {
        /// Issuer (or card) the override was configured for
        issuer: String,
        /// The configured number of days
        days: i64,
    },

    /// Urgency thresholds that cannot be ordered consistently
    #[error("Invalid urgency thresholds: {message}")]
    InvalidThresholds {
        /// Which constraint failed
        message: String,
    },

    /// Month arithmetic left the representable calendar range
    #[error("Date out of range: {year}-{month:02}")]
    DateOutOfRange { year: i32, month: u32 },

    /// A statement period key that does not parse as a closing date
    #[error("Invalid statement period key '{key}'")]
    InvalidPeriodKey { key: String },

    /// Attempt to mark a statement paid before it has closed
    #[error("Statement {period_key} for card {card_id} has not closed yet")]
    StatementNotClosed { card_id: String, period_key: String },

    /// Card id not present in the reference catalog
    #[error("Unknown card '{card_id}'")]
    UnknownCard { card_id: String },

    /// Persistence failure in the SQLite-backed collaborators
    #[error("Database error: {message}")]
    Database { message: String },

    /// A value that could not be converted to or from its stored JSON form
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl From<rusqlite::Error> for TrackerError {
    fn from(error: rusqlite::Error) -> Self {
        TrackerError::Database {
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(error: serde_json::Error) -> Self {
        TrackerError::Serialization {
            message: error.to_string(),
        }
    }
}

impl TrackerError {
    pub fn invalid_closing_day(card_id: &str, day: u32) -> Self {
        TrackerError::InvalidClosingDay {
            card_id: card_id.to_string(),
            day,
        }
    }

    pub fn unknown_card(card_id: &str) -> Self {
        TrackerError::UnknownCard {
            card_id: card_id.to_string(),
        }
    }

    pub fn invalid_thresholds(message: impl Into<String>) -> Self {
        TrackerError::InvalidThresholds {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::closing_day(
        TrackerError::invalid_closing_day("amex-gold", 32),
        "Card amex-gold has invalid closing day 32 (expected 1-31)"
    )]
    #[case::grace_period(
        TrackerError::InvalidGracePeriod { issuer: "Chase".to_string(), days: 0 },
        "Grace period for Chase must be a positive number of days, got 0"
    )]
    #[case::date_range(
        TrackerError::DateOutOfRange { year: 262143, month: 3 },
        "Date out of range: 262143-03"
    )]
    #[case::not_closed(
        TrackerError::StatementNotClosed { card_id: "citi-double-cash".to_string(), period_key: "2024-03-20".to_string() },
        "Statement 2024-03-20 for card citi-double-cash has not closed yet"
    )]
    #[case::unknown_card(TrackerError::unknown_card("nope"), "Unknown card 'nope'")]
    fn test_error_display(#[case] error: TrackerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_rusqlite_error_conversion() {
        let error: TrackerError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(error, TrackerError::Database { .. }));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let error: TrackerError = serde_json::from_str::<u32>("{").unwrap_err().into();
        assert!(matches!(error, TrackerError::Serialization { .. }));
        assert!(error.to_string().starts_with("Serialization error: "));
    }
}
