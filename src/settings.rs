//! User-tunable thresholds and export preferences.

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Day counts that drive reminder classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrgencyThresholds {
    /// Due within this many days counts as "due soon"
    pub urgent_days: i64,
    /// Due within this many days must be paid immediately
    pub critical_days: i64,
    /// Fewer days than this until due counts as overdue
    pub overdue_days: i64,
}

impl Default for UrgencyThresholds {
    fn default() -> Self {
        Self {
            urgent_days: 7,
            critical_days: 3,
            overdue_days: 0,
        }
    }
}

impl UrgencyThresholds {
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.critical_days < 0 || self.urgent_days < 0 {
            return Err(TrackerError::invalid_thresholds(
                "urgent and critical days must not be negative",
            ));
        }
        if self.critical_days > self.urgent_days {
            return Err(TrackerError::invalid_thresholds(format!(
                "critical days ({}) exceed urgent days ({})",
                self.critical_days, self.urgent_days
            )));
        }
        if self.overdue_days > self.critical_days {
            return Err(TrackerError::invalid_thresholds(format!(
                "overdue days ({}) exceed critical days ({})",
                self.overdue_days, self.critical_days
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub days_before: i64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            days_before: 3,
        }
    }
}

pub const MAX_EXPORT_MONTHS: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub urgency: UrgencyThresholds,
    pub notifications: NotificationSettings,
    /// Months of due dates written by a calendar export
    pub export_months: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            urgency: UrgencyThresholds::default(),
            notifications: NotificationSettings::default(),
            export_months: 12,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), TrackerError> {
        self.urgency.validate()?;
        if !(1..=MAX_EXPORT_MONTHS).contains(&self.export_months) {
            return Err(TrackerError::invalid_thresholds(format!(
                "export months must be between 1 and {MAX_EXPORT_MONTHS}, got {}",
                self.export_months
            )));
        }
        Ok(())
    }
}
