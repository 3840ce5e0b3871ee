//! Credit card cycle and rewards tracker.
//!
//! [`billing::BillingEngine`] turns held cards and a reference date into
//! statement periods, due dates and reminders. [`rewards::RewardEngine`]
//! picks the best card for a purchase category or a monthly spending profile.
//! Both read the static [`catalog::ReferenceData`] and take the payment status
//! store and card collection as arguments.

pub mod billing;
pub mod calendar;
pub mod catalog;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod rewards;
pub mod settings;
pub mod store;

pub use billing::{BillingEngine, ReminderSummary, StatementHistory, classify_urgency, urgent_alert};
pub use calendar::{ClosingDay, PeriodKey};
pub use catalog::ReferenceData;
pub use error::TrackerError;
pub use models::{
    CardDefinition, CardRecommendation, Category, HeldCard, Issuer, PaymentReminder, RewardKind,
    RewardRule, SpendingProfile, StatementPeriod, Urgency, UrgencyStatus,
};
pub use rewards::{MonthlyOptimum, RecommendationMode, Recommendations, RewardEngine};
pub use settings::{Settings, UrgencyThresholds};
pub use store::{MemoryStatusStore, PaymentStatusStore};
