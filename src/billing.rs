//! Billing cycle engine
//!
//! Derives statement periods, due dates and reminders for held cards. Every
//! period is recomputed from the card definition and the reference date, and
//! paid flags are read from the [`PaymentStatusStore`] on each call.
//!
//! # Candidate window
//!
//! Statements closing in the months `-3..=+1` around the reference date are
//! considered. A statement that closes after the reference date has not been
//! issued yet and is never a candidate.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::calendar::{self, ClosingDay, PeriodKey};
use crate::catalog::ReferenceData;
use crate::error::TrackerError;
use crate::models::{
    CardDefinition, HeldCard, PaymentReminder, StatementPeriod, Urgency, UrgencyStatus,
};
use crate::settings::UrgencyThresholds;
use crate::store::PaymentStatusStore;

/// First month offset (relative to the reference month) that is examined
pub const WINDOW_FIRST_OFFSET: i32 = -3;
/// Last month offset that is examined
pub const WINDOW_LAST_OFFSET: i32 = 1;
/// History ignores statements closing more than this many months back
pub const HISTORY_LOOKBACK_MONTHS: i32 = 3;
/// Periods shown before a history needs an "expand" control
pub const HISTORY_VISIBLE_PERIODS: usize = 3;

pub struct BillingEngine<'a> {
    reference: &'a ReferenceData,
}

impl<'a> BillingEngine<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self { reference }
    }

    /// The statement period that closes on `closing`.
    pub fn statement_period(
        &self,
        card: &CardDefinition,
        closing: NaiveDate,
        store: &impl PaymentStatusStore,
    ) -> Result<StatementPeriod, TrackerError> {
        let day = card.closing_day()?;
        let grace = self.reference.grace_period_days(card)?;
        build_period(card, day, grace, closing, store)
    }

    /// Closing dates in the candidate window that are on or before `today`,
    /// oldest first.
    fn candidate_closings(
        &self,
        card: &CardDefinition,
        today: NaiveDate,
    ) -> Result<Vec<NaiveDate>, TrackerError> {
        let day = card.closing_day()?;
        let mut closings = Vec::new();
        for offset in WINDOW_FIRST_OFFSET..=WINDOW_LAST_OFFSET {
            let closing = calendar::closing_for_offset(today, offset, day)?;
            if closing > today {
                continue;
            }
            closings.push(closing);
        }
        Ok(closings)
    }

    fn candidate_periods(
        &self,
        card: &CardDefinition,
        today: NaiveDate,
        store: &impl PaymentStatusStore,
    ) -> Result<Vec<StatementPeriod>, TrackerError> {
        let day = card.closing_day()?;
        let grace = self.reference.grace_period_days(card)?;
        self.candidate_closings(card, today)?
            .into_iter()
            .map(|closing| build_period(card, day, grace, closing, store))
            .collect()
    }

    /// The most time-pressing unpaid statement for a card, if any.
    ///
    /// Smallest days-until-due wins; on equal values the earlier statement
    /// is kept. `None` means every statement in the window is paid.
    pub fn current_reminder(
        &self,
        held: &HeldCard,
        today: NaiveDate,
        store: &impl PaymentStatusStore,
    ) -> Result<Option<PaymentReminder>, TrackerError> {
        let mut best: Option<PaymentReminder> = None;
        for period in self.candidate_periods(&held.card, today, store)? {
            if period.is_paid {
                continue;
            }
            let days_until_due = period.days_until_due(today);
            if best
                .as_ref()
                .is_none_or(|b| days_until_due < b.days_until_due)
            {
                best = Some(PaymentReminder {
                    period,
                    days_until_due,
                });
            }
        }

        if let Some(reminder) = &best {
            debug!(
                card = %held.card_id(),
                period = %reminder.period.period_key,
                days_until_due = reminder.days_until_due,
                "Selected reminder"
            );
        }
        Ok(best)
    }

    /// Reminders for every active card, soonest due date first.
    pub fn reminders(
        &self,
        cards: &[HeldCard],
        today: NaiveDate,
        store: &impl PaymentStatusStore,
    ) -> Result<Vec<PaymentReminder>, TrackerError> {
        let mut reminders = Vec::new();
        for held in cards.iter().filter(|c| c.is_active) {
            if let Some(reminder) = self.current_reminder(held, today, store)? {
                reminders.push(reminder);
            }
        }
        reminders.sort_by_key(|r| r.period.due_date);
        Ok(reminders)
    }

    /// Recent statement periods for a card, newest due date first.
    ///
    /// Periods closing before `max(today, added_date) - 3 months` are left out.
    pub fn history(
        &self,
        held: &HeldCard,
        today: NaiveDate,
        store: &impl PaymentStatusStore,
    ) -> Result<StatementHistory, TrackerError> {
        let floor = calendar::months_before(today, HISTORY_LOOKBACK_MONTHS)?.max(
            calendar::months_before(held.added_date, HISTORY_LOOKBACK_MONTHS)?,
        );
        let mut periods: Vec<_> = self
            .candidate_periods(&held.card, today, store)?
            .into_iter()
            .filter(|p| p.statement_end >= floor)
            .collect();
        periods.sort_by(|a, b| b.due_date.cmp(&a.due_date));
        Ok(StatementHistory { periods })
    }

    /// Statement periods touching a calendar month, for a month view.
    ///
    /// Covers closings from the month before through two months after, so
    /// every period overlapping the month and every due date inside it is
    /// present. Future periods are included.
    pub fn periods_for_month(
        &self,
        held: &HeldCard,
        month: NaiveDate,
        store: &impl PaymentStatusStore,
    ) -> Result<Vec<StatementPeriod>, TrackerError> {
        let day = held.card.closing_day()?;
        let grace = self.reference.grace_period_days(&held.card)?;
        (-1..=2)
            .map(|offset| {
                let closing = calendar::closing_for_offset(month, offset, day)?;
                build_period(&held.card, day, grace, closing, store)
            })
            .collect()
    }

    /// Sets the paid flag for one statement.
    ///
    /// Marking a statement paid before it closes is rejected; clearing the
    /// flag is always allowed. The key must be a closing date on the card's
    /// schedule. Callers recompute reminders and history afterwards.
    pub fn mark_statement_paid(
        &self,
        card: &CardDefinition,
        period: &PeriodKey,
        paid: bool,
        today: NaiveDate,
        store: &mut impl PaymentStatusStore,
    ) -> Result<(), TrackerError> {
        let day = card.closing_day()?;
        let closing = period.closing_date();
        require_on_schedule(period, day)?;
        if paid && closing > today {
            return Err(TrackerError::StatementNotClosed {
                card_id: card.id.clone(),
                period_key: period.to_string(),
            });
        }
        store.set_paid(&card.id, period, paid)
    }

    /// Marks as paid the statements that closed before the card was tracked.
    ///
    /// Within the candidate window, a statement is marked when it closed
    /// before `before`, before the card's added date, and no more than three
    /// months before the added date. Returns the keys that were marked.
    /// `before` must be on the card's closing schedule.
    pub fn mark_prior_statements_paid(
        &self,
        held: &HeldCard,
        before: &PeriodKey,
        today: NaiveDate,
        store: &mut impl PaymentStatusStore,
    ) -> Result<Vec<PeriodKey>, TrackerError> {
        let day = held.card.closing_day()?;
        require_on_schedule(before, day)?;
        let earliest = calendar::months_before(held.added_date, HISTORY_LOOKBACK_MONTHS)?;
        let mut marked = Vec::new();
        for offset in WINDOW_FIRST_OFFSET..=WINDOW_LAST_OFFSET {
            let closing = calendar::closing_for_offset(today, offset, day)?;
            if closing >= before.closing_date() {
                continue;
            }
            if closing < earliest || closing >= held.added_date {
                continue;
            }
            let key = PeriodKey::from_closing(closing);
            store.set_paid(held.card_id(), &key, true)?;
            marked.push(key);
        }
        debug!(card = %held.card_id(), count = marked.len(), "Marked prior statements paid");
        Ok(marked)
    }
}

fn require_on_schedule(period: &PeriodKey, day: ClosingDay) -> Result<(), TrackerError> {
    if calendar::is_on_schedule(period.closing_date(), day)? {
        Ok(())
    } else {
        Err(TrackerError::InvalidPeriodKey {
            key: period.to_string(),
        })
    }
}

fn build_period(
    card: &CardDefinition,
    day: ClosingDay,
    grace_days: i64,
    closing: NaiveDate,
    store: &impl PaymentStatusStore,
) -> Result<StatementPeriod, TrackerError> {
    let previous = calendar::previous_closing(closing, day)?;
    let period_key = PeriodKey::from_closing(closing);
    let is_paid = store.is_paid(&card.id, &period_key)?;
    Ok(StatementPeriod {
        card_id: card.id.clone(),
        card_name: card.name.clone(),
        period_key,
        statement_start: previous + Duration::days(1),
        statement_end: closing,
        due_date: closing + Duration::days(grace_days),
        is_paid,
    })
}

/// Classifies a statement by how close its due date is.
pub fn classify_urgency(
    period: &StatementPeriod,
    today: NaiveDate,
    thresholds: &UrgencyThresholds,
) -> Urgency {
    let days = period.days_until_due(today);
    let (status, message) = if period.is_paid {
        (UrgencyStatus::Paid, "Payment completed".to_string())
    } else if days < thresholds.overdue_days {
        let overdue = days.abs();
        let message = if overdue == 1 {
            "1 day overdue".to_string()
        } else {
            format!("{overdue} days overdue")
        };
        (UrgencyStatus::Overdue, message)
    } else if days == 0 {
        (UrgencyStatus::Urgent, "Pay today".to_string())
    } else if days == 1 {
        (UrgencyStatus::Urgent, "Due tomorrow".to_string())
    } else if days <= thresholds.critical_days {
        (UrgencyStatus::Urgent, "Pay immediately".to_string())
    } else if days <= thresholds.urgent_days {
        (UrgencyStatus::DueSoon, format!("Due in {days} days"))
    } else {
        (UrgencyStatus::Upcoming, "Upcoming payment".to_string())
    };
    Urgency { status, message }
}

impl PaymentReminder {
    pub fn urgency(&self, today: NaiveDate, thresholds: &UrgencyThresholds) -> Urgency {
        classify_urgency(&self.period, today, thresholds)
    }
}

/// A card's recent statements, newest due date first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementHistory {
    periods: Vec<StatementPeriod>,
}

/// What a collapsed history shows, and how many periods stay behind "expand".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedHistory<'a> {
    pub visible: Vec<&'a StatementPeriod>,
    pub hidden: usize,
}

impl StatementHistory {
    pub fn periods(&self) -> &[StatementPeriod] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn unpaid(&self) -> impl Iterator<Item = &StatementPeriod> {
        self.periods.iter().filter(|p| !p.is_paid)
    }

    pub fn paid(&self) -> impl Iterator<Item = &StatementPeriod> {
        self.periods.iter().filter(|p| p.is_paid)
    }

    /// All unpaid periods plus the most recent paid ones, up to `limit` in
    /// total. Unpaid periods are never hidden, even past the limit.
    pub fn compressed(&self, limit: usize) -> CompressedHistory<'_> {
        if self.periods.len() <= limit {
            return CompressedHistory {
                visible: self.periods.iter().collect(),
                hidden: 0,
            };
        }
        let unpaid = self.unpaid().count();
        let mut paid_slots = limit.saturating_sub(unpaid);
        let visible: Vec<_> = self
            .periods
            .iter()
            .filter(|p| {
                if !p.is_paid {
                    return true;
                }
                if paid_slots > 0 {
                    paid_slots -= 1;
                    return true;
                }
                false
            })
            .collect();
        let hidden = self.periods.len() - visible.len();
        CompressedHistory { visible, hidden }
    }
}

/// Counts behind the overdue / due soon / paid summary tiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderSummary {
    pub overdue: usize,
    pub due_soon: usize,
    pub paid: usize,
}

impl ReminderSummary {
    pub fn from_reminders(
        reminders: &[PaymentReminder],
        today: NaiveDate,
        thresholds: &UrgencyThresholds,
    ) -> Self {
        let mut summary = Self::default();
        for reminder in reminders {
            let days = reminder.period.days_until_due(today);
            if reminder.period.is_paid {
                summary.paid += 1;
            } else if days < 0 {
                summary.overdue += 1;
            } else if days <= thresholds.urgent_days {
                summary.due_soon += 1;
            }
        }
        summary
    }
}

/// Banner text for unpaid reminders due within `within_days`, overdue ones
/// included.
pub fn urgent_alert(
    reminders: &[PaymentReminder],
    today: NaiveDate,
    within_days: i64,
) -> Option<String> {
    let urgent: Vec<_> = reminders
        .iter()
        .filter(|r| !r.period.is_paid && r.period.days_until_due(today) <= within_days)
        .collect();
    match urgent.as_slice() {
        [] => None,
        [only] => Some(format!(
            "Payment due in {} days for {}",
            only.period.days_until_due(today),
            only.period.card_name
        )),
        many => Some(format!(
            "{} payments due within {} days",
            many.len(),
            within_days
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Issuer, RewardKind, RewardRule};
    use crate::store::MemoryStatusStore;
    use rstest::rstest;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn key(s: &str) -> PeriodKey {
        s.parse().unwrap()
    }

    fn test_card(id: &str, issuer: Issuer, closing_day: u32) -> CardDefinition {
        CardDefinition {
            id: id.to_string(),
            name: format!("{id} card"),
            issuer,
            annual_fee: 0,
            closing_day,
            reward_rules: vec![RewardRule {
                category: Category::General,
                multiplier: Decimal::ONE,
                kind: RewardKind::Points,
                description: String::new(),
            }],
            grace_period_override: None,
            description: None,
        }
    }

    fn held(card: CardDefinition, added: NaiveDate) -> HeldCard {
        HeldCard::new(card, added)
    }

    fn period_due_in(days: i64, paid: bool, today: NaiveDate) -> StatementPeriod {
        let due = today + Duration::days(days);
        StatementPeriod {
            card_id: "c".to_string(),
            card_name: "C".to_string(),
            period_key: PeriodKey::from_closing(due - Duration::days(25)),
            statement_start: due - Duration::days(55),
            statement_end: due - Duration::days(25),
            due_date: due,
            is_paid: paid,
        }
    }

    #[test]
    fn test_period_boundaries() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let card = test_card("a", Issuer::Citi, 15);
        let store = MemoryStatusStore::new();

        let period = engine.statement_period(&card, date(2024, 1, 15), &store).unwrap();
        assert_eq!(period.statement_start, date(2023, 12, 16));
        assert_eq!(period.statement_end, date(2024, 1, 15));
        assert_eq!(period.due_date, date(2024, 2, 9));
        assert_eq!(period.period_key.to_string(), "2024-01-15");
        assert!(!period.is_paid);
    }

    #[test]
    fn test_due_date_uses_issuer_grace_period() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let store = MemoryStatusStore::new();

        let chase = test_card("chase", Issuer::Chase, 15);
        let period = engine.statement_period(&chase, date(2024, 1, 15), &store).unwrap();
        assert_eq!(period.due_date, date(2024, 2, 7));

        let other = test_card("cu", Issuer::Other("Credit Union".to_string()), 15);
        let period = engine.statement_period(&other, date(2024, 1, 15), &store).unwrap();
        assert_eq!(period.due_date, date(2024, 2, 9));
    }

    #[test]
    fn test_invalid_closing_day_is_reported() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let store = MemoryStatusStore::new();
        let card = held(test_card("bad", Issuer::Citi, 32), date(2024, 1, 1));

        assert_eq!(
            engine.current_reminder(&card, date(2024, 1, 20), &store),
            Err(TrackerError::invalid_closing_day("bad", 32))
        );
    }

    #[test]
    fn test_reminder_picks_most_pressing_unpaid() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let card = held(test_card("a", Issuer::Citi, 15), date(2023, 1, 1));
        let mut store = MemoryStatusStore::new();
        let today = date(2024, 1, 20);

        // Oct, Nov, Dec and Jan are all unpaid: October is the most overdue.
        let reminder = engine.current_reminder(&card, today, &store).unwrap().unwrap();
        assert_eq!(reminder.period.period_key, key("2023-10-15"));
        assert!(reminder.days_until_due < 0);

        store.set_paid("a", &key("2023-10-15"), true).unwrap();
        let reminder = engine.current_reminder(&card, today, &store).unwrap().unwrap();
        assert_eq!(reminder.period.period_key, key("2023-11-15"));
    }

    #[test]
    fn test_reminder_none_when_all_paid() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let card = held(test_card("a", Issuer::Citi, 15), date(2023, 1, 1));
        let mut store = MemoryStatusStore::new();
        let today = date(2024, 1, 20);
        for k in ["2023-10-15", "2023-11-15", "2023-12-15", "2024-01-15"] {
            store.set_paid("a", &key(k), true).unwrap();
        }

        assert_eq!(engine.current_reminder(&card, today, &store).unwrap(), None);
    }

    #[test]
    fn test_unclosed_statement_is_never_a_candidate() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let card = held(test_card("a", Issuer::Citi, 25), date(2023, 1, 1));
        let mut store = MemoryStatusStore::new();
        let today = date(2024, 1, 20);
        for k in ["2023-10-25", "2023-11-25", "2023-12-25"] {
            store.set_paid("a", &key(k), true).unwrap();
        }

        // January 25 has not closed yet on January 20.
        assert_eq!(engine.current_reminder(&card, today, &store).unwrap(), None);
    }

    #[test]
    fn test_reminder_is_idempotent() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let card = held(test_card("a", Issuer::Chase, 31), date(2023, 1, 1));
        let store = MemoryStatusStore::new();
        let today = date(2024, 3, 5);

        let first = engine.current_reminder(&card, today, &store).unwrap();
        let second = engine.current_reminder(&card, today, &store).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_reminders_sorted_and_skip_inactive() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let today = date(2024, 1, 20);
        let mut store = MemoryStatusStore::new();
        for (id, day) in [("a", 15), ("b", 5)] {
            for month in [10, 11, 12] {
                let k = PeriodKey::from_closing(date(2023, month, day));
                store.set_paid(id, &k, true).unwrap();
            }
        }
        let a = held(test_card("a", Issuer::Citi, 15), date(2023, 1, 1));
        let b = held(test_card("b", Issuer::Citi, 5), date(2023, 1, 1));
        let mut c = held(test_card("c", Issuer::Citi, 1), date(2023, 1, 1));
        c.is_active = false;

        let reminders = engine.reminders(&[a, b, c], today, &store).unwrap();
        let ids: Vec<_> = reminders.iter().map(|r| r.period.card_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_history_window_and_order() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let store = MemoryStatusStore::new();
        let today = date(2024, 1, 20);

        // Card added long ago: the floor is today - 3 months = Oct 20, so
        // the October 15 closing drops out.
        let card = held(test_card("a", Issuer::Citi, 15), date(2022, 6, 1));
        let history = engine.history(&card, today, &store).unwrap();
        let keys: Vec<_> = history.periods().iter().map(|p| p.period_key.to_string()).collect();
        assert_eq!(keys, vec!["2024-01-15", "2023-12-15", "2023-11-15"]);

        // Closing on the 25th keeps October 25.
        let card = held(test_card("b", Issuer::Citi, 25), date(2022, 6, 1));
        let history = engine.history(&card, today, &store).unwrap();
        let keys: Vec<_> = history.periods().iter().map(|p| p.period_key.to_string()).collect();
        assert_eq!(keys, vec!["2023-12-25", "2023-11-25", "2023-10-25"]);
    }

    #[test]
    fn test_history_partition() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let mut store = MemoryStatusStore::new();
        store.set_paid("a", &key("2023-12-15"), true).unwrap();
        let card = held(test_card("a", Issuer::Citi, 15), date(2022, 6, 1));

        let history = engine.history(&card, date(2024, 1, 20), &store).unwrap();
        assert_eq!(history.paid().count(), 1);
        assert_eq!(history.unpaid().count(), 2);
    }

    fn history_of(paid_flags: &[bool]) -> StatementHistory {
        let today = date(2024, 6, 1);
        let periods = paid_flags
            .iter()
            .enumerate()
            .map(|(i, paid)| period_due_in(-(i as i64) * 30, *paid, today))
            .collect();
        StatementHistory { periods }
    }

    #[test]
    fn test_compressed_history_short_list_is_untouched() {
        let history = history_of(&[true, false, true]);
        let compressed = history.compressed(HISTORY_VISIBLE_PERIODS);
        assert_eq!(compressed.visible.len(), 3);
        assert_eq!(compressed.hidden, 0);
    }

    #[test]
    fn test_compressed_history_keeps_unpaid_and_recent_paid() {
        let history = history_of(&[true, false, true, true, false]);
        let compressed = history.compressed(HISTORY_VISIBLE_PERIODS);
        let flags: Vec<_> = compressed.visible.iter().map(|p| p.is_paid).collect();
        // Two unpaid plus the newest paid one.
        assert_eq!(flags, vec![true, false, false]);
        assert_eq!(compressed.hidden, 2);
    }

    #[test]
    fn test_compressed_history_never_hides_unpaid() {
        let history = history_of(&[false, false, false, false, true]);
        let compressed = history.compressed(HISTORY_VISIBLE_PERIODS);
        assert_eq!(compressed.visible.len(), 4);
        assert_eq!(compressed.hidden, 1);
    }

    #[rstest]
    #[case::paid(5, true, UrgencyStatus::Paid, "Payment completed")]
    #[case::one_day_overdue(-1, false, UrgencyStatus::Overdue, "1 day overdue")]
    #[case::many_days_overdue(-12, false, UrgencyStatus::Overdue, "12 days overdue")]
    #[case::today(0, false, UrgencyStatus::Urgent, "Pay today")]
    #[case::tomorrow(1, false, UrgencyStatus::Urgent, "Due tomorrow")]
    #[case::critical(3, false, UrgencyStatus::Urgent, "Pay immediately")]
    #[case::due_soon(7, false, UrgencyStatus::DueSoon, "Due in 7 days")]
    #[case::upcoming(8, false, UrgencyStatus::Upcoming, "Upcoming payment")]
    fn test_classify_urgency(
        #[case] days: i64,
        #[case] paid: bool,
        #[case] status: UrgencyStatus,
        #[case] message: &str,
    ) {
        let today = date(2024, 1, 20);
        let urgency = classify_urgency(
            &period_due_in(days, paid, today),
            today,
            &UrgencyThresholds::default(),
        );
        assert_eq!(urgency.status, status);
        assert_eq!(urgency.message, message);
    }

    #[test]
    fn test_classify_urgency_custom_thresholds() {
        let today = date(2024, 1, 20);
        let thresholds = UrgencyThresholds {
            urgent_days: 14,
            critical_days: 5,
            overdue_days: -2,
        };
        let status = |days| classify_urgency(&period_due_in(days, false, today), today, &thresholds).status;
        assert_eq!(status(-1), UrgencyStatus::Urgent);
        assert_eq!(status(-3), UrgencyStatus::Overdue);
        assert_eq!(status(5), UrgencyStatus::Urgent);
        assert_eq!(status(10), UrgencyStatus::DueSoon);
        assert_eq!(status(15), UrgencyStatus::Upcoming);
    }

    #[test]
    fn test_mark_paid_then_recompute() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let card = held(test_card("a", Issuer::Citi, 15), date(2022, 6, 1));
        let mut store = MemoryStatusStore::new();
        let today = date(2024, 1, 20);

        engine
            .mark_statement_paid(&card.card, &key("2024-01-15"), true, today, &mut store)
            .unwrap();
        let history = engine.history(&card, today, &store).unwrap();
        assert!(history.periods()[0].is_paid);

        engine
            .mark_statement_paid(&card.card, &key("2024-01-15"), false, today, &mut store)
            .unwrap();
        let history = engine.history(&card, today, &store).unwrap();
        assert!(!history.periods()[0].is_paid);
    }

    #[test]
    fn test_cannot_pay_unclosed_statement() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let card = test_card("a", Issuer::Citi, 25);
        let mut store = MemoryStatusStore::new();
        let today = date(2024, 1, 20);

        let period = engine.statement_period(&card, date(2024, 1, 25), &store).unwrap();
        assert!(!period.is_payable(today));
        assert_eq!(
            engine.mark_statement_paid(&card, &period.period_key, true, today, &mut store),
            Err(TrackerError::StatementNotClosed {
                card_id: "a".to_string(),
                period_key: "2024-01-25".to_string(),
            })
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_mark_paid_rejects_off_schedule_key() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let card = test_card("a", Issuer::Citi, 15);
        let mut store = MemoryStatusStore::new();

        assert!(matches!(
            engine.mark_statement_paid(&card, &key("2024-01-14"), true, date(2024, 2, 1), &mut store),
            Err(TrackerError::InvalidPeriodKey { .. })
        ));
    }

    #[test]
    fn test_mark_prior_statements_paid() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let card = held(test_card("a", Issuer::Citi, 15), date(2024, 2, 10));
        let mut store = MemoryStatusStore::new();
        let today = date(2024, 3, 20);

        let marked = engine
            .mark_prior_statements_paid(&card, &key("2024-03-15"), today, &mut store)
            .unwrap();
        assert_eq!(marked, vec![key("2023-12-15"), key("2024-01-15")]);
        assert!(!store.is_paid("a", &key("2024-02-15")).unwrap());
        assert!(!store.is_paid("a", &key("2024-03-15")).unwrap());
    }

    #[test]
    fn test_mark_prior_rejects_off_schedule_key() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let card = held(test_card("a", Issuer::Citi, 15), date(2024, 2, 10));
        let mut store = MemoryStatusStore::new();

        let result =
            engine.mark_prior_statements_paid(&card, &key("2024-03-14"), date(2024, 3, 20), &mut store);
        assert_eq!(
            result,
            Err(TrackerError::InvalidPeriodKey {
                key: "2024-03-14".to_string()
            })
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_periods_for_month_cover_neighbours() {
        let data = ReferenceData::builtin();
        let engine = BillingEngine::new(&data);
        let card = held(test_card("a", Issuer::Citi, 31), date(2024, 1, 1));
        let store = MemoryStatusStore::new();

        let periods = engine.periods_for_month(&card, date(2024, 2, 1), &store).unwrap();
        let ends: Vec<_> = periods.iter().map(|p| p.statement_end).collect();
        assert_eq!(
            ends,
            vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 31), date(2024, 4, 30)]
        );
        assert_eq!(periods[2].statement_start, date(2024, 3, 1));
    }

    #[test]
    fn test_summary_and_alert() {
        let today = date(2024, 1, 20);
        let thresholds = UrgencyThresholds::default();
        let reminder = |days, paid| PaymentReminder {
            period: period_due_in(days, paid, today),
            days_until_due: days,
        };
        let reminders = vec![reminder(-2, false), reminder(2, false), reminder(6, false), reminder(20, true)];

        let summary = ReminderSummary::from_reminders(&reminders, today, &thresholds);
        assert_eq!(
            summary,
            ReminderSummary {
                overdue: 1,
                due_soon: 2,
                paid: 1
            }
        );

        assert_eq!(
            urgent_alert(&reminders, today, 3).as_deref(),
            Some("2 payments due within 3 days")
        );
        assert_eq!(
            urgent_alert(&reminders[1..], today, 3).as_deref(),
            Some("Payment due in 2 days for C")
        );
        assert_eq!(urgent_alert(&reminders[2..], today, 3), None);
        assert_eq!(
            urgent_alert(&reminders[2..], today, 7).as_deref(),
            Some("Payment due in 6 days for C")
        );
    }
}
