//! Payment due dates as calendar events.
//!
//! Event generation is pure; the CLI decides where the ICS text goes.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::calendar::{self, PeriodKey};
use crate::catalog::ReferenceData;
use crate::error::TrackerError;
use crate::models::HeldCard;

/// One all-day event on a payment due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    /// Stable across exports: `<card id>_<period key>@cc-optimizer`
    pub uid: String,
    pub summary: String,
    pub start: NaiveDate,
    /// Exclusive end, the day after `start`
    pub end: NaiveDate,
    pub description: String,
}

/// Due date events for every active card, for statements closing in the
/// current month and the `months - 1` months after it.
pub fn due_date_events(
    cards: &[HeldCard],
    today: NaiveDate,
    months: u32,
    reference: &ReferenceData,
) -> Result<Vec<CalendarEvent>, TrackerError> {
    let mut events = Vec::new();

    for held in cards.iter().filter(|c| c.is_active) {
        let card = &held.card;
        let day = card.closing_day()?;
        let grace = reference.grace_period_days(card)?;

        for offset in 0..months as i32 {
            let closing = calendar::closing_for_offset(today, offset, day)?;
            let due = closing + Duration::days(grace);
            let key = PeriodKey::from_closing(closing);
            events.push(CalendarEvent {
                uid: format!("{}_{}@cc-optimizer", card.id, key),
                summary: format!("{} Payment Due", card.name),
                start: due,
                end: due + Duration::days(1),
                description: format!(
                    "Payment due for {} statement ending {}",
                    card.name,
                    closing.format("%b %d, %Y")
                ),
            });
        }
    }

    Ok(events)
}

/// Emit an ICS calendar of all-day VEVENT blocks.
pub fn events_to_ics(events: &[CalendarEvent]) -> String {
    let mut s = String::new();
    s.push_str("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//CC Optimizer//EN\r\n");

    for e in events {
        s.push_str("BEGIN:VEVENT\r\n");
        s.push_str(&format!("UID:{}\r\n", e.uid));
        s.push_str(&format!("DTSTART;VALUE=DATE:{}\r\n", e.start.format("%Y%m%d")));
        s.push_str(&format!("DTEND;VALUE=DATE:{}\r\n", e.end.format("%Y%m%d")));
        s.push_str(&format!("SUMMARY:{}\r\n", escape_ics(&e.summary)));
        s.push_str(&format!("DESCRIPTION:{}\r\n", escape_ics(&e.description)));
        s.push_str("END:VEVENT\r\n");
    }

    s.push_str("END:VCALENDAR\r\n");
    s
}

fn escape_ics(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}
