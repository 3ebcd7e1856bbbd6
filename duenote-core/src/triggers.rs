//! Trigger time calculator.
//!
//! Pure date arithmetic: given one assignment, the settings snapshot and the
//! current instant, produce every candidate notification that should exist.
//! Candidates whose fire time has already passed are NOT filtered here; the
//! scheduler and reconciler drop those.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::assignment::Assignment;
use crate::ident::{NotificationKind, identifier};
use crate::settings::NotificationSettings;
use crate::time::{at_local_time, days_until, format_local, local_date};
use crate::transport::Channel;

/// "Due soon" lead for the `due` and `priority-reminder` slots.
pub const DUE_SOON_LEAD_HOURS: i64 = 1;
/// Lead for the day-before `reminder` slot.
pub const DAY_BEFORE_LEAD_HOURS: i64 = 24;

/// A computed notification not yet committed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub assignment_id: String,
    pub kind: NotificationKind,
    pub fire_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub channel: Channel,
}

impl Candidate {
    pub fn identifier(&self) -> String {
        identifier(&self.assignment_id, self.kind)
    }
}

/// Every candidate for `assignment` as of `now`, in slot order
/// (due, reminder, early-reminder, daily, priority-reminder).
pub fn compute_candidates(
    assignment: &Assignment,
    settings: &NotificationSettings,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let tz = settings.tz_or_utc();
    let due = assignment.due_date;
    let lead_days = settings.lead_days(assignment.category);
    let today = local_date(now, tz);

    let due_soon = before(due, Duration::try_hours(DUE_SOON_LEAD_HOURS));
    let mut slots: Vec<(NotificationKind, DateTime<Utc>)> = Vec::with_capacity(5);
    if let Some(at) = due_soon {
        slots.push((NotificationKind::Due, at));
    }
    if let Some(at) = before(due, Duration::try_hours(DAY_BEFORE_LEAD_HOURS)) {
        slots.push((NotificationKind::Reminder, at));
    }

    // Day-exact: only a candidate on the local day the lead window opens.
    // A lead reaching past the representable range has no opening day.
    if let Some(early) = before(due, Duration::try_days(i64::from(lead_days)))
        .filter(|early| lead_days > 0 && local_date(*early, tz) == today)
    {
        slots.push((NotificationKind::EarlyReminder, early));
    }

    // Never on the final day; that one already has the 24h reminder.
    let days_left = days_until(due, now, tz);
    if settings.daily_enabled(assignment.category) && days_left > 1 && days_left <= i64::from(lead_days) {
        slots.push((
            NotificationKind::Daily,
            at_local_time(today, settings.notification_time, tz),
        ));
    }

    if let Some(at) = due_soon.filter(|_| assignment.is_priority) {
        slots.push((NotificationKind::PriorityReminder, at));
    }

    slots
        .into_iter()
        .map(|(kind, fire_at)| {
            let (title, body) = render(assignment, kind, lead_days, days_left, tz);
            Candidate {
                assignment_id: assignment.id.clone(),
                kind,
                fire_at,
                title,
                body,
                channel: Channel::for_slot(assignment.category, kind),
            }
        })
        .collect()
}

fn render(
    a: &Assignment,
    kind: NotificationKind,
    lead_days: u32,
    days_left: i64,
    tz: Tz,
) -> (String, String) {
    let label = a.category.label();
    let course = a
        .course_info()
        .map(|c| format!(" ({c})"))
        .unwrap_or_default();
    let at = format_local(a.due_date, tz, "%H:%M");
    let on = format_local(a.due_date, tz, "%a %d %b");

    let (title, mut body) = match kind {
        NotificationKind::Due => (
            format!("Due in 1 hour: {}", a.title),
            format!("{label}{course} is due at {at}."),
        ),
        NotificationKind::Reminder => (
            format!("Due tomorrow: {}", a.title),
            format!("{label}{course} is due {on} at {at}."),
        ),
        NotificationKind::EarlyReminder => (
            format!("{label} in {lead_days} {}: {}", plural_days(i64::from(lead_days)), a.title),
            format!("Heads up: {}{course} is due {on} at {at}. Time to start preparing.", a.title),
        ),
        NotificationKind::Daily => (
            format!("{label} in {days_left} {}: {}", plural_days(days_left), a.title),
            format!("{days_left} days left until {}{course}. Due {on} at {at}.", a.title),
        ),
        NotificationKind::PriorityReminder => (
            format!("Priority: {}", a.title),
            format!("Priority {}{course} is due in 1 hour, at {at}.", label.to_lowercase()),
        ),
    };

    let description = a.description.trim();
    if !description.is_empty() {
        body.push('\n');
        body.push_str(description);
    }
    (title, body)
}

/// `due - lead`, or `None` when either side leaves chrono's range.
fn before(due: DateTime<Utc>, lead: Option<Duration>) -> Option<DateTime<Utc>> {
    lead.and_then(|lead| due.checked_sub_signed(lead))
}

fn plural_days(n: i64) -> &'static str {
    if n == 1 { "day" } else { "days" }
}
