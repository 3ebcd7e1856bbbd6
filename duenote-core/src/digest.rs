//! Daily digest: one notification summarizing everything due in the next two weeks.
//!
//! Assignments are bucketed by local due day and only enter a bucket once
//! they are inside their own category's reminder window, so the digest never
//! mentions something the per-assignment policy would still stay quiet about.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::assignment::{Assignment, Category};
use crate::ident::DIGEST_IDENTIFIER;
use crate::settings::NotificationSettings;
use crate::text::{TITLE_MAX_CHARS, truncate_chars};
use crate::time::{days_until, format_local, local_date, next_occurrence};
use crate::transport::{Channel, NotificationContent, NotificationPayload, NotificationTransport};

pub const DIGEST_HORIZON_DAYS: i64 = 14;
pub const DIGEST_BODY_MAX_CHARS: usize = 700;
pub const DIGEST_MAX_ITEMS_PER_CATEGORY: usize = 3;
/// Multi-day digests show full detail for this many leading days.
pub const DIGEST_DETAILED_DAYS: usize = 2;
pub const IMMEDIATE_DELAY_SECS: i64 = 5;

/// Assignments due on one local calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestBucket<'a> {
    pub date: NaiveDate,
    /// Days from the reference day (0 = same day).
    pub offset: i64,
    pub assignments: Vec<&'a Assignment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub title: String,
    pub body: String,
    pub assignment_count: usize,
    pub days: usize,
}

/// Non-empty buckets for the horizon starting at `now`'s local day, in day order.
pub fn collect_buckets<'a>(
    assignments: &'a [Assignment],
    settings: &NotificationSettings,
    now: DateTime<Utc>,
) -> Vec<DigestBucket<'a>> {
    let tz = settings.tz_or_utc();
    let mut by_offset: BTreeMap<i64, Vec<&'a Assignment>> = BTreeMap::new();

    for a in assignments.iter().filter(|a| a.is_active(now)) {
        let offset = days_until(a.due_date, now, tz);
        if !(0..DIGEST_HORIZON_DAYS).contains(&offset) {
            continue;
        }
        if offset > i64::from(settings.lead_days(a.category)) {
            continue;
        }
        by_offset.entry(offset).or_default().push(a);
    }

    let today = local_date(now, tz);
    by_offset
        .into_iter()
        .map(|(offset, mut items)| {
            items.sort_by(|x, y| x.due_date.cmp(&y.due_date).then_with(|| x.title.cmp(&y.title)));
            DigestBucket {
                date: today + Duration::days(offset),
                offset,
                assignments: items,
            }
        })
        .collect()
}

/// Build the digest as of `now`. `None` when no bucket is non-empty.
pub fn build_digest(
    assignments: &[Assignment],
    settings: &NotificationSettings,
    now: DateTime<Utc>,
) -> Option<Digest> {
    let buckets = collect_buckets(assignments, settings, now);
    if buckets.is_empty() {
        return None;
    }
    Some(render_digest(&buckets, settings.tz_or_utc()))
}

pub fn render_digest(buckets: &[DigestBucket<'_>], tz: Tz) -> Digest {
    let assignment_count: usize = buckets.iter().map(|b| b.assignments.len()).sum();

    let (title, body) = match buckets {
        [only] => (
            format!(
                "{} due {}",
                count_label(assignment_count),
                day_phrase(only.offset, only.date)
            ),
            grouped_lines(&only.assignments, tz, false).join("\n"),
        ),
        _ => {
            let span = buckets.last().map(|b| b.offset + 1).unwrap_or(1);
            let mut sections = Vec::with_capacity(buckets.len());
            for (i, bucket) in buckets.iter().enumerate() {
                let label = day_label(bucket.offset, bucket.date);
                if i < DIGEST_DETAILED_DAYS {
                    let mut section = vec![format!("{label}:")];
                    section.extend(grouped_lines(&bucket.assignments, tz, true));
                    sections.push(section.join("\n"));
                } else {
                    sections.push(format!("{label}: {}", category_summary(&bucket.assignments)));
                }
            }
            (
                format!("{assignment_count} assignments due in the next {span} days"),
                sections.join("\n"),
            )
        }
    };

    Digest {
        title,
        body: truncate_chars(&body, DIGEST_BODY_MAX_CHARS),
        assignment_count,
        days: buckets.len(),
    }
}

/// Cancel the previous digest, then schedule a fresh one if anything is due.
///
/// Returns the fire time of the digest that was scheduled.
pub async fn schedule_digest<T>(
    transport: &T,
    assignments: &[Assignment],
    settings: &NotificationSettings,
    now: DateTime<Utc>,
    send_immediately: bool,
) -> Option<DateTime<Utc>>
where
    T: NotificationTransport + ?Sized,
{
    if let Err(e) = transport.cancel(DIGEST_IDENTIFIER).await {
        tracing::warn!(error = %e, "failed to cancel previous digest");
    }

    if !settings.enabled {
        return None;
    }

    let fire_at = if send_immediately {
        now + Duration::seconds(IMMEDIATE_DELAY_SECS)
    } else {
        next_occurrence(settings.notification_time, now, settings.tz_or_utc())
    };

    // Render as of the moment it will be read, so "today" means the fire day.
    let Some(digest) = build_digest(assignments, settings, fire_at) else {
        tracing::debug!("nothing inside the digest horizon; no digest scheduled");
        return None;
    };

    let content = NotificationContent {
        title: truncate_chars(&digest.title, TITLE_MAX_CHARS),
        body: digest.body,
        payload: NotificationPayload::Digest {
            assignment_count: digest.assignment_count,
        }
        .to_value(),
    };

    match transport
        .schedule(DIGEST_IDENTIFIER, content, fire_at, Channel::Digest)
        .await
    {
        Ok(()) => {
            tracing::info!(
                fire_at = %fire_at,
                assignments = digest.assignment_count,
                days = digest.days,
                "daily digest scheduled"
            );
            Some(fire_at)
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to schedule daily digest");
            None
        }
    }
}

fn grouped_lines(items: &[&Assignment], tz: Tz, tag_category: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for category in Category::ALL {
        let group: Vec<&&Assignment> = items.iter().filter(|a| a.category == category).collect();
        if group.is_empty() {
            continue;
        }
        if !tag_category {
            lines.push(format!("{}:", category.plural()));
        }
        for a in group.iter().take(DIGEST_MAX_ITEMS_PER_CATEGORY) {
            let line = item_line(a, tz);
            if tag_category {
                lines.push(format!("• {}: {line}", category.label()));
            } else {
                lines.push(format!("• {line}"));
            }
        }
        let hidden = group.len().saturating_sub(DIGEST_MAX_ITEMS_PER_CATEGORY);
        if hidden > 0 {
            lines.push(format!("  +{hidden} more"));
        }
    }
    lines
}

fn item_line(a: &Assignment, tz: Tz) -> String {
    let at = format_local(a.due_date, tz, "%H:%M");
    match a.course_info() {
        Some(course) => format!("{} ({course}) @ {at}", a.title),
        None => format!("{} @ {at}", a.title),
    }
}

fn category_summary(items: &[&Assignment]) -> String {
    Category::ALL
        .into_iter()
        .filter_map(|c| {
            let n = items.iter().filter(|a| a.category == c).count();
            (n > 0).then(|| c.counted(n))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn count_label(n: usize) -> String {
    if n == 1 {
        "1 assignment".to_string()
    } else {
        format!("{n} assignments")
    }
}

fn day_label(offset: i64, date: NaiveDate) -> String {
    match offset {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%A %d %b").to_string(),
    }
}

/// Inline form for titles: "today", "tomorrow", "on Thursday 05 Mar".
fn day_phrase(offset: i64, date: NaiveDate) -> String {
    match offset {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        _ => format!("on {}", day_label(offset, date)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTransport;
    use chrono::{NaiveTime, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap()
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn buckets_respect_each_category_window() {
        let settings = NotificationSettings::default();
        let items = vec![
            // Exam lead 7: in window 5 days out.
            Assignment::new("ex1", "Midterm", Category::Exam, at(7, 10)),
            // Homework lead 1: 5 days out is outside its window.
            Assignment::new("hw1", "Set 5", Category::Homework, at(7, 10)),
            // Homework due tomorrow is inside.
            Assignment::new("hw2", "Set 4", Category::Homework, at(3, 9)),
            Assignment::new("hw3", "Done", Category::Homework, at(3, 9)).completed(),
            Assignment::new("hw4", "Late", Category::Homework, at(2, 6)),
        ];
        let buckets = collect_buckets(&items, &settings, now());
        let shape: Vec<(i64, Vec<&str>)> = buckets
            .iter()
            .map(|b| (b.offset, b.assignments.iter().map(|a| a.id.as_str()).collect()))
            .collect();
        assert_eq!(shape, vec![(1, vec!["hw2"]), (5, vec!["ex1"])]);
        assert_eq!(buckets[1].date, NaiveDate::from_ymd_opt(2026, 3, 7).unwrap());
    }

    #[test]
    fn horizon_is_fourteen_days() {
        let mut settings = NotificationSettings::default();
        settings.set_lead_days(Category::Project, 30);
        let items = vec![
            Assignment::new("p1", "Thesis", Category::Project, now() + Duration::days(13)),
            Assignment::new("p2", "Poster", Category::Project, now() + Duration::days(14)),
        ];
        let buckets = collect_buckets(&items, &settings, now());
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].assignments[0].id, "p1");
    }

    #[test]
    fn single_day_digest_groups_by_category() {
        let settings = NotificationSettings::default();
        let items = vec![
            Assignment::new("hw1", "Set 4", Category::Homework, at(3, 9)).with_course("MATH 221", ""),
            Assignment::new("ex1", "Chem exam", Category::Exam, at(3, 14)),
        ];
        let digest = build_digest(&items, &settings, now()).unwrap();
        assert_eq!(digest.title, "2 assignments due tomorrow");
        assert_eq!(
            digest.body,
            "Exams:\n• Chem exam @ 14:00\nHomework:\n• Set 4 (MATH 221) @ 09:00"
        );
        assert_eq!(digest.days, 1);
    }

    #[test]
    fn per_category_overflow_is_summarized() {
        let settings = NotificationSettings::default();
        let items: Vec<Assignment> = (0..5)
            .map(|i| Assignment::new(format!("hw{i}"), format!("Set {i}"), Category::Homework, at(2, 10 + i)))
            .collect();
        let digest = build_digest(&items, &settings, now()).unwrap();
        assert_eq!(digest.title, "5 assignments due today");
        assert!(digest.body.ends_with("  +2 more"));
        assert_eq!(digest.body.matches('•').count(), 3);
    }

    #[test]
    fn multi_day_digest_details_only_first_two_days() {
        let settings = NotificationSettings::default();
        let items = vec![
            Assignment::new("q1", "Quiz 2", Category::Quiz, at(2, 12)),
            Assignment::new("t1", "Unit test", Category::Test, at(3, 12)),
            Assignment::new("ex1", "Final", Category::Exam, at(6, 12)),
            Assignment::new("ex2", "Oral", Category::Exam, at(6, 15)),
            Assignment::new("p1", "Model", Category::Project, at(6, 9)),
        ];
        let digest = build_digest(&items, &settings, now()).unwrap();
        assert_eq!(digest.title, "5 assignments due in the next 5 days");
        assert_eq!(
            digest.body,
            "Today:\n• Quiz: Quiz 2 @ 12:00\nTomorrow:\n• Test: Unit test @ 12:00\nFriday 06 Mar: 2 Exams, 1 Project"
        );
    }

    #[test]
    fn body_never_exceeds_ceiling() {
        let mut settings = NotificationSettings::default();
        for c in Category::ALL {
            settings.set_lead_days(c, 14);
        }
        let items: Vec<Assignment> = (0..300)
            .map(|i| {
                let c = Category::ALL[i % Category::ALL.len()];
                Assignment::new(
                    format!("a{i}"),
                    format!("A rather long assignment title number {i}"),
                    c,
                    now() + Duration::hours(1 + (i as i64 % 300)),
                )
                .with_course("COURSE 101", "")
            })
            .collect();
        let digest = build_digest(&items, &settings, now()).unwrap();
        assert!(digest.body.chars().count() <= DIGEST_BODY_MAX_CHARS);
        assert_eq!(digest.assignment_count, 300);
    }

    #[tokio::test]
    async fn empty_horizon_cancels_and_schedules_nothing() {
        let t = InMemoryTransport::new();
        let settings = NotificationSettings::default();
        let old = vec![Assignment::new("hw1", "Set", Category::Homework, at(3, 9))];
        assert!(schedule_digest(&t, &old, &settings, now(), false).await.is_some());
        assert!(t.get(DIGEST_IDENTIFIER).await.is_some());

        let far = vec![Assignment::new("hw1", "Set", Category::Homework, at(12, 9))];
        assert_eq!(schedule_digest(&t, &far, &settings, now(), false).await, None);
        assert!(t.get(DIGEST_IDENTIFIER).await.is_none());
    }

    #[tokio::test]
    async fn fires_at_next_notification_time_or_immediately() {
        let t = InMemoryTransport::new();
        let settings = NotificationSettings {
            notification_time: NaiveTime::from_hms_opt(6, 30, 0).unwrap(),
            ..Default::default()
        };
        let items = vec![Assignment::new("ex1", "Final", Category::Exam, at(5, 9))];

        // 06:30 already passed at 07:00, so tomorrow.
        let fire = schedule_digest(&t, &items, &settings, now(), false).await;
        assert_eq!(fire, Some(at(3, 6) + Duration::minutes(30)));

        let fire = schedule_digest(&t, &items, &settings, now(), true).await;
        assert_eq!(fire, Some(now() + Duration::seconds(5)));
        assert_eq!(t.entries().await.len(), 1);
    }
}
