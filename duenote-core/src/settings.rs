//! Notification settings and the per-category reminder policy.

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::assignment::Category;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// User-configurable notification preferences.
///
/// Stored as an opaque blob by the settings store; any field missing from a
/// stored blob falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,

    /// Time of day (local) for daily reminders and the digest.
    pub notification_time: NaiveTime,

    /// IANA timezone name used for every local-day computation.
    pub timezone: String,

    pub homework_reminder_days: u32,
    pub test_reminder_days: u32,
    pub exam_reminder_days: u32,
    pub project_reminder_days: u32,
    pub quiz_reminder_days: u32,
    pub lab_reminder_days: u32,
    pub essay_reminder_days: u32,
    pub presentation_reminder_days: u32,
    pub other_reminder_days: u32,

    pub daily_reminders_for_exams: bool,
    pub daily_reminders_for_tests: bool,
    pub daily_reminders_for_quizzes: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            notification_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            timezone: "UTC".to_string(),
            homework_reminder_days: 1,
            test_reminder_days: 3,
            exam_reminder_days: 7,
            project_reminder_days: 5,
            quiz_reminder_days: 2,
            lab_reminder_days: 1,
            essay_reminder_days: 3,
            presentation_reminder_days: 2,
            other_reminder_days: 1,
            daily_reminders_for_exams: true,
            daily_reminders_for_tests: true,
            daily_reminders_for_quizzes: false,
        }
    }
}

impl NotificationSettings {
    pub fn tz(&self) -> Result<Tz, SettingsError> {
        self.timezone
            .parse()
            .map_err(|_| SettingsError::InvalidTimezone(self.timezone.clone()))
    }

    /// Like [`Self::tz`], but an unknown zone degrades to UTC.
    pub fn tz_or_utc(&self) -> Tz {
        self.tz().unwrap_or(Tz::UTC)
    }

    pub fn lead_days(&self, category: Category) -> u32 {
        match category {
            Category::Homework => self.homework_reminder_days,
            Category::Test => self.test_reminder_days,
            Category::Exam => self.exam_reminder_days,
            Category::Project => self.project_reminder_days,
            Category::Quiz => self.quiz_reminder_days,
            Category::Lab => self.lab_reminder_days,
            Category::Essay => self.essay_reminder_days,
            Category::Presentation => self.presentation_reminder_days,
            Category::Other => self.other_reminder_days,
        }
    }

    /// Only exams, tests and quizzes have a daily mode.
    pub fn daily_enabled(&self, category: Category) -> bool {
        match category {
            Category::Exam => self.daily_reminders_for_exams,
            Category::Test => self.daily_reminders_for_tests,
            Category::Quiz => self.daily_reminders_for_quizzes,
            Category::Homework
            | Category::Project
            | Category::Lab
            | Category::Essay
            | Category::Presentation
            | Category::Other => false,
        }
    }

    pub fn set_lead_days(&mut self, category: Category, days: u32) {
        let slot = match category {
            Category::Homework => &mut self.homework_reminder_days,
            Category::Test => &mut self.test_reminder_days,
            Category::Exam => &mut self.exam_reminder_days,
            Category::Project => &mut self.project_reminder_days,
            Category::Quiz => &mut self.quiz_reminder_days,
            Category::Lab => &mut self.lab_reminder_days,
            Category::Essay => &mut self.essay_reminder_days,
            Category::Presentation => &mut self.presentation_reminder_days,
            Category::Other => &mut self.other_reminder_days,
        };
        *slot = days;
    }

    /// Returns false when the category has no daily mode.
    pub fn set_daily_enabled(&mut self, category: Category, on: bool) -> bool {
        let slot = match category {
            Category::Exam => &mut self.daily_reminders_for_exams,
            Category::Test => &mut self.daily_reminders_for_tests,
            Category::Quiz => &mut self.daily_reminders_for_quizzes,
            _ => return false,
        };
        *slot = on;
        true
    }
}
