//! Assignment model as read from the external assignment store.
//!
//! The engine only ever reads these; it never mutates an assignment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Category {
    Homework,
    Test,
    Exam,
    Project,
    Quiz,
    Lab,
    Essay,
    Presentation,
    Other,
}

impl Category {
    /// Every category, in display order (digest groups follow this order).
    pub const ALL: [Category; 9] = [
        Category::Exam,
        Category::Test,
        Category::Quiz,
        Category::Project,
        Category::Essay,
        Category::Presentation,
        Category::Lab,
        Category::Homework,
        Category::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Homework => "Homework",
            Category::Test => "Test",
            Category::Exam => "Exam",
            Category::Project => "Project",
            Category::Quiz => "Quiz",
            Category::Lab => "Lab",
            Category::Essay => "Essay",
            Category::Presentation => "Presentation",
            Category::Other => "Assignment",
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Category::Homework => "Homework",
            Category::Test => "Tests",
            Category::Exam => "Exams",
            Category::Project => "Projects",
            Category::Quiz => "Quizzes",
            Category::Lab => "Labs",
            Category::Essay => "Essays",
            Category::Presentation => "Presentations",
            Category::Other => "Other",
        }
    }

    /// Count-aware label, e.g. "1 Exam" / "2 Exams".
    pub fn counted(self, n: usize) -> String {
        if n == 1 {
            format!("1 {}", self.label())
        } else {
            format!("{n} {}", self.plural())
        }
    }

    fn slug(self) -> &'static str {
        match self {
            Category::Homework => "homework",
            Category::Test => "test",
            Category::Exam => "exam",
            Category::Project => "project",
            Category::Quiz => "quiz",
            Category::Lab => "lab",
            Category::Essay => "essay",
            Category::Presentation => "presentation",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown assignment category: {0}")]
pub struct ParseCategoryError(pub String);

/// Imports accept any casing (`"Homework"`, `"exam"`), same as `FromStr`.
impl TryFrom<String> for Category {
    type Error = ParseCategoryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.slug() == wanted)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub course_code: String,
    #[serde(default)]
    pub course_name: String,

    /// Due instant (UTC). Local-day logic converts with the settings timezone.
    pub due_date: DateTime<Utc>,

    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_priority: bool,
    pub category: Category,
}

impl Assignment {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        category: Category,
        due_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            course_code: String::new(),
            course_name: String::new(),
            due_date,
            is_completed: false,
            is_priority: false,
            category,
        }
    }

    pub fn with_course(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.course_code = code.into();
        self.course_name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, is_priority: bool) -> Self {
        self.is_priority = is_priority;
        self
    }

    pub fn completed(mut self) -> Self {
        self.is_completed = true;
        self
    }

    /// Overdue means due at or before `now` (millisecond precision).
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.due_date.timestamp_millis() <= now.timestamp_millis()
    }

    /// Completed or overdue assignments must not have live notifications.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_completed && !self.is_overdue(now)
    }

    /// Short course label: code when present, else the course name.
    pub fn course_info(&self) -> Option<&str> {
        [self.course_code.trim(), self.course_name.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
    }
}
