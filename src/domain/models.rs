use chrono::Weekday as ChronoWeekday;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MINUTES_PER_DAY: u32 = 1440;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Sunday => "sunday",
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
        }
    }
}

impl From<ChronoWeekday> for Weekday {
    fn from(weekday: ChronoWeekday) -> Self {
        match weekday {
            ChronoWeekday::Sun => Weekday::Sunday,
            ChronoWeekday::Mon => Weekday::Monday,
            ChronoWeekday::Tue => Weekday::Tuesday,
            ChronoWeekday::Wed => Weekday::Wednesday,
            ChronoWeekday::Thu => Weekday::Thursday,
            ChronoWeekday::Fri => Weekday::Friday,
            ChronoWeekday::Sat => Weekday::Saturday,
        }
    }
}

impl std::fmt::Display for Weekday {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayTemplate {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DateSchedule {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateEntry {
    pub id: String,
    pub start_minute: u32,
    pub end_minute: u32,
    pub category: String,
    pub action: String,
    pub purpose: String,
    pub is_goal: bool,
    pub fixed: bool,
}

impl TemplateEntry {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "entry.id")?;
        validate_minute_range(self.start_minute, self.end_minute, "entry")
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    #[default]
    Template,
    AdHoc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DateEntry {
    pub id: String,
    pub start_minute: u32,
    pub end_minute: u32,
    pub category: String,
    pub action: String,
    pub purpose: String,
    pub is_goal: bool,
    pub fixed: bool,
    // Absent on documents written before provenance tracking; those are
    // treated as mirrored, matching the original wipe-on-disable behavior.
    #[serde(default)]
    pub source: EntrySource,
}

impl DateEntry {
    pub fn mirrored_from(entry: &TemplateEntry) -> Self {
        Self {
            id: entry.id.clone(),
            start_minute: entry.start_minute,
            end_minute: entry.end_minute,
            category: entry.category.clone(),
            action: entry.action.clone(),
            purpose: entry.purpose.clone(),
            is_goal: entry.is_goal,
            fixed: entry.fixed,
            source: EntrySource::Template,
        }
    }

    pub fn ad_hoc(
        start_minute: u32,
        end_minute: u32,
        category: impl Into<String>,
        action: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_minute,
            end_minute,
            category: category.into(),
            action: action.into(),
            purpose: purpose.into(),
            is_goal: false,
            fixed: false,
            source: EntrySource::AdHoc,
        }
    }

    pub fn is_mirrored(&self) -> bool {
        self.source == EntrySource::Template
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "entry.id")?;
        validate_minute_range(self.start_minute, self.end_minute, "entry")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeInterval {
    pub id: String,
    pub start: u32,
    pub end: u32,
}

impl TimeInterval {
    pub fn new(id: impl Into<String>, start: u32, end: u32) -> Self {
        Self {
            id: id.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.end > other.start && self.start < other.end
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "interval.id")?;
        if self.end <= self.start {
            return Err(format!(
                "interval.end ({}) must be after interval.start ({})",
                self.end, self.start
            ));
        }
        Ok(())
    }
}

impl From<&DateEntry> for TimeInterval {
    fn from(entry: &DateEntry) -> Self {
        Self {
            id: entry.id.clone(),
            start: entry.start_minute,
            end: entry.end_minute,
        }
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_minute_range(start: u32, end: u32, field_name: &str) -> Result<(), String> {
    if start >= MINUTES_PER_DAY {
        return Err(format!(
            "{field_name}.start_minute must be < {MINUTES_PER_DAY}"
        ));
    }
    if end > MINUTES_PER_DAY {
        return Err(format!(
            "{field_name}.end_minute must be <= {MINUTES_PER_DAY}"
        ));
    }
    if end <= start {
        return Err(format!(
            "{field_name}.end_minute must be after {field_name}.start_minute"
        ));
    }
    Ok(())
}
