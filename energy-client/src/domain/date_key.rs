use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use time::{macros::format_description, Date, OffsetDateTime, UtcOffset};

#[derive(thiserror::Error, Debug)]
#[error("invalid date key '{input}': {reason}")]
pub struct DateKeyError {
    input: String,
    reason: String,
}

/// A calendar day (`YYYY-MM-DD`) in the site's local time.
///
/// Daily baselines and backlog entries are joined on this key, and remote
/// stores address their per-day slot with its string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(Date);

impl DateKey {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    /// Calendar day of `instant` as seen from a fixed UTC offset.
    pub fn from_instant(instant: OffsetDateTime, offset: UtcOffset) -> Self {
        Self(instant.to_offset(offset).date())
    }

    /// Midnight at the start of the day, used as the designated timestamp
    /// of the `daily_energy` table.
    pub fn midnight_utc(self) -> OffsetDateTime {
        self.0.midnight().assume_utc()
    }
}

impl From<Date> for DateKey {
    fn from(date: Date) -> Self {
        Self(date)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl FromStr for DateKey {
    type Err = DateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
            .map(Self)
            .map_err(|e| DateKeyError {
                input: trimmed.to_string(),
                reason: e.to_string(),
            })
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
