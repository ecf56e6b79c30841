//! Playlist and playlist-item wire shapes.

use std::collections::BTreeSet;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A day of the week, 0 = Sunday .. 6 = Saturday, matching the wire contract.
pub type DayOfWeek = u8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub id: Uuid,
    pub playlist_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub content_id: Option<Uuid>,
    pub url: String,
    /// `0` means "display until replaced".
    pub duration_seconds: u32,
    pub order_index: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time_window_start: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub time_window_end: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub days_of_week: Option<BTreeSet<DayOfWeek>>,
}

impl PlaylistItem {
    /// Whether this item is eligible right now given its day/time constraints.
    /// `now` and `today` are supplied by the caller so the check stays pure
    /// and testable without wall-clock access.
    pub fn is_eligible_at(&self, today: chrono::Weekday, now: NaiveTime) -> bool {
        if let Some(days) = &self.days_of_week {
            let wire_day = weekday_to_wire(today);
            if !days.contains(&wire_day) {
                return false;
            }
        }
        if let (Some(start), Some(end)) = (self.time_window_start, self.time_window_end) {
            // Inclusive start, exclusive end, per the wire contract.
            if start <= end {
                if now < start || now >= end {
                    return false;
                }
            } else {
                // Window wraps past midnight.
                if now < start && now >= end {
                    return false;
                }
            }
        }
        true
    }
}

/// Converts a [`chrono::Weekday`] (Monday = 0) into the wire day-of-week
/// convention (Sunday = 0).
pub fn weekday_to_wire(day: chrono::Weekday) -> DayOfWeek {
    use chrono::Weekday::*;
    match day {
        Sun => 0,
        Mon => 1,
        Tue => 2,
        Wed => 3,
        Thu => 4,
        Fri => 5,
        Sat => 6,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSnapshot {
    pub playlist_id: Uuid,
    pub items: Vec<PlaylistItem>,
    /// Marks this snapshot as a broadcast override rather than an ordinary
    /// assignment update; the receiving engine saves its current position
    /// before applying it instead of treating it as a normal reload.
    #[serde(default)]
    pub broadcast: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(start: Option<&str>, end: Option<&str>, days: Option<&[u8]>) -> PlaylistItem {
        PlaylistItem {
            id: Uuid::nil(),
            playlist_id: Uuid::nil(),
            content_id: None,
            url: "https://example.com".to_string(),
            duration_seconds: 10,
            order_index: 0,
            time_window_start: start.map(|s| s.parse().unwrap()),
            time_window_end: end.map(|s| s.parse().unwrap()),
            days_of_week: days.map(|d| d.iter().copied().collect()),
        }
    }

    #[test]
    fn eligible_at_exact_window_start_inclusive() {
        let it = item(Some("09:00:00"), Some("10:00:00"), None);
        assert!(it.is_eligible_at(chrono::Weekday::Mon, "09:00:00".parse().unwrap()));
    }

    #[test]
    fn not_eligible_at_exact_window_end_exclusive() {
        let it = item(Some("09:00:00"), Some("10:00:00"), None);
        assert!(!it.is_eligible_at(chrono::Weekday::Mon, "10:00:00".parse().unwrap()));
    }

    #[test]
    fn day_of_week_filters_correctly() {
        let it = item(None, None, Some(&[1, 2, 3, 4, 5]));
        assert!(!it.is_eligible_at(chrono::Weekday::Sun, "12:00:00".parse().unwrap()));
        assert!(it.is_eligible_at(chrono::Weekday::Mon, "12:00:00".parse().unwrap()));
    }
}
