use std::collections::BTreeSet;

use chrono::{
  DateTime,
  NaiveDate,
  TimeZone,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};
use uuid::Uuid;

use crate::datetime::compact_date_serde;
use crate::delta::{
  Direction,
  DisplayMode,
  format_delta
};

#[derive(
  Debug, Clone, Serialize, Deserialize, PartialEq,
)]
pub struct Timer {
  pub uuid: Uuid,

  pub title: String,

  #[serde(with = "compact_date_serde")]
  pub target: DateTime<Utc>,

  /// Counts up from `target` instead of
  /// down to it.
  #[serde(default)]
  pub counting_up: bool,

  #[serde(default)]
  pub mode: DisplayMode,

  #[serde(default)]
  pub notify: bool,

  #[serde(with = "compact_date_serde")]
  pub created: DateTime<Utc>
}

impl Timer {
  pub fn new(
    title: String,
    target: DateTime<Utc>,
    now: DateTime<Utc>
  ) -> Self {
    Self {
      uuid: Uuid::new_v4(),
      title,
      target,
      counting_up: false,
      mode: DisplayMode::Auto,
      notify: false,
      created: now
    }
  }

  pub fn direction(&self) -> Direction {
    if self.counting_up {
      Direction::CountingUpFrom
    } else {
      Direction::CountingDownTo
    }
  }

  /// Display text at `now`, with calendar
  /// components taken in `tz`.
  pub fn display<Tz: TimeZone>(
    &self,
    now: DateTime<Utc>,
    tz: &Tz
  ) -> String {
    format_delta(
      &now.with_timezone(tz),
      &self.target.with_timezone(tz),
      self.direction(),
      self.mode
    )
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize, PartialEq,
)]
pub struct Event {
  pub uuid: Uuid,

  pub title: String,

  #[serde(with = "compact_date_serde")]
  pub at: DateTime<Utc>,

  #[serde(default)]
  pub notify: bool,

  #[serde(with = "compact_date_serde")]
  pub created: DateTime<Utc>
}

impl Event {
  pub fn new(
    title: String,
    at: DateTime<Utc>,
    now: DateTime<Utc>
  ) -> Self {
    Self {
      uuid: Uuid::new_v4(),
      title,
      at,
      notify: false,
      created: now
    }
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize, PartialEq,
)]
pub struct Note {
  pub uuid: Uuid,

  pub title: String,

  #[serde(default)]
  pub body: String,

  #[serde(with = "compact_date_serde")]
  pub at: DateTime<Utc>,

  #[serde(
    default,
    with = "compact_date_serde::vec"
  )]
  pub repeat_dates: Vec<DateTime<Utc>>,

  #[serde(default)]
  pub notify: bool,

  #[serde(with = "compact_date_serde")]
  pub created: DateTime<Utc>
}

impl Note {
  pub fn new(
    title: String,
    at: DateTime<Utc>,
    now: DateTime<Utc>
  ) -> Self {
    Self {
      uuid: Uuid::new_v4(),
      title,
      body: String::new(),
      at,
      repeat_dates: vec![],
      notify: false,
      created: now
    }
  }

  /// The primary instant followed by each
  /// repeat date.
  pub fn occurrences(
    &self
  ) -> impl Iterator<Item = DateTime<Utc>> + '_
  {
    std::iter::once(self.at).chain(
      self.repeat_dates.iter().copied()
    )
  }
}

/// Calendar days in `tz` that carry at
/// least one event or note occurrence.
pub fn marker_dates<Tz: TimeZone>(
  events: &[Event],
  notes: &[Note],
  tz: &Tz
) -> BTreeSet<NaiveDate> {
  events
    .iter()
    .map(|event| event.at)
    .chain(
      notes
        .iter()
        .flat_map(Note::occurrences)
    )
    .map(|at| {
      at.with_timezone(tz).date_naive()
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    TimeZone,
    Utc
  };
  use chrono_tz::Tz;

  use super::*;

  fn at(
    y: i32,
    m: u32,
    d: u32,
    h: u32
  ) -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(y, m, d, h, 0, 0)
      .single()
      .expect("valid instant")
  }

  #[test]
  fn timer_serializes_compact_dates() {
    let now = at(2026, 2, 17, 12);
    let mut timer = Timer::new(
      "launch".to_string(),
      at(2026, 3, 1, 0),
      now
    );
    timer.mode = DisplayMode::Days;

    let json = serde_json::to_value(&timer)
      .expect("serialize timer");
    assert_eq!(json["target"], "20260301T000000Z");
    assert_eq!(json["mode"], "days");

    let back: Timer =
      serde_json::from_value(json)
        .expect("deserialize timer");
    assert_eq!(back, timer);
  }

  #[test]
  fn missing_optional_fields_default() {
    let raw = r#"{
      "uuid": "67e55044-10b1-426f-9247-bb680e5fe0c8",
      "title": "quit smoking",
      "target": "20250101T000000Z",
      "created": "20250101T000000Z"
    }"#;
    let timer: Timer = serde_json::from_str(raw)
      .expect("deserialize timer");
    assert!(!timer.counting_up);
    assert_eq!(timer.mode, DisplayMode::Auto);
    assert!(!timer.notify);
  }

  #[test]
  fn timer_display_respects_direction() {
    let now = at(2026, 2, 17, 12);
    let mut timer = Timer::new(
      "since".to_string(),
      now - Duration::days(2),
      now
    );
    assert_eq!(
      timer.display(now, &Utc),
      "Time's up"
    );
    timer.counting_up = true;
    assert_eq!(timer.display(now, &Utc), "2d");
  }

  #[test]
  fn timer_display_counts_days_in_display_zone()
  {
    let tz: Tz = "America/New_York"
      .parse()
      .expect("valid tz");
    // Noon local on both ends, across the
    // spring-forward night.
    let now = at(2024, 3, 9, 17);
    let timer = Timer::new(
      "trip".to_string(),
      at(2024, 3, 12, 16),
      now
    );
    assert_eq!(timer.display(now, &tz), "3d");
    assert_eq!(
      timer.display(now, &Utc),
      "2d 23h"
    );
  }

  #[test]
  fn markers_use_display_zone_days() {
    let tz: Tz = "America/Mexico_City"
      .parse()
      .expect("valid tz");
    let now = at(2026, 2, 17, 12);
    // 03:00 UTC is still the previous
    // evening in Mexico City.
    let event = Event::new(
      "dinner".to_string(),
      at(2026, 2, 20, 3),
      now
    );
    let mut note = Note::new(
      "standup".to_string(),
      at(2026, 2, 2, 15),
      now
    );
    note.repeat_dates =
      vec![at(2026, 2, 9, 15), at(2026, 2, 16, 15)];

    let days = marker_dates(
      &[event],
      &[note],
      &tz
    );
    let rendered: Vec<String> = days
      .iter()
      .map(|d| d.format("%m-%d").to_string())
      .collect();
    assert_eq!(
      rendered,
      ["02-02", "02-09", "02-16", "02-19"]
    );
  }
}
