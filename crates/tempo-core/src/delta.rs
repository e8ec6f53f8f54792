//! Relative-time display for timers.
//!
//! Everything here is a pure function of its inputs; callers re-run it on
//! every tick.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Days,
  Duration,
  Months,
  NaiveDateTime,
  TimeZone
};
use serde::{
  Deserialize,
  Serialize
};

pub const TIMES_UP: &str = "Time's up";

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

// Fixed-ratio approximations kept for
// output compatibility with stored timers.
const DAYS_PER_YEAR: f64 = 365.25;
const DAYS_PER_MONTH: f64 = 30.44;

const MAX_GAP_MINUTES: i64 = 24 * 60;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Direction {
  CountingDownTo,
  CountingUpFrom
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
  #[default]
  Auto,
  Years,
  Months,
  Days,
  Hours,
  Minutes,
  Seconds
}

impl DisplayMode {
  pub const ALL: [DisplayMode; 7] = [
    DisplayMode::Auto,
    DisplayMode::Years,
    DisplayMode::Months,
    DisplayMode::Days,
    DisplayMode::Hours,
    DisplayMode::Minutes,
    DisplayMode::Seconds
  ];

  pub fn as_key(self) -> &'static str {
    match self {
      | DisplayMode::Auto => "auto",
      | DisplayMode::Years => "years",
      | DisplayMode::Months => "months",
      | DisplayMode::Days => "days",
      | DisplayMode::Hours => "hours",
      | DisplayMode::Minutes => {
        "minutes"
      }
      | DisplayMode::Seconds => {
        "seconds"
      }
    }
  }
}

impl fmt::Display for DisplayMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

impl FromStr for DisplayMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let lower =
      s.trim().to_ascii_lowercase();
    DisplayMode::ALL
      .into_iter()
      .find(|mode| {
        mode.as_key() == lower
      })
      .ok_or_else(|| {
        anyhow!(
          "unknown display mode: {s} \
           (expected one of auto, \
           years, months, days, \
           hours, minutes, seconds)"
        )
      })
  }
}

/// Calendar components of a non-negative
/// span. Months are stepped on the real
/// calendar, so their length varies.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub struct CalendarBreakdown {
  pub years:   i64,
  pub months:  i64,
  pub days:    i64,
  pub hours:   i64,
  pub minutes: i64,
  pub seconds: i64
}

impl CalendarBreakdown {
  /// Renders the non-zero components as
  /// `1y 2mo 3d 4h 5m 6s`.
  pub fn compact(&self) -> String {
    [
      (self.years, "y"),
      (self.months, "mo"),
      (self.days, "d"),
      (self.hours, "h"),
      (self.minutes, "m"),
      (self.seconds, "s")
    ]
    .into_iter()
    .filter(|(value, _)| *value > 0)
    .map(|(value, unit)| {
      format!("{value}{unit}")
    })
    .collect::<Vec<_>>()
    .join(" ")
  }
}

/// Formats the span between `reference`
/// (usually now) and `target`.
///
/// A countdown runs from `reference` to
/// `target`, a from-date timer from
/// `target` to `reference`. When the end
/// precedes the start the result is
/// [`TIMES_UP`] in every mode.
pub fn format_delta<Tz: TimeZone>(
  reference: &DateTime<Tz>,
  target: &DateTime<Tz>,
  direction: Direction,
  mode: DisplayMode
) -> String {
  let (start, end) = match direction {
    | Direction::CountingDownTo => {
      (reference, target)
    }
    | Direction::CountingUpFrom => {
      (target, reference)
    }
  };

  if end < start {
    return TIMES_UP.to_string();
  }

  let diff = end
    .clone()
    .signed_duration_since(start.clone());
  let secs = diff.num_seconds();

  match mode {
    | DisplayMode::Years => {
      format!(
        "{:.2} years",
        fractional(secs, DAYS_PER_YEAR)
      )
    }
    | DisplayMode::Months => {
      format!(
        "{:.2} months",
        fractional(secs, DAYS_PER_MONTH)
      )
    }
    | DisplayMode::Days => {
      format!(
        "{} days",
        secs / SECONDS_PER_DAY
      )
    }
    | DisplayMode::Hours => {
      format!(
        "{} hours",
        secs / SECONDS_PER_HOUR
      )
    }
    | DisplayMode::Minutes => {
      format!(
        "{} minutes",
        secs / SECONDS_PER_MINUTE
      )
    }
    | DisplayMode::Seconds => {
      format!("{secs} seconds")
    }
    | DisplayMode::Auto => {
      calendar_breakdown(start, end)
        .compact()
    }
  }
}

fn fractional(
  secs: i64,
  days_per_unit: f64
) -> f64 {
  secs as f64
    / (days_per_unit
      * SECONDS_PER_DAY as f64)
}

/// Splits `end - start` into calendar
/// components in the instants' own time
/// zone. Returns zeros when `end <= start`.
///
/// Months and days are stepped on the local
/// calendar of `start`, so a day across a
/// DST change still counts as one day.
pub fn calendar_breakdown<Tz: TimeZone>(
  start: &DateTime<Tz>,
  end: &DateTime<Tz>
) -> CalendarBreakdown {
  if end <= start {
    return CalendarBreakdown::default();
  }

  let start_local = start.naive_local();
  let end_local = end
    .with_timezone(&start.timezone())
    .naive_local();

  let mut months =
    (i64::from(end_local.year())
      - i64::from(start_local.year()))
      * 12
      + i64::from(end_local.month())
      - i64::from(start_local.month());
  months = months.max(0);

  // The estimate overshoots by one when the
  // end falls earlier in its month than the
  // start did.
  let (month_base, month_anchor) = loop {
    match step_local(start, months, 0) {
      | Some((base, anchor))
        if anchor <= *end =>
      {
        break (base, anchor);
      }
      | _ if months > 0 => months -= 1,
      | _ => {
        break (start_local, start.clone());
      }
    }
  };

  let mut days = (end_local.date()
    - month_base.date())
  .num_days()
  .max(0);
  let anchor = loop {
    match step_local(start, months, days) {
      | Some((_, anchor))
        if anchor <= *end =>
      {
        break anchor;
      }
      | _ if days > 0 => days -= 1,
      | _ => break month_anchor.clone()
    }
  };

  let mut secs = end
    .clone()
    .signed_duration_since(anchor)
    .max(Duration::zero())
    .num_seconds();
  let hours = secs / SECONDS_PER_HOUR;
  secs %= SECONDS_PER_HOUR;
  let minutes = secs / SECONDS_PER_MINUTE;
  secs %= SECONDS_PER_MINUTE;

  CalendarBreakdown {
    years: months / 12,
    months: months % 12,
    days,
    hours,
    minutes,
    seconds: secs
  }
}

/// `start` moved by whole months then days
/// on its local wall clock, with the naive
/// local time it aimed for.
fn step_local<Tz: TimeZone>(
  start: &DateTime<Tz>,
  months: i64,
  days: i64
) -> Option<(NaiveDateTime, DateTime<Tz>)> {
  if months == 0 && days == 0 {
    return Some((
      start.naive_local(),
      start.clone()
    ));
  }
  let local = start
    .naive_local()
    .checked_add_months(Months::new(
      u32::try_from(months).ok()?
    ))?
    .checked_add_days(Days::new(
      u64::try_from(days).ok()?
    ))?;
  let resolved =
    resolve_local(&start.timezone(), local)?;
  Some((local, resolved))
}

/// Ambiguous wall times take the earlier
/// instant; times inside a DST gap move to
/// the first valid minute after it.
fn resolve_local<Tz: TimeZone>(
  tz: &Tz,
  local: NaiveDateTime
) -> Option<DateTime<Tz>> {
  tz.from_local_datetime(&local)
    .earliest()
    .or_else(|| {
      (1..=MAX_GAP_MINUTES).find_map(
        |minutes| {
          let later = local
            .checked_add_signed(
              Duration::try_minutes(
                minutes
              )?
            )?;
          tz.from_local_datetime(&later)
            .earliest()
        }
      )
    })
}

#[cfg(test)]
mod tests {
  use chrono::{
    DateTime,
    Duration,
    TimeZone,
    Utc
  };

  use super::*;

  fn utc(
    y: i32,
    mo: u32,
    d: u32,
    h: u32,
    mi: u32,
    s: u32
  ) -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(y, mo, d, h, mi, s)
      .single()
      .expect("valid instant")
  }

  #[test]
  fn equal_instants_render_empty_in_auto_mode()
  {
    let now = utc(2026, 2, 17, 12, 0, 0);
    assert_eq!(
      format_delta(
        &now,
        &now,
        Direction::CountingDownTo,
        DisplayMode::Auto
      ),
      ""
    );
    assert_eq!(
      format_delta(
        &now,
        &now,
        Direction::CountingDownTo,
        DisplayMode::Years
      ),
      "0.00 years"
    );
    assert_eq!(
      format_delta(
        &now,
        &now,
        Direction::CountingUpFrom,
        DisplayMode::Seconds
      ),
      "0 seconds"
    );
  }

  #[test]
  fn past_end_is_times_up_for_every_mode() {
    let now = utc(2026, 2, 17, 12, 0, 0);
    let earlier = now - Duration::hours(3);
    let later = now + Duration::hours(3);

    for mode in DisplayMode::ALL {
      assert_eq!(
        format_delta(
          &now,
          &earlier,
          Direction::CountingDownTo,
          mode
        ),
        TIMES_UP
      );
      assert_eq!(
        format_delta(
          &now,
          &later,
          Direction::CountingUpFrom,
          mode
        ),
        TIMES_UP
      );
    }
  }

  #[test]
  fn numeric_modes_use_fixed_ratios() {
    let start = utc(2026, 1, 1, 0, 0, 0);

    let two_days =
      start + Duration::seconds(172_800);
    assert_eq!(
      format_delta(
        &start,
        &two_days,
        Direction::CountingDownTo,
        DisplayMode::Days
      ),
      "2 days"
    );

    let year = start
      + Duration::seconds(31_557_600);
    assert_eq!(
      format_delta(
        &start,
        &year,
        Direction::CountingDownTo,
        DisplayMode::Years
      ),
      "1.00 years"
    );

    let month =
      start + Duration::days(61);
    assert_eq!(
      format_delta(
        &start,
        &month,
        Direction::CountingDownTo,
        DisplayMode::Months
      ),
      "2.00 months"
    );

    let partial = start
      + Duration::minutes(150)
      + Duration::seconds(59);
    assert_eq!(
      format_delta(
        &start,
        &partial,
        Direction::CountingDownTo,
        DisplayMode::Hours
      ),
      "2 hours"
    );
    assert_eq!(
      format_delta(
        &start,
        &partial,
        Direction::CountingDownTo,
        DisplayMode::Minutes
      ),
      "150 minutes"
    );
  }

  #[test]
  fn counting_up_measures_from_target_to_now()
  {
    let born = utc(2020, 3, 10, 8, 0, 0);
    let now = utc(2026, 5, 12, 9, 30, 15);
    assert_eq!(
      format_delta(
        &now,
        &born,
        Direction::CountingUpFrom,
        DisplayMode::Auto
      ),
      "6y 2mo 2d 1h 30m 15s"
    );
  }

  #[test]
  fn ninety_days_follows_the_calendar() {
    let leap = utc(2024, 1, 1, 0, 0, 0);
    let leap_end = leap + Duration::days(90);
    assert_eq!(
      format_delta(
        &leap,
        &leap_end,
        Direction::CountingDownTo,
        DisplayMode::Auto
      ),
      "2mo 30d"
    );

    let plain = utc(2023, 1, 1, 0, 0, 0);
    let plain_end =
      plain + Duration::days(90);
    assert_eq!(
      format_delta(
        &plain,
        &plain_end,
        Direction::CountingDownTo,
        DisplayMode::Auto
      ),
      "3mo"
    );
  }

  #[test]
  fn month_end_start_clamps_before_counting_days()
  {
    let start = utc(2023, 1, 31, 0, 0, 0);
    let end = utc(2023, 3, 1, 0, 0, 0);
    let parts =
      calendar_breakdown(&start, &end);
    assert_eq!(parts.months, 1);
    assert_eq!(parts.days, 1);
  }

  #[test]
  fn very_large_spans_do_not_overflow() {
    let start = utc(1, 1, 1, 0, 0, 0);
    let end = utc(9999, 12, 31, 23, 59, 59);
    assert_eq!(
      format_delta(
        &start,
        &end,
        Direction::CountingDownTo,
        DisplayMode::Auto
      ),
      "9998y 11mo 30d 23h 59m 59s"
    );
    assert!(
      format_delta(
        &start,
        &end,
        Direction::CountingDownTo,
        DisplayMode::Seconds
      )
      .ends_with(" seconds")
    );
  }

  fn new_york(
    y: i32,
    mo: u32,
    d: u32,
    h: u32,
    mi: u32
  ) -> DateTime<chrono_tz::Tz> {
    chrono_tz::America::New_York
      .with_ymd_and_hms(y, mo, d, h, mi, 0)
      .earliest()
      .expect("valid local time")
  }

  #[test]
  fn spring_forward_day_still_counts_as_a_day()
  {
    // 2024-03-10 is 23 hours long in New
    // York.
    let start = new_york(2024, 3, 9, 12, 0);
    let end = new_york(2024, 3, 12, 12, 0);
    assert_eq!(
      format_delta(
        &start,
        &end,
        Direction::CountingDownTo,
        DisplayMode::Auto
      ),
      "3d"
    );
    assert_eq!(
      format_delta(
        &start,
        &end,
        Direction::CountingDownTo,
        DisplayMode::Hours
      ),
      "71 hours"
    );
  }

  #[test]
  fn fall_back_day_still_counts_as_a_day() {
    let start = new_york(2024, 11, 2, 12, 0);
    let end = new_york(2024, 11, 4, 12, 0);
    assert_eq!(
      format_delta(
        &start,
        &end,
        Direction::CountingDownTo,
        DisplayMode::Auto
      ),
      "2d"
    );

    let evening =
      new_york(2024, 11, 3, 18, 30);
    assert_eq!(
      format_delta(
        &start,
        &evening,
        Direction::CountingDownTo,
        DisplayMode::Auto
      ),
      "1d 6h 30m"
    );
  }

  #[test]
  fn month_step_into_dst_gap_keeps_the_month()
  {
    // 02:30 does not exist on 2024-03-10.
    let start = new_york(2024, 2, 10, 2, 30);
    let parts = calendar_breakdown(
      &start,
      &new_york(2024, 3, 11, 2, 30)
    );
    assert_eq!(
      (parts.months, parts.days, parts.hours),
      (1, 1, 0)
    );

    let after_gap =
      new_york(2024, 3, 10, 3, 0);
    assert_eq!(
      format_delta(
        &start,
        &after_gap,
        Direction::CountingDownTo,
        DisplayMode::Auto
      ),
      "1mo"
    );
  }

  #[test]
  fn ambiguous_wall_time_takes_first_pass() {
    // 01:30 happens twice on 2024-11-03.
    let start = new_york(2024, 10, 3, 1, 30);
    let end = new_york(2024, 11, 3, 1, 30);
    let parts =
      calendar_breakdown(&start, &end);
    assert_eq!(parts.months, 1);
    assert_eq!(parts.days, 0);
    assert_eq!(parts.hours, 0);
  }

  #[test]
  fn display_mode_parses_keys() {
    assert_eq!(
      "Hours"
        .parse::<DisplayMode>()
        .expect("parse mode"),
      DisplayMode::Hours
    );
    assert!(
      "fortnights"
        .parse::<DisplayMode>()
        .is_err()
    );
    assert_eq!(
      DisplayMode::default().to_string(),
      "auto"
    );
  }
}
