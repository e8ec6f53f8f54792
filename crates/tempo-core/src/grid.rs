//! Month grid layout and event-day
//! markers.

use std::collections::BTreeSet;

use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Weekday
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
  #[error(
    "month must be between 1 and 12, \
     got {0}"
  )]
  InvalidMonth(u32),
  #[error(
    "weekday index must be between 0 \
     (sunday) and 6 (saturday), got {0}"
  )]
  InvalidWeekday(u8),
  #[error("unknown weekday: {0}")]
  UnknownWeekday(String),
  #[error(
    "year {0} is outside the supported \
     calendar range"
  )]
  YearOutOfRange(i64)
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub struct MonthSpec {
  year:          i32,
  month:         u32,
  first_weekday: Weekday
}

impl MonthSpec {
  pub fn new(
    year: i32,
    month: u32,
    first_weekday: Weekday
  ) -> Result<Self, GridError> {
    if !(1..=12).contains(&month) {
      return Err(
        GridError::InvalidMonth(month)
      );
    }
    if NaiveDate::from_ymd_opt(
      year, month, 1
    )
    .is_none()
    {
      return Err(
        GridError::YearOutOfRange(
          i64::from(year)
        )
      );
    }
    Ok(Self {
      year,
      month,
      first_weekday
    })
  }

  /// The month `offset` months away from
  /// the month containing `reference`.
  pub fn from_offset(
    reference: NaiveDate,
    offset: i64,
    first_weekday: Weekday
  ) -> Result<Self, GridError> {
    let index = (i64::from(reference.year())
      * 12
      + i64::from(reference.month0()))
    .checked_add(offset)
    .ok_or(GridError::YearOutOfRange(
      offset.signum() * i64::MAX / 12
    ))?;
    let year = index.div_euclid(12);
    let month0 = index.rem_euclid(12);
    let year = i32::try_from(year)
      .map_err(|_| {
        GridError::YearOutOfRange(year)
      })?;
    Self::new(
      year,
      month0 as u32 + 1,
      first_weekday
    )
  }

  pub fn year(&self) -> i32 {
    self.year
  }

  pub fn month(&self) -> u32 {
    self.month
  }

  pub fn first_weekday(&self) -> Weekday {
    self.first_weekday
  }

  pub fn first_day(&self) -> NaiveDate {
    NaiveDate::from_ymd_opt(
      self.year, self.month, 1
    )
    .unwrap_or(NaiveDate::MIN)
  }

  pub fn days_in_month(&self) -> u32 {
    let (next_year, next_month) =
      if self.month == 12 {
        (self.year.saturating_add(1), 1)
      } else {
        (self.year, self.month + 1)
      };
    NaiveDate::from_ymd_opt(
      next_year, next_month, 1
    )
    .and_then(|next| next.pred_opt())
    .map(|last| last.day())
    // December of the last representable
    // year has no successor month.
    .unwrap_or(31)
  }

  pub fn leading_blanks(&self) -> usize {
    let first = self
      .first_day()
      .weekday()
      .num_days_from_sunday();
    let start = self
      .first_weekday
      .num_days_from_sunday();
    ((first + 7 - start) % 7) as usize
  }

  pub fn title(&self) -> String {
    self.first_day().format("%B %Y").to_string()
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum DayCell {
  Blank,
  Day(NaiveDate)
}

impl DayCell {
  pub fn date(&self) -> Option<NaiveDate> {
    match self {
      | DayCell::Blank => None,
      | DayCell::Day(date) => Some(*date)
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
  pub spec:  MonthSpec,
  pub cells: Vec<DayCell>,
  markers:   BTreeSet<NaiveDate>
}

impl MonthGrid {
  /// Calendar-day membership; the time of
  /// day of `date` is ignored.
  pub fn has_marker<D: Datelike>(
    &self,
    date: &D
  ) -> bool {
    calendar_day(date).is_some_and(
      |day| self.markers.contains(&day)
    )
  }

  pub fn markers(
    &self
  ) -> impl Iterator<Item = &NaiveDate> {
    self.markers.iter()
  }

  pub fn days(
    &self
  ) -> impl Iterator<Item = NaiveDate> + '_
  {
    self
      .cells
      .iter()
      .filter_map(DayCell::date)
  }

  /// Cells with trailing blanks added so
  /// the final week row is complete.
  pub fn padded_cells(&self) -> Vec<DayCell> {
    let mut cells = self.cells.clone();
    let short = cells.len() % 7;
    if short != 0 {
      cells.extend(
        std::iter::repeat_n(
          DayCell::Blank,
          7 - short
        )
      );
    }
    cells
  }

  /// Week rows; the last one may hold
  /// fewer than seven cells.
  pub fn weeks(&self) -> Vec<&[DayCell]> {
    self.cells.chunks(7).collect()
  }
}

pub fn build_grid<I, D>(
  spec: MonthSpec,
  markers: I
) -> MonthGrid
where
  I: IntoIterator<Item = D>,
  D: Datelike
{
  let blanks = spec.leading_blanks();
  let days = spec.days_in_month();
  let first = spec.first_day();

  let mut cells = Vec::with_capacity(
    blanks + days as usize
  );
  cells.extend(std::iter::repeat_n(
    DayCell::Blank,
    blanks
  ));
  cells.extend(
    (0..i64::from(days))
      .filter_map(|offset| {
        first.checked_add_signed(
          Duration::days(offset)
        )
      })
      .map(DayCell::Day)
  );

  let markers = markers
    .into_iter()
    .filter_map(|date| calendar_day(&date))
    .collect::<BTreeSet<_>>();

  tracing::trace!(
    year = spec.year,
    month = spec.month,
    blanks,
    days,
    markers = markers.len(),
    "built month grid"
  );

  MonthGrid {
    spec,
    cells,
    markers
  }
}

/// True when both values fall on the same
/// calendar day.
pub fn same_day<A, B>(a: &A, b: &B) -> bool
where
  A: Datelike,
  B: Datelike
{
  a.year() == b.year()
    && a.month() == b.month()
    && a.day() == b.day()
}

pub fn weekday_from_index(
  index: u8
) -> Result<Weekday, GridError> {
  match index {
    | 0 => Ok(Weekday::Sun),
    | 1 => Ok(Weekday::Mon),
    | 2 => Ok(Weekday::Tue),
    | 3 => Ok(Weekday::Wed),
    | 4 => Ok(Weekday::Thu),
    | 5 => Ok(Weekday::Fri),
    | 6 => Ok(Weekday::Sat),
    | other => {
      Err(GridError::InvalidWeekday(other))
    }
  }
}

/// Accepts `monday`/`mon` style names or
/// the Sunday-based index `0..=6`.
pub fn parse_week_start(
  raw: &str
) -> Result<Weekday, GridError> {
  let trimmed = raw.trim();
  if let Ok(index) = trimmed.parse::<u8>()
  {
    return weekday_from_index(index);
  }
  trimmed.parse::<Weekday>().map_err(
    |_| {
      GridError::UnknownWeekday(
        trimmed.to_string()
      )
    }
  )
}

pub fn weekday_labels(
  first_weekday: Weekday
) -> Vec<&'static str> {
  let mut day = first_weekday;
  let mut labels = Vec::with_capacity(7);
  for _ in 0..7 {
    labels.push(short_weekday(day));
    day = day.succ();
  }
  labels
}

fn short_weekday(day: Weekday) -> &'static str {
  match day {
    | Weekday::Mon => "Mon",
    | Weekday::Tue => "Tue",
    | Weekday::Wed => "Wed",
    | Weekday::Thu => "Thu",
    | Weekday::Fri => "Fri",
    | Weekday::Sat => "Sat",
    | Weekday::Sun => "Sun"
  }
}

fn calendar_day<D: Datelike>(
  date: &D
) -> Option<NaiveDate> {
  NaiveDate::from_ymd_opt(
    date.year(),
    date.month(),
    date.day()
  )
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc,
    Weekday
  };

  use super::*;

  fn date(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn january_2024_starts_on_monday() {
    let spec =
      MonthSpec::new(2024, 1, Weekday::Mon)
        .expect("valid month");
    let grid = build_grid(
      spec,
      Vec::<NaiveDate>::new()
    );
    assert_eq!(spec.leading_blanks(), 0);
    assert_eq!(grid.cells.len(), 31);
    assert_eq!(
      grid.cells[0],
      DayCell::Day(date(2024, 1, 1))
    );
    assert_eq!(
      grid.cells[30],
      DayCell::Day(date(2024, 1, 31))
    );
  }

  #[test]
  fn february_2024_has_three_blanks_and_leap_day()
  {
    let spec =
      MonthSpec::new(2024, 2, Weekday::Mon)
        .expect("valid month");
    let grid = build_grid(
      spec,
      Vec::<NaiveDate>::new()
    );
    assert_eq!(
      &grid.cells[..3],
      &[DayCell::Blank; 3]
    );
    assert_eq!(grid.days().count(), 29);
    assert_eq!(grid.cells.len(), 32);
    assert_eq!(
      grid.cells.last(),
      Some(&DayCell::Day(date(2024, 2, 29)))
    );
  }

  #[test]
  fn sunday_first_shifts_blanks() {
    let spec =
      MonthSpec::new(2024, 1, Weekday::Sun)
        .expect("valid month");
    assert_eq!(spec.leading_blanks(), 1);
    let feb_2023 =
      MonthSpec::new(2023, 2, Weekday::Mon)
        .expect("valid month");
    assert_eq!(feb_2023.days_in_month(), 28);
  }

  #[test]
  fn trailing_row_is_not_padded_by_default()
  {
    let spec =
      MonthSpec::new(2024, 2, Weekday::Mon)
        .expect("valid month");
    let grid = build_grid(
      spec,
      Vec::<NaiveDate>::new()
    );
    assert_ne!(grid.cells.len() % 7, 0);
    assert_eq!(grid.padded_cells().len(), 35);
    let weeks = grid.weeks();
    assert_eq!(weeks.len(), 5);
    assert_eq!(weeks[4].len(), 4);
  }

  #[test]
  fn markers_match_by_calendar_day() {
    let marker = Utc
      .with_ymd_and_hms(2024, 2, 14, 0, 0, 0)
      .single()
      .expect("valid instant");
    let spec =
      MonthSpec::new(2024, 2, Weekday::Mon)
        .expect("valid month");
    let grid = build_grid(spec, [marker]);

    let late = Utc
      .with_ymd_and_hms(2024, 2, 14, 23, 59, 0)
      .single()
      .expect("valid instant");
    let next = Utc
      .with_ymd_and_hms(2024, 2, 15, 0, 0, 0)
      .single()
      .expect("valid instant");
    assert!(grid.has_marker(&late));
    assert!(grid.has_marker(&date(2024, 2, 14)));
    assert!(!grid.has_marker(&next));
    assert!(!grid.has_marker(&date(2024, 2, 13)));
  }

  #[test]
  fn offsets_navigate_across_years() {
    let today = date(2024, 11, 20);
    let next = MonthSpec::from_offset(
      today,
      3,
      Weekday::Mon
    )
    .expect("valid offset");
    assert_eq!((next.year(), next.month()), (2025, 2));

    let past = MonthSpec::from_offset(
      today,
      -11,
      Weekday::Mon
    )
    .expect("valid offset");
    assert_eq!((past.year(), past.month()), (2023, 12));

    let far_past = MonthSpec::from_offset(
      today,
      -10_000,
      Weekday::Mon
    )
    .expect("valid offset");
    assert_eq!(
      (far_past.year(), far_past.month()),
      (1191, 7)
    );
    let far_future = MonthSpec::from_offset(
      today,
      10_000,
      Weekday::Mon
    )
    .expect("valid offset");
    assert_eq!(
      (far_future.year(), far_future.month()),
      (2858, 3)
    );
    assert!(
      MonthSpec::from_offset(
        today,
        i64::MAX / 2,
        Weekday::Mon
      )
      .is_err()
    );
    assert!(
      MonthSpec::from_offset(
        today,
        i64::MAX,
        Weekday::Mon
      )
      .is_err()
    );
  }

  #[test]
  fn rejects_out_of_range_month() {
    assert_eq!(
      MonthSpec::new(2024, 13, Weekday::Mon),
      Err(GridError::InvalidMonth(13))
    );
    assert_eq!(
      MonthSpec::new(2024, 0, Weekday::Mon),
      Err(GridError::InvalidMonth(0))
    );
  }

  #[test]
  fn week_start_parsing_and_labels() {
    assert_eq!(
      parse_week_start("0"),
      Ok(Weekday::Sun)
    );
    assert_eq!(
      parse_week_start("Monday"),
      Ok(Weekday::Mon)
    );
    assert!(parse_week_start("7").is_err());
    assert_eq!(
      weekday_labels(Weekday::Sun)[..2],
      ["Sun", "Mon"]
    );
    assert_eq!(
      weekday_labels(Weekday::Mon)[6],
      "Sun"
    );
  }

  #[test]
  fn same_day_ignores_time_of_day() {
    let morning = Utc
      .with_ymd_and_hms(2024, 3, 5, 0, 0, 1)
      .single()
      .expect("valid instant");
    assert!(same_day(
      &morning,
      &date(2024, 3, 5)
    ));
    assert!(!same_day(
      &morning,
      &date(2024, 3, 6)
    ));
  }
}
