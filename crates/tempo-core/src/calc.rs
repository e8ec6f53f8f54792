//! Running total of signed `H:M:S`
//! entries.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const MAX_HOURS: u32 = 9_999;
pub const MAX_MINUTES: u32 = 59;
pub const MAX_SECONDS: u32 = 59;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Field {
  Hours,
  Minutes,
  Seconds
}

impl Field {
  pub fn max(self) -> u32 {
    match self {
      | Field::Hours => MAX_HOURS,
      | Field::Minutes => MAX_MINUTES,
      | Field::Seconds => MAX_SECONDS
    }
  }
}

impl fmt::Display for Field {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(match self {
      | Field::Hours => "hours",
      | Field::Minutes => "minutes",
      | Field::Seconds => "seconds"
    })
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalcError {
  #[error(
    "{field}: value must be an integer \
     between 0 and {max}, got {raw:?}"
  )]
  InvalidField {
    field: Field,
    max:   u32,
    raw:   String
  },
  #[error(
    "expected [+|-]H:M:S, got {0:?}"
  )]
  InvalidEntry(String)
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub enum Sign {
  #[default]
  Add,
  Subtract
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq,
)]
pub struct DurationEntry {
  pub hours:   u32,
  pub minutes: u32,
  pub seconds: u32,
  pub sign:    Sign
}

impl DurationEntry {
  pub fn new(
    hours: u32,
    minutes: u32,
    seconds: u32,
    sign: Sign
  ) -> Self {
    Self {
      hours,
      minutes,
      seconds,
      sign
    }
  }

  /// Builds an entry from raw form text.
  /// Empty fields count as zero; anything
  /// else must be in range.
  pub fn parse(
    hours: &str,
    minutes: &str,
    seconds: &str,
    sign: Sign
  ) -> Result<Self, CalcError> {
    Ok(Self {
      hours: parse_field(
        hours,
        Field::Hours
      )?,
      minutes: parse_field(
        minutes,
        Field::Minutes
      )?,
      seconds: parse_field(
        seconds,
        Field::Seconds
      )?,
      sign
    })
  }

  pub fn magnitude_seconds(&self) -> i64 {
    i64::from(self.hours) * 3_600
      + i64::from(self.minutes) * 60
      + i64::from(self.seconds)
  }
}

impl FromStr for DurationEntry {
  type Err = CalcError;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    let (sign, body) =
      if let Some(rest) =
        trimmed.strip_prefix('-')
      {
        (Sign::Subtract, rest)
      } else if let Some(rest) =
        trimmed.strip_prefix('+')
      {
        (Sign::Add, rest)
      } else {
        (Sign::Add, trimmed)
      };

    let parts: Vec<&str> =
      body.split(':').collect();
    let [hours, minutes, seconds] =
      parts.as_slice()
    else {
      return Err(CalcError::InvalidEntry(
        s.to_string()
      ));
    };
    Self::parse(
      hours, minutes, seconds, sign
    )
  }
}

pub fn parse_field(
  raw: &str,
  field: Field
) -> Result<u32, CalcError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Ok(0);
  }

  let invalid = || {
    CalcError::InvalidField {
      field,
      max: field.max(),
      raw: raw.to_string()
    }
  };

  if !trimmed
    .chars()
    .all(|c| c.is_ascii_digit())
  {
    return Err(invalid());
  }

  let value = trimmed
    .parse::<u32>()
    .map_err(|_| invalid())?;
  if value > field.max() {
    return Err(invalid());
  }
  Ok(value)
}

/// Sums the entries in order. A
/// subtraction larger than the running
/// total clamps it at zero.
pub fn total_seconds(
  entries: &[DurationEntry]
) -> i64 {
  entries.iter().fold(0_i64, |acc, entry| {
    let amount = entry.magnitude_seconds();
    match entry.sign {
      | Sign::Add => acc + amount,
      | Sign::Subtract => {
        (acc - amount).max(0)
      }
    }
  })
}

pub fn format_hms(seconds: i64) -> String {
  let seconds = seconds.max(0);
  format!(
    "{:02}:{:02}:{:02}",
    seconds / 3_600,
    (seconds % 3_600) / 60,
    seconds % 60
  )
}

pub fn total(
  entries: &[DurationEntry]
) -> String {
  format_hms(total_seconds(entries))
}
