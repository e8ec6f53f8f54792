use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::config::Config;

const TIMEZONE_CONFIG_FILE: &str =
  "tempo-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "TEMPO_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "TEMPO_TIME_CONFIG";
const COMPACT_FORMAT: &str =
  "%Y%m%dT%H%M%SZ";

#[derive(Debug, Deserialize)]
struct TimezoneFile {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Picks the zone used for calendar days
/// and local date input: env var, then
/// `tempo-time.toml`, then the
/// `display.timezone` key, then UTC.
#[tracing::instrument(skip(cfg))]
pub fn resolve_display_timezone(
  cfg: &Config
) -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) =
      parse_timezone(&raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(path) =
    timezone_file_path()
    && let Some(tz) =
      load_timezone_file(&path)
  {
    return tz;
  }

  if let Some(raw) =
    cfg.get("display.timezone")
    && let Some(tz) = parse_timezone(
      &raw,
      "display.timezone"
    )
  {
    return tz;
  }

  tracing::debug!(
    "no display timezone configured; \
     using UTC"
  );
  chrono_tz::UTC
}

fn timezone_file_path() -> Option<PathBuf>
{
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir()
    .ok()
    .map(|dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    })
}

fn load_timezone_file(
  path: &Path
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone file"
      );
      return None;
    }
  };

  let parsed =
    match toml::from_str::<TimezoneFile>(
      &raw
    ) {
      | Ok(parsed) => parsed,
      | Err(err) => {
        tracing::error!(
          file = %path.display(),
          error = %err,
          "failed parsing timezone file"
        );
        return None;
      }
    };

  let Some(timezone) =
    parsed.timezone.or_else(|| {
      parsed
        .time
        .and_then(|section| {
          section.timezone
        })
    })
  else {
    tracing::warn!(
      file = %path.display(),
      "timezone file had no timezone field"
    );
    return None;
  };

  parse_timezone(
    &timezone,
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured display timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

fn local_to_utc(
  tz: &Tz,
  local: NaiveDateTime,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match tz.from_local_datetime(&local) {
    | LocalResult::Single(dt) => {
      Ok(dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      Ok(first.min(second).with_timezone(&Utc))
    }
    | LocalResult::None => Err(anyhow!(
      "local datetime {local} does not \
       exist in {tz}: {context}"
    ))
  }
}

fn local_midnight(
  tz: &Tz,
  date: NaiveDate,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct midnight \
         for {date}"
      )
    })?;
  local_to_utc(tz, midnight, context)
}

/// Parses user date input relative to
/// `now`, reading wall-clock forms in `tz`.
#[tracing::instrument(skip(now, tz), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower = token.to_ascii_lowercase();
  let today =
    now.with_timezone(tz).date_naive();

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" => {
      return local_midnight(
        tz, today, "today"
      );
    }
    | "tomorrow" => {
      return local_midnight(
        tz,
        shift_days(today, 1)?,
        "tomorrow"
      );
    }
    | "yesterday" => {
      return local_midnight(
        tz,
        shift_days(today, -1)?,
        "yesterday"
      );
    }
    | _ => {}
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return local_midnight(
      tz,
      next_weekday(today, weekday)?,
      "weekday-name"
    );
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[wdhm])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile failure: \
       {e}"
    )
  })?;

  if let Some(caps) = rel_re.captures(&lower)
  {
    let num: i64 = caps["num"]
      .parse()
      .context("invalid relative number")?;
    let duration = match &caps["unit"] {
      | "w" => Duration::try_weeks(num),
      | "d" => Duration::try_days(num),
      | "h" => Duration::try_hours(num),
      | _ => Duration::try_minutes(num)
    }
    .ok_or_else(|| {
      anyhow!(
        "relative offset out of range: \
         {token}"
      )
    })?;

    let shifted = if &caps["sign"] == "-" {
      now.checked_sub_signed(duration)
    } else {
      now.checked_add_signed(duration)
    };
    return shifted.ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {token}"
      )
    });
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      token,
      COMPACT_FORMAT
    )
  {
    return Ok(ndt.and_utc());
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return local_midnight(
      tz, date, "date"
    );
  }

  for fmt in
    ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
  {
    if let Ok(ndt) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return local_to_utc(tz, ndt, fmt);
    }
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .context(
    "supported formats: \
     now/today/tomorrow/yesterday, \
     weekday names (e.g. friday), \
     +Nw/+Nd/+Nh/+Nm (or -), RFC3339, \
     YYYY-MM-DD, YYYY-MM-DDTHH:MM, \
     YYYY-MM-DD HH:MM, YYYYMMDDTHHMMSSZ"
  )
}

fn shift_days(
  date: NaiveDate,
  days: i64
) -> anyhow::Result<NaiveDate> {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .ok_or_else(|| {
      anyhow!(
        "date out of range: {date} + \
         {days}d"
      )
    })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

/// Next strictly-later date falling on
/// `target`.
fn next_weekday(
  from: NaiveDate,
  target: Weekday
) -> anyhow::Result<NaiveDate> {
  let from_idx = i64::from(
    from.weekday().num_days_from_monday()
  );
  let target_idx = i64::from(
    target.num_days_from_monday()
  );
  let delta = match (7 + target_idx
    - from_idx)
    % 7
  {
    | 0 => 7,
    | delta => delta
  };
  shift_days(from, delta)
}

pub fn format_compact(
  dt: &DateTime<Utc>
) -> String {
  dt.format(COMPACT_FORMAT).to_string()
}

pub fn format_local(
  dt: &DateTime<Utc>,
  tz: &Tz
) -> String {
  dt.with_timezone(tz)
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

pub mod compact_date_serde {
  use chrono::{
    DateTime,
    NaiveDateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  use super::COMPACT_FORMAT;

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_compact(dt)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw =
      String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(
      &raw,
      COMPACT_FORMAT
    )
    .map(|ndt| ndt.and_utc())
    .map_err(serde::de::Error::custom)
  }

  pub mod vec {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::ser::SerializeSeq;
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dates: &[DateTime<Utc>],
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      let mut seq = serializer
        .serialize_seq(Some(dates.len()))?;
      for dt in dates {
        seq.serialize_element(
          &super::super::format_compact(
            dt
          )
        )?;
      }
      seq.end()
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<Vec<DateTime<Utc>>, D::Error>
    where
      D: Deserializer<'de>
    {
      Vec::<String>::deserialize(
        deserializer
      )?
      .iter()
      .map(|raw| {
        chrono::NaiveDateTime::parse_from_str(
          raw,
          super::COMPACT_FORMAT
        )
        .map(|ndt| ndt.and_utc())
        .map_err(serde::de::Error::custom)
      })
      .collect()
    }
  }
}
