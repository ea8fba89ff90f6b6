use std::sync::OnceLock;

use chrono::{
  Datelike,
  Duration,
  Local,
  NaiveDate,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

const FALLBACK_YEAR: i32 = 1970;

fn key_pattern() -> Option<&'static Regex>
{
  static PATTERN: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  PATTERN
    .get_or_init(|| {
      Regex::new(r"^\d{4}-\d{2}-\d{2}$")
        .map_err(|err| {
          tracing::error!(
            error = %err,
            "failed to compile date-key pattern"
          );
        })
        .ok()
    })
    .as_ref()
}

#[must_use]
pub fn to_key(date: NaiveDate) -> String {
  format!(
    "{:04}-{:02}-{:02}",
    date.year(),
    date.month(),
    date.day()
  )
}

/// Lenient inverse of [`to_key`]. A
/// month or day that is missing, not
/// numeric or out of range becomes 1,
/// so partially corrupt keys still land
/// somewhere in the parsed year.
#[must_use]
pub fn from_key(key: &str) -> NaiveDate {
  let mut parts = key.trim().split('-');
  let year = parts
    .next()
    .and_then(|raw| {
      raw.trim().parse::<i32>().ok()
    })
    .unwrap_or(FALLBACK_YEAR);
  let month = parts
    .next()
    .and_then(|raw| {
      raw.trim().parse::<u32>().ok()
    })
    .filter(|m| (1..=12).contains(m))
    .unwrap_or(1);
  let day = parts
    .next()
    .and_then(|raw| {
      raw.trim().parse::<u32>().ok()
    })
    .unwrap_or(1);

  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .or_else(|| {
    NaiveDate::from_ymd_opt(
      year, month, 1
    )
  })
  .unwrap_or_default()
}

/// True when `key` is `YYYY-MM-DD` and
/// names a real calendar day.
#[must_use]
pub fn is_canonical(key: &str) -> bool {
  let Some(pattern) = key_pattern()
  else {
    return false;
  };
  pattern.is_match(key)
    && NaiveDate::parse_from_str(
      key, "%Y-%m-%d"
    )
    .is_ok()
}

#[must_use]
pub fn add_days(
  key: &str,
  days: i64
) -> String {
  let date = from_key(key);
  let shifted = Duration::try_days(days)
    .and_then(|delta| {
      date.checked_add_signed(delta)
    })
    .unwrap_or(date);
  to_key(shifted)
}

/// Monday = 0 … Sunday = 6.
#[must_use]
pub fn weekday_index(key: &str) -> u8 {
  let sunday_based = from_key(key)
    .weekday()
    .num_days_from_sunday();
  ((sunday_based + 6) % 7) as u8
}

/// Chronological `a <= b` for canonical
/// keys; zero padding makes the string
/// order agree with the calendar.
#[must_use]
pub fn iso_lte(a: &str, b: &str) -> bool {
  a <= b
}

#[must_use]
pub fn today_key(tz: Option<&Tz>) -> String {
  let today = match tz {
    | Some(zone) => {
      Utc::now()
        .with_timezone(zone)
        .date_naive()
    }
    | None => Local::now().date_naive()
  };
  to_key(today)
}

pub fn parse_timezone(
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
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured timezone"
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

#[must_use]
pub fn month_key(
  year: i32,
  month: u32
) -> String {
  format!("{year:04}-{month:02}")
}

pub fn parse_month_key(
  raw: &str
) -> Option<(i32, u32)> {
  let (year, month) =
    raw.trim().split_once('-')?;
  let year = year.parse::<i32>().ok()?;
  let month = month.parse::<u32>().ok()?;
  if (1..=12).contains(&month) {
    Some((year, month))
  } else {
    None
  }
}

#[must_use]
pub fn shift_month(
  year: i32,
  month: u32,
  delta: i32
) -> (i32, u32) {
  let index = i64::from(year) * 12
    + i64::from(month)
    - 1
    + i64::from(delta);
  let shifted_year =
    index.div_euclid(12);
  let shifted_month =
    index.rem_euclid(12) + 1;
  (
    i32::try_from(shifted_year)
      .unwrap_or(year),
    shifted_month as u32
  )
}
