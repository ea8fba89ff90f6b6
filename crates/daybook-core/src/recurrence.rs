use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::debug;
use uuid::Uuid;

use crate::datekey::{add_days, is_canonical, iso_lte, weekday_index};

/// Upper bound on dates produced by `daily` and `everyN`.
pub const MAX_GENERATED: usize = 730;
/// Upper bound on days examined by `weekly`.
pub const MAX_WEEKLY_SCAN: usize = 1460;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recurrence {
    None,
    Daily,
    EveryN { step: u32 },
    /// Monday-first weekday indices, 0..=6.
    Weekly { days: BTreeSet<u8> },
}

impl Recurrence {
    pub fn mode_name(&self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::EveryN { .. } => "everyN",
            Recurrence::Weekly { .. } => "weekly",
        }
    }
}

/// Transient add-time input. `until` is only consulted when `recurrence`
/// is not `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRequest {
    pub recurrence: Recurrence,
    pub until: String,
}

impl RecurrenceRequest {
    pub fn single(date: &str) -> Self {
        Self {
            recurrence: Recurrence::None,
            until: date.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    None,
    Daily,
    Every,
    Weekly,
}

impl FromStr for RepeatMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "once" => Ok(RepeatMode::None),
            "daily" => Ok(RepeatMode::Daily),
            "every" | "everyn" | "every-n" => Ok(RepeatMode::Every),
            "weekly" => Ok(RepeatMode::Weekly),
            other => Err(anyhow!("unknown repeat mode: {other}")),
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RepeatMode::None => "none",
            RepeatMode::Daily => "daily",
            RepeatMode::Every => "every",
            RepeatMode::Weekly => "weekly",
        };
        f.write_str(name)
    }
}

/// Coerces free-form step input: anything non-numeric or below 1 is 1.
pub fn parse_step(raw: &str) -> u32 {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|step| *step >= 1)
        .map(|step| u32::try_from(step).unwrap_or(u32::MAX))
        .unwrap_or(1)
}

/// Parses `mon,wed,fri` style lists (names, three-letter prefixes or
/// Monday-first indices).
pub fn parse_weekdays(raw: &str) -> anyhow::Result<BTreeSet<u8>> {
    let mut days = BTreeSet::new();
    for token in raw.split(',') {
        let token = token.trim().to_ascii_lowercase();
        if token.is_empty() {
            continue;
        }
        let idx = match token.as_str() {
            "mon" | "monday" | "0" => 0,
            "tue" | "tues" | "tuesday" | "1" => 1,
            "wed" | "wednesday" | "2" => 2,
            "thu" | "thur" | "thurs" | "thursday" | "3" => 3,
            "fri" | "friday" | "4" => 4,
            "sat" | "saturday" | "5" => 5,
            "sun" | "sunday" | "6" => 6,
            other => return Err(anyhow!("unknown weekday: {other}")),
        };
        days.insert(idx);
    }
    Ok(days)
}

pub fn build(
    mode: RepeatMode,
    step: Option<&str>,
    days: Option<&str>,
) -> anyhow::Result<Recurrence> {
    Ok(match mode {
        RepeatMode::None => Recurrence::None,
        RepeatMode::Daily => Recurrence::Daily,
        RepeatMode::Every => Recurrence::EveryN {
            step: step.map(parse_step).unwrap_or(1),
        },
        RepeatMode::Weekly => Recurrence::Weekly {
            days: days.map(parse_weekdays).transpose()?.unwrap_or_default(),
        },
    })
}

/// Date-keys on which one occurrence should be inserted, in order.
///
/// Every result lies in `[start, until]` except the single-date fallback,
/// which is returned for `None`, for an `until` that is unusable (not
/// canonical or before `start`) and for a weekly day-set that matches
/// nothing in range.
pub fn generate(start: &str, recurrence: &Recurrence, until: &str) -> Vec<String> {
    let fallback = || vec![start.to_string()];

    if matches!(recurrence, Recurrence::None) {
        return fallback();
    }
    if !is_canonical(until) || !iso_lte(start, until) {
        debug!(start, until, "unusable recurrence end; single occurrence");
        return fallback();
    }

    match recurrence {
        Recurrence::None => fallback(),
        Recurrence::Daily => stepped(start, 1, until),
        Recurrence::EveryN { step } => stepped(start, i64::from((*step).max(1)), until),
        Recurrence::Weekly { days } => {
            let dates = weekly(start, days, until);
            if dates.is_empty() { fallback() } else { dates }
        }
    }
}

fn stepped(start: &str, step: i64, until: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = start.to_string();
    while iso_lte(&cursor, until) {
        if out.len() >= MAX_GENERATED {
            debug!(start, until, cap = MAX_GENERATED, "recurrence truncated");
            break;
        }
        let next = add_days(&cursor, step);
        out.push(cursor);
        if !is_canonical(&next) {
            debug!(start, until, "reached the last representable date");
            break;
        }
        cursor = next;
    }
    out
}

fn weekly(start: &str, days: &BTreeSet<u8>, until: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cursor = start.to_string();
    for _ in 0..MAX_WEEKLY_SCAN {
        if !iso_lte(&cursor, until) {
            return out;
        }
        if days.contains(&weekday_index(&cursor)) {
            out.push(cursor.clone());
        }
        let next = add_days(&cursor, 1);
        if !is_canonical(&next) {
            debug!(start, until, "reached the last representable date");
            return out;
        }
        cursor = next;
    }
    debug!(start, until, cap = MAX_WEEKLY_SCAN, "weekly scan truncated");
    out
}

pub fn mint_series_id() -> String {
    Uuid::new_v4().to_string()
}

/// Ids for one generated batch: `base`, `base + 1`, ...
pub fn batch_ids(base: u64, count: usize) -> Vec<u64> {
    (0..count as u64).map(|offset| base.saturating_add(offset)).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{
        MAX_GENERATED, MAX_WEEKLY_SCAN, Recurrence, RepeatMode, batch_ids, build, generate,
        parse_step, parse_weekdays,
    };
    use crate::datekey::{add_days, weekday_index};

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn none_ignores_until() {
        assert_eq!(
            generate("2024-01-01", &Recurrence::None, "2030-01-01"),
            keys(&["2024-01-01"])
        );
        assert_eq!(
            generate("2024-01-01", &Recurrence::None, "not-a-date"),
            keys(&["2024-01-01"])
        );
    }

    #[test]
    fn daily_is_inclusive() {
        assert_eq!(
            generate("2024-01-01", &Recurrence::Daily, "2024-01-03"),
            keys(&["2024-01-01", "2024-01-02", "2024-01-03"])
        );
        assert_eq!(
            generate("2024-02-28", &Recurrence::Daily, "2024-03-01"),
            keys(&["2024-02-28", "2024-02-29", "2024-03-01"])
        );
    }

    #[test]
    fn every_n_steps_through_range() {
        assert_eq!(
            generate("2024-01-01", &Recurrence::EveryN { step: 2 }, "2024-01-07"),
            keys(&["2024-01-01", "2024-01-03", "2024-01-05", "2024-01-07"])
        );
        assert_eq!(
            generate(
                "2024-01-01",
                &build(RepeatMode::Every, Some("-4"), None).expect("build"),
                "2024-01-03"
            ),
            keys(&["2024-01-01", "2024-01-02", "2024-01-03"])
        );
    }

    #[test]
    fn step_coercion_defaults_to_one() {
        assert_eq!(parse_step("3"), 3);
        assert_eq!(parse_step("0"), 1);
        assert_eq!(parse_step("-2"), 1);
        assert_eq!(parse_step("abc"), 1);
        assert_eq!(parse_step(""), 1);
    }

    #[test]
    fn weekly_picks_selected_weekdays() {
        let mondays = Recurrence::Weekly {
            days: BTreeSet::from([0]),
        };
        assert_eq!(
            generate("2024-01-01", &mondays, "2024-01-14"),
            keys(&["2024-01-01", "2024-01-08"])
        );

        let weekend = Recurrence::Weekly {
            days: BTreeSet::from([5, 6]),
        };
        let out = generate("2024-01-01", &weekend, "2024-01-31");
        assert_eq!(out.len(), 8);
        assert!(out.iter().all(|key| weekday_index(key) >= 5));
    }

    #[test]
    fn weekly_falls_back_to_start_when_nothing_matches() {
        let none_selected = Recurrence::Weekly {
            days: BTreeSet::new(),
        };
        assert_eq!(
            generate("2024-01-01", &none_selected, "2024-01-14"),
            keys(&["2024-01-01"])
        );

        let sunday_only = Recurrence::Weekly {
            days: BTreeSet::from([6]),
        };
        assert_eq!(
            generate("2024-01-01", &sunday_only, "2024-01-03"),
            keys(&["2024-01-01"])
        );
    }

    #[test]
    fn until_before_start_yields_single_date() {
        assert_eq!(
            generate("2024-01-10", &Recurrence::Daily, "2024-01-01"),
            keys(&["2024-01-10"])
        );
    }

    #[test]
    fn runaway_ranges_are_capped() {
        let daily = generate("2024-01-01", &Recurrence::Daily, "9999-12-31");
        assert_eq!(daily.len(), MAX_GENERATED);
        assert_eq!(daily.last().map(String::as_str), Some("2025-12-30"));

        let every_day = Recurrence::Weekly {
            days: (0..7).collect(),
        };
        let weekly = generate("2024-01-01", &every_day, "9999-12-31");
        assert_eq!(weekly.len(), MAX_WEEKLY_SCAN);
        assert_eq!(
            weekly.last().cloned(),
            Some(add_days("2024-01-01", MAX_WEEKLY_SCAN as i64 - 1))
        );
    }

    #[test]
    fn results_stay_in_range_and_canonical() {
        let out = generate("2024-01-01", &Recurrence::EveryN { step: 5 }, "2024-03-01");
        assert!(out.iter().all(|key| crate::datekey::is_canonical(key)));
        assert!(out.iter().all(|key| key.as_str() >= "2024-01-01" && key.as_str() <= "2024-03-01"));
        assert!(out.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn stops_at_the_last_four_digit_year() {
        assert_eq!(
            generate("9999-12-30", &Recurrence::Daily, "9999-12-31"),
            keys(&["9999-12-30", "9999-12-31"])
        );
        assert_eq!(
            generate("9999-12-27", &Recurrence::EveryN { step: 3 }, "9999-12-31"),
            keys(&["9999-12-27", "9999-12-30"])
        );

        let all_days = BTreeSet::from([0, 1, 2, 3, 4, 5, 6]);
        let weekly = generate(
            "9999-12-30",
            &Recurrence::Weekly { days: all_days },
            "9999-12-31",
        );
        assert_eq!(weekly, keys(&["9999-12-30", "9999-12-31"]));
    }

    #[test]
    fn build_parses_cli_pieces() {
        assert_eq!(
            build(RepeatMode::Every, Some("x"), None).expect("build"),
            Recurrence::EveryN { step: 1 }
        );
        assert_eq!(
            build(RepeatMode::Weekly, None, Some("mon, Fri,6")).expect("build"),
            Recurrence::Weekly {
                days: BTreeSet::from([0, 4, 6])
            }
        );
        assert!(parse_weekdays("funday").is_err());
        assert_eq!("weekly".parse::<RepeatMode>().expect("mode"), RepeatMode::Weekly);
    }

    #[test]
    fn batch_ids_are_distinct() {
        assert_eq!(batch_ids(1_000, 3), vec![1_000, 1_001, 1_002]);
        assert!(batch_ids(5, 0).is_empty());
    }
}
