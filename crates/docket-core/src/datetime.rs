use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

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
  NaiveTime,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "docket-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "DOCKET_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "DOCKET_TIME_CONFIG";

/// Hour used for every due date entered as a calendar day.
const DUE_HOUR: u32 = 12;

/// How stale the reference "now" may get before the date buckets are
/// re-evaluated.
const CLOCK_TICK_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn local_timezone() -> &'static Tz {
  static LOCAL_TZ: OnceLock<Tz> =
    OnceLock::new();
  LOCAL_TZ
    .get_or_init(resolve_local_timezone)
}

/// Current wall-clock time in the configured timezone.
pub fn local_now() -> DateTime<Tz> {
  Utc::now()
    .with_timezone(local_timezone())
}

/// Calendar day `dt` falls on in `tz`.
#[must_use]
pub fn local_date(
  dt: DateTime<Utc>,
  tz: &Tz
) -> NaiveDate {
  dt.with_timezone(tz).date_naive()
}

/// Combines a calendar day with the fixed mid-day due time.
///
/// Keeping due dates at noon means a shift of a few hours in either
/// direction never moves them onto a neighbouring day.
#[must_use]
pub fn noon_on(
  date: NaiveDate,
  tz: &Tz
) -> DateTime<Utc> {
  let noon = NaiveTime::from_hms_opt(
    DUE_HOUR, 0, 0
  )
  .unwrap_or_default();
  resolve_local(
    date.and_time(noon),
    tz,
    "due-noon"
  )
}

fn resolve_local(
  local_naive: NaiveDateTime,
  tz: &Tz,
  context: &str
) -> DateTime<Utc> {
  match tz
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(local_dt) => {
      local_dt.with_timezone(&Utc)
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
      let chosen = if first <= second {
        first
      } else {
        second
      };
      chosen.with_timezone(&Utc)
    }
    | LocalResult::None => {
      tracing::warn!(
        context,
        local = %local_naive,
        "local datetime skipped by timezone transition; shifting one hour"
      );
      let shifted =
        local_naive + Duration::hours(1);
      tz.from_local_datetime(&shifted)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| {
          local_naive.and_utc()
        })
    }
  }
}

fn resolve_local_timezone() -> Tz {
  let explicit =
    std::env::var(TIMEZONE_ENV_VAR).ok();
  choose_timezone(
    explicit.as_deref(),
    || {
      timezone_config_path().and_then(
        |path| {
          load_timezone_from_file(&path)
        }
      )
    },
    system_timezone
  )
}

/// Picks the first usable zone: the explicit setting, then the
/// timezone config file, then the system zone, then UTC.
fn choose_timezone(
  explicit: Option<&str>,
  from_file: impl FnOnce() -> Option<Tz>,
  system: impl FnOnce() -> Option<String>
) -> Tz {
  if let Some(raw) = explicit
    && let Some(tz) =
      parse_timezone(raw, TIMEZONE_ENV_VAR)
  {
    return tz;
  }

  if let Some(tz) = from_file() {
    return tz;
  }

  if let Some(raw) = system()
    && let Some(tz) =
      parse_timezone(&raw, "system")
  {
    return tz;
  }

  tracing::debug!(
    "no usable timezone found; using UTC"
  );
  chrono_tz::UTC
}

fn system_timezone() -> Option<String> {
  match iana_time_zone::get_timezone() {
    | Ok(name) => Some(name),
    | Err(err) => {
      tracing::debug!(
        error = %err,
        "system timezone unavailable"
      );
      None
    }
  }
}

fn timezone_config_path()
-> Option<PathBuf> {
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

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
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
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
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
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured local timezone"
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

/// Parses the due-date field of the task form into a calendar day.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_due_date(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return today
        .succ_opt()
        .ok_or_else(|| {
          anyhow!("date out of range")
        });
    }
    | "yesterday" => {
      return today
        .pred_opt()
        .ok_or_else(|| {
          anyhow!("date out of range")
        });
    }
    | _ => {}
  }

  let offset_re = Regex::new(
    r"^(?P<sign>[+-])(?P<days>\d{1,4})d$"
  )
  .context("invalid offset regex")?;
  if let Some(captures) =
    offset_re.captures(&lower)
  {
    let days: i64 = captures["days"]
      .parse()
      .context("invalid day offset")?;
    let delta = if &captures["sign"]
      == "-"
    {
      -days
    } else {
      days
    };
    return today
      .checked_add_signed(
        Duration::days(delta)
      )
      .ok_or_else(|| {
        anyhow!(
          "day offset out of range: \
           {input}"
        )
      });
  }

  if let Some(weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, weekday
    ));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  Err(anyhow!(
    "unrecognized due date: {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, \
     weekday names (e.g. monday), \
     +Nd/-Nd, YYYY-MM-DD"
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
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

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

/// Display bucket of a due date relative to the current day.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum DueBucket {
  Overdue,
  Today,
  Tomorrow,
  Later
}

impl DueBucket {
  pub fn classify(
    due: DateTime<Utc>,
    now: &DateTime<Tz>
  ) -> Self {
    let today = now.date_naive();
    let due_day =
      local_date(due, &now.timezone());
    if due_day < today {
      Self::Overdue
    } else if due_day == today {
      Self::Today
    } else if Some(due_day)
      == today.succ_opt()
    {
      Self::Tomorrow
    } else {
      Self::Later
    }
  }
}

/// Coarse "current time" reference for the date-bucket filters.
///
/// Buckets are day-granular, so the reference only moves once a full
/// tick has elapsed.
#[derive(Debug, Clone)]
pub struct ReferenceClock {
  current:  DateTime<Tz>,
  interval: Duration
}

impl ReferenceClock {
  pub fn new(now: DateTime<Tz>) -> Self {
    Self {
      current:  now,
      interval: Duration::seconds(
        CLOCK_TICK_SECS
      )
    }
  }

  pub fn now(&self) -> DateTime<Tz> {
    self.current
  }

  /// Advances the reference when `wall` is at least one tick past it.
  /// Returns whether the reference moved.
  pub fn tick(
    &mut self,
    wall: DateTime<Utc>
  ) -> bool {
    if wall.signed_duration_since(
      self.current
    ) < self.interval
    {
      return false;
    }
    let moved_day = local_date(
      wall,
      &self.current.timezone()
    ) != self.current.date_naive();
    self.current = wall
      .with_timezone(
        &self.current.timezone()
      );
    tracing::trace!(
      now = %self.current,
      moved_day,
      "reference clock advanced"
    );
    true
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };
  use chrono_tz::Tz;

  use super::*;

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn noon_is_resolved_in_the_given_zone()
  {
    let tz: Tz = "America/Mexico_City"
      .parse()
      .expect("tz");
    let due =
      noon_on(day(2026, 2, 17), &tz);
    assert_eq!(
      due,
      Utc
        .with_ymd_and_hms(
          2026, 2, 17, 18, 0, 0
        )
        .unwrap()
    );
    assert_eq!(
      local_date(due, &tz),
      day(2026, 2, 17)
    );
  }

  #[test]
  fn timezone_falls_back_from_setting_to_file_to_system()
   {
    let tokyo: Tz =
      "Asia/Tokyo".parse().expect("tz");
    let lima: Tz =
      "America/Lima".parse().expect("tz");
    let system = || {
      Some("Asia/Tokyo".to_string())
    };

    assert_eq!(
      choose_timezone(
        Some("Europe/Berlin"),
        || Some(lima),
        system
      ),
      chrono_tz::Europe::Berlin
    );
    assert_eq!(
      choose_timezone(
        Some("Not/AZone"),
        || Some(lima),
        system
      ),
      lima
    );
    assert_eq!(
      choose_timezone(None, || None, system),
      tokyo
    );
    assert_eq!(
      choose_timezone(
        None,
        || None,
        || Some("garbage".to_string())
      ),
      chrono_tz::UTC
    );
    assert_eq!(
      choose_timezone(None, || None, || None),
      chrono_tz::UTC
    );
  }

  #[test]
  fn late_evening_utc_is_already_tomorrow_in_tokyo()
   {
    let tokyo: Tz =
      "Asia/Tokyo".parse().expect("tz");
    let wall = Utc
      .with_ymd_and_hms(
        2026, 10, 19, 23, 30, 0
      )
      .unwrap();
    assert_eq!(
      local_date(wall, &tokyo),
      day(2026, 10, 20)
    );
    let due = noon_on(
      local_date(wall, &tokyo),
      &tokyo
    );
    assert_eq!(
      DueBucket::classify(
        due,
        &wall.with_timezone(&tokyo)
      ),
      DueBucket::Today
    );
  }

  #[test]
  fn parses_relative_words_and_offsets()
  {
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_date("today", today)
        .unwrap(),
      today
    );
    assert_eq!(
      parse_due_date("Tomorrow", today)
        .unwrap(),
      day(2026, 2, 18)
    );
    assert_eq!(
      parse_due_date("+14d", today)
        .unwrap(),
      day(2026, 3, 3)
    );
    assert_eq!(
      parse_due_date("-1d", today)
        .unwrap(),
      day(2026, 2, 16)
    );
  }

  #[test]
  fn parses_weekday_and_iso_dates() {
    // 2026-02-17 is a Tuesday.
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_due_date("friday", today)
        .unwrap(),
      day(2026, 2, 20)
    );
    assert_eq!(
      parse_due_date("tue", today)
        .unwrap(),
      day(2026, 2, 24)
    );
    assert_eq!(
      parse_due_date(
        "2026-12-31",
        today
      )
      .unwrap(),
      day(2026, 12, 31)
    );
    assert!(
      parse_due_date("someday", today)
        .is_err()
    );
  }

  #[test]
  fn due_buckets_follow_calendar_days()
  {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 23, 30, 0
      )
      .unwrap()
      .with_timezone(&chrono_tz::UTC);
    let tz = chrono_tz::UTC;

    assert_eq!(
      DueBucket::classify(
        noon_on(day(2026, 2, 16), &tz),
        &now
      ),
      DueBucket::Overdue
    );
    assert_eq!(
      DueBucket::classify(
        noon_on(day(2026, 2, 17), &tz),
        &now
      ),
      DueBucket::Today
    );
    assert_eq!(
      DueBucket::classify(
        noon_on(day(2026, 2, 18), &tz),
        &now
      ),
      DueBucket::Tomorrow
    );
    assert_eq!(
      DueBucket::classify(
        noon_on(day(2026, 2, 25), &tz),
        &now
      ),
      DueBucket::Later
    );
  }

  #[test]
  fn reference_clock_only_moves_after_a_full_tick()
   {
    let start = Utc
      .with_ymd_and_hms(
        2026, 2, 17, 23, 59, 30
      )
      .unwrap();
    let mut clock = ReferenceClock::new(
      start.with_timezone(
        &chrono_tz::UTC
      )
    );

    assert!(
      !clock.tick(
        start + Duration::seconds(59)
      )
    );
    assert_eq!(
      clock.now().date_naive(),
      day(2026, 2, 17)
    );

    assert!(
      clock.tick(
        start + Duration::seconds(60)
      )
    );
    assert_eq!(
      clock.now().date_naive(),
      day(2026, 2, 18)
    );
  }
}
