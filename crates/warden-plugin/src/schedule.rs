//! Firing predicates for notification instances.

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::Deserialize;
use warden_config::RawSchedule;
use warden_domain::NodeState;

use crate::builtin::decode_config;
use crate::error::PluginError;

/// Inputs a schedule decides on. `previous`/`current` are the profile's
/// persisted states, `transition` the timestamp of the last state change.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleInput {
    pub now: DateTime<Utc>,
    pub last_fire: Option<DateTime<Utc>>,
    pub current: NodeState,
    pub previous: NodeState,
    pub transition: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    /// Fire every `interval`, suppressed while the profile sits unchanged in
    /// `operational`.
    Periodic { interval: Duration },
    /// Fire on the first evaluation past `instant` on a listed weekday, at
    /// most once per calendar day.
    Scheduled {
        weekdays: Vec<Weekday>,
        instant: NaiveTime,
    },
    /// Fire exactly once per state change, `delay` after the change.
    Oneshot { delay: Duration },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PeriodicConfig {
    #[serde(with = "warden_config::duration")]
    interval: Duration,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScheduledConfig {
    weekdays: Vec<String>,
    instant: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OneshotConfig {
    #[serde(with = "warden_config::duration")]
    delay: Duration,
}

impl Schedule {
    pub fn compile(raw: &RawSchedule) -> Result<Self, PluginError> {
        match raw.schedule_type.as_str() {
            "periodic" => {
                let config: PeriodicConfig = decode_config(&raw.config)?;
                Ok(Schedule::Periodic { interval: config.interval })
            }
            "scheduled" => {
                let config: ScheduledConfig = decode_config(&raw.config)?;
                let weekdays = config
                    .weekdays
                    .iter()
                    .map(|day| parse_weekday(day))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Schedule::Scheduled {
                    weekdays,
                    instant: parse_instant(&config.instant)?,
                })
            }
            "oneshot" => {
                let config: OneshotConfig = decode_config(&raw.config)?;
                Ok(Schedule::Oneshot { delay: config.delay })
            }
            other => Err(PluginError::UnknownType {
                kind: "schedule",
                plugin_type: other.to_string(),
            }),
        }
    }

    pub fn should_fire(&self, input: &ScheduleInput) -> bool {
        match self {
            Schedule::Periodic { interval } => {
                let unchanged_operational = input.current == input.previous
                    && input.current == NodeState::Operational;
                if unchanged_operational {
                    return false;
                }
                match input.last_fire {
                    None => true,
                    Some(last) => (input.now - last)
                        .to_std()
                        .map_or(false, |elapsed| elapsed >= *interval),
                }
            }
            Schedule::Scheduled { weekdays, instant } => {
                if !weekdays.contains(&input.now.weekday()) {
                    return false;
                }
                if input.now.time() < *instant {
                    return false;
                }
                match input.last_fire {
                    None => true,
                    Some(last) => last.date_naive() != input.now.date_naive(),
                }
            }
            Schedule::Oneshot { delay } => {
                let due = input.transition
                    + chrono::Duration::from_std(*delay).unwrap_or(chrono::Duration::zero());
                if input.now < due {
                    return false;
                }
                // At most one fire per state change: the last fire must
                // predate this change's due point.
                input.last_fire.map_or(true, |last| last < due)
            }
        }
    }
}

pub fn parse_weekday(day: &str) -> Result<Weekday, PluginError> {
    day.parse::<Weekday>()
        .map_err(|_| PluginError::InvalidConfig(format!("unknown weekday '{}'", day)))
}

pub fn parse_instant(instant: &str) -> Result<NaiveTime, PluginError> {
    NaiveTime::parse_from_str(instant, "%H:%M")
        .map_err(|_| PluginError::InvalidConfig(format!("invalid instant '{}', expected HH:MM", instant)))
}
