use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveTime, Weekday};
use serde::Deserialize;
use warden_domain::Clock as _;

use crate::capability::{CheckContext, CheckResult, Checker};
use crate::error::PluginError;
use crate::schedule::{parse_instant, parse_weekday};

/// Passes once the profile has been in its current state for `duration`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Wait {
    #[serde(with = "warden_config::duration")]
    pub duration: Duration,
}

#[async_trait]
impl Checker for Wait {
    async fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, PluginError> {
        let elapsed = (ctx.clock.now() - ctx.profile_data.transition).to_std();
        let passed = elapsed.map_or(false, |e| e >= self.duration);
        Ok(CheckResult { passed, info: Default::default() }
            .with_info("since_transition", format!("{:?}", elapsed.unwrap_or_default())))
    }
}

/// Passes inside the `[start, end)` UTC window on the listed weekdays.
#[derive(Debug)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub weekdays: Vec<Weekday>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTimeWindow {
    start: String,
    end: String,
    weekdays: Vec<String>,
}

impl TimeWindow {
    pub fn from_config(value: &serde_yaml::Value) -> Result<Self, PluginError> {
        let raw: RawTimeWindow = super::decode_config(value)?;
        let window = Self {
            start: parse_instant(&raw.start)?,
            end: parse_instant(&raw.end)?,
            weekdays: raw
                .weekdays
                .iter()
                .map(|day| parse_weekday(day))
                .collect::<Result<Vec<_>, _>>()?,
        };
        if window.start >= window.end {
            return Err(PluginError::InvalidConfig(format!(
                "time window start {} is not before end {}",
                window.start, window.end
            )));
        }
        Ok(window)
    }
}

#[async_trait]
impl Checker for TimeWindow {
    async fn check(&self, ctx: &CheckContext<'_>) -> Result<CheckResult, PluginError> {
        let now = ctx.clock.now();
        let in_window = self.weekdays.contains(&now.weekday())
            && now.time() >= self.start
            && now.time() < self.end;
        let result = if in_window { CheckResult::passed() } else { CheckResult::failed() };
        Ok(result.with_info("now", now.to_rfc3339()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    use crate::builtin::tests::TestEnv;

    #[tokio::test]
    async fn wait_passes_after_duration() {
        let env = TestEnv::new();
        let wait = Wait { duration: Duration::from_secs(600) };
        assert!(!wait.check(&env.check_ctx()).await.unwrap().passed);

        env.manual.advance(ChronoDuration::minutes(11));
        assert!(wait.check(&env.check_ctx()).await.unwrap().passed);
    }

    #[tokio::test]
    async fn time_window_respects_weekday_and_hours() {
        let env = TestEnv::new();
        let window = TimeWindow {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            weekdays: vec![Weekday::Mon],
        };

        // Monday 2026-03-02 inside the window.
        env.manual
            .set(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap());
        assert!(window.check(&env.check_ctx()).await.unwrap().passed);

        // Monday but outside hours.
        env.manual
            .set(Utc.with_ymd_and_hms(2026, 3, 2, 18, 0, 0).unwrap());
        assert!(!window.check(&env.check_ctx()).await.unwrap().passed);

        // Tuesday inside hours.
        env.manual
            .set(Utc.with_ymd_and_hms(2026, 3, 3, 10, 0, 0).unwrap());
        assert!(!window.check(&env.check_ctx()).await.unwrap().passed);
    }

    #[test]
    fn from_config_rejects_inverted_window() {
        let value: serde_yaml::Value = serde_yaml::from_str(
            "{ start: \"17:00\", end: \"08:00\", weekdays: [monday] }",
        )
        .unwrap();
        assert!(TimeWindow::from_config(&value).is_err());
    }
}
