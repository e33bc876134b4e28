//! Daily unattended rate sync

use super::config::ScheduleConfig;
use super::sync::{RateSyncEngine, SyncReport};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use tracing::{error, info};

/// A fixed wall-clock time in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    at: NaiveTime,
    offset: FixedOffset,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32, utc_offset_hours: i32) -> Result<Self> {
        let at = NaiveTime::from_hms_opt(hour, minute, 0)
            .with_context(|| format!("Invalid schedule time {hour:02}:{minute:02}"))?;
        if !(-23..=23).contains(&utc_offset_hours) {
            bail!("Invalid UTC offset: {utc_offset_hours}h");
        }
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .with_context(|| format!("Invalid UTC offset: {utc_offset_hours}h"))?;
        Ok(Self { at, offset })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        Self::new(config.hour, config.minute, config.utc_offset_hours)
    }

    /// First scheduled instant strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_date = now.with_timezone(&self.offset).date_naive();
        let offset = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        let today = Utc.from_utc_datetime(&(local_date.and_time(self.at) - offset));
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

/// Runs `sync_all` at every scheduled instant. Never returns; failures wait
/// for the next run.
pub async fn run_daily(engine: &RateSyncEngine, schedule: &DailySchedule) {
    loop {
        let now = Utc::now();
        let next = schedule.next_run_after(now);
        info!(next_run = %next, "Foreign exchange sync scheduled");

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        info!("Starting scheduled foreign exchange rates sync");
        match engine.sync_all().await {
            SyncReport::Synced(updates) => {
                info!("Updated {} currency rates", updates.len());
                for update in &updates {
                    info!(currency = %update.currency, action = ?update.action, "Rate synced");
                }
            }
            SyncReport::Failed(e) => {
                error!(error = %e, "Scheduled foreign exchange sync failed");
            }
        }
    }
}
