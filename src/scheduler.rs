//! The control loop: three independently firing timers.
//!
//! - **Daily fetch**: sleeps until the configured local wall-clock time in
//!   the configured zone, then asks the engine to fetch and re-apply. A
//!   failed fetch is logged and retried on the next day's tick; the previous
//!   markers stay in force.
//! - **Frequent re-evaluation**: every N minutes, re-resolve from the stored
//!   markers. This is what detects a period boundary crossing between
//!   fetches.
//! - **Status report**: every M minutes, log the active period. Only
//!   spawned when verbose logging is configured.
//!
//! Each timer is its own tokio task calling the engine's shared
//! resolve-and-apply entry point, so a slow or failed fetch can never stall
//! the re-evaluation tick. Tick ordering and overlap are serialized inside
//! the engine, not here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Days, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};

use crate::config::Config;
use crate::engine::Engine;

pub struct Scheduler {
    engine: Arc<Engine>,
    tz: Tz,
    fetch_time: NaiveTime,
    refresh_period: Duration,
    status_period: Option<Duration>,
}

impl Scheduler {
    pub fn new(engine: Arc<Engine>, config: &Config) -> Result<Self> {
        Ok(Self {
            engine,
            tz: config.timezone()?,
            fetch_time: config.fetch_time()?,
            refresh_period: config.refresh_period(),
            status_period: config.verbose_logging().then(|| config.log_period()),
        })
    }

    /// Spawn all timers. The returned handles run until the process exits;
    /// the caller keeps them alive and aborts them on shutdown.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let engine = Arc::clone(&self.engine);
        let tz = self.tz;
        let fetch_time = self.fetch_time;
        handles.push(tokio::spawn(async move {
            loop {
                let wait = until_next_fetch(Utc::now(), fetch_time, tz);
                log_debug!("Next daily fetch in {}s", wait.as_secs());
                sleep(wait).await;
                if let Err(e) = engine.refresh_markers().await {
                    log_pipe!();
                    log_warning!("Daily fetch failed: {e:#}");
                    log_indented!("Keeping the previous marker set; will retry tomorrow");
                }
            }
        }));

        let engine = Arc::clone(&self.engine);
        let refresh_period = self.refresh_period;
        handles.push(tokio::spawn(async move {
            let mut ticks = interval(refresh_period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval fires immediately; the coordinator already did the
            // startup evaluation, but re-applying is idempotent.
            loop {
                ticks.tick().await;
                if let Err(e) = engine.reevaluate().await {
                    log_pipe!();
                    log_warning!("Period re-evaluation failed: {e:#}");
                }
            }
        }));

        if let Some(status_period) = self.status_period {
            let engine = Arc::clone(&self.engine);
            handles.push(tokio::spawn(async move {
                let mut ticks = interval(status_period);
                ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticks.tick().await; // skip the immediate tick
                loop {
                    ticks.tick().await;
                    engine.report_status().await;
                }
            }));
        }

        handles
    }
}

/// How long to sleep until the next occurrence of `fetch_time` in `tz`.
///
/// If today's occurrence has already passed (or is exactly now), the next one
/// is tomorrow. A `fetch_time` that does not exist on a given local day (DST
/// spring-forward gap) slides to the earliest valid instant after it.
fn until_next_fetch(now: DateTime<Utc>, fetch_time: NaiveTime, tz: Tz) -> Duration {
    let local_now = now.with_timezone(&tz);
    let today = local_now.date_naive();

    for day in [today, today + Days::new(1), today + Days::new(2)] {
        let candidate = day
            .and_time(fetch_time)
            .and_local_timezone(tz)
            .earliest()
            // Gap day: take the first instant after the jump instead.
            .or_else(|| {
                day.and_time(fetch_time)
                    .checked_add_signed(chrono::Duration::hours(1))
                    .and_then(|t| t.and_local_timezone(tz).earliest())
            });
        if let Some(candidate) = candidate
            && candidate > local_now
        {
            return (candidate.with_timezone(&Utc) - now)
                .to_std()
                .unwrap_or(Duration::ZERO);
        }
    }
    // Unreachable for any real time zone; fall back to a day.
    Duration::from_secs(24 * 60 * 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Chicago;

    fn fetch_at(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn waits_until_later_today() {
        // 00:30 local, fetch at 02:00 local -> 90 minutes.
        let now = Chicago
            .with_ymd_and_hms(2024, 3, 5, 0, 30, 0)
            .unwrap()
            .with_timezone(&Utc);
        let wait = until_next_fetch(now, fetch_at(2, 0, 0), Chicago);
        assert_eq!(wait, Duration::from_secs(90 * 60));
    }

    #[test]
    fn rolls_over_to_tomorrow_when_passed() {
        // 10:00 local, fetch at 02:00 local -> 16 hours.
        let now = Chicago
            .with_ymd_and_hms(2024, 3, 5, 10, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let wait = until_next_fetch(now, fetch_at(2, 0, 0), Chicago);
        assert_eq!(wait, Duration::from_secs(16 * 60 * 60));
    }

    #[test]
    fn exactly_at_fetch_time_schedules_tomorrow() {
        let now = Chicago
            .with_ymd_and_hms(2024, 3, 5, 2, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let wait = until_next_fetch(now, fetch_at(2, 0, 0), Chicago);
        assert_eq!(wait, Duration::from_secs(24 * 60 * 60));
    }

    #[test]
    fn dst_gap_slides_forward() {
        // 2024-03-10 02:30 does not exist in Chicago (clocks jump 02:00->03:00).
        let now = Chicago
            .with_ymd_and_hms(2024, 3, 10, 0, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let wait = until_next_fetch(now, fetch_at(2, 30, 0), Chicago);
        // Slides to 03:30 local, which is 3.5 wall-clock hours but only 2.5
        // elapsed hours after midnight.
        assert_eq!(wait, Duration::from_secs(5 * 30 * 60));
    }

    #[test]
    fn never_returns_zero() {
        let now = Utc::now();
        let wait = until_next_fetch(now, fetch_at(0, 0, 0), Chicago);
        assert!(wait > Duration::ZERO);
        assert!(wait <= Duration::from_secs(25 * 60 * 60));
    }
}
