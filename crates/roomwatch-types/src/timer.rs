//! Admin-controlled operation stopwatch and countdown timer.
//!
//! Both timers are two-state machines (`stopped` / `running`). Transitions
//! take the current wall-clock time explicitly so they can be driven from
//! tests without sleeping.
//!
//! ```
//! use roomwatch_types::{Countdown, TimerError};
//! use time::{Duration, OffsetDateTime};
//!
//! let now = OffsetDateTime::now_utc();
//! let mut countdown = Countdown::default();
//!
//! countdown.start(now, Some(30)).unwrap();
//! assert_eq!(countdown.duration_secs, 1800);
//! assert_eq!(countdown.start(now, None), Err(TimerError::CountdownRunning));
//!
//! // Pulling the target into the past clamps it just ahead of now.
//! countdown.adjust(now, -45).unwrap();
//! assert_eq!(countdown.target, Some(now + Duration::seconds(1)));
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::TimerError;

/// Countdown length used when no positive duration is requested.
pub const DEFAULT_COUNTDOWN_MINUTES: i64 = 60;

/// Countdown duration a reset timer reports.
pub const DEFAULT_COUNTDOWN_SECS: u32 = 3600;

/// Operation stopwatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stopwatch {
    /// When the current run started; `None` while stopped.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339::option"))]
    pub started_at: Option<OffsetDateTime>,
    /// Seconds accumulated by completed runs.
    pub accumulated_secs: u64,
    pub running: bool,
}

impl Stopwatch {
    /// Start a run.
    pub fn start(&mut self, now: OffsetDateTime) -> Result<(), TimerError> {
        if self.running {
            return Err(TimerError::StopwatchRunning);
        }
        self.started_at = Some(now);
        self.running = true;
        Ok(())
    }

    /// Stop the current run and fold its length into the accumulated total.
    pub fn stop(&mut self, now: OffsetDateTime) -> Result<(), TimerError> {
        if !self.running {
            return Err(TimerError::StopwatchStopped);
        }
        let elapsed = self.current_run_secs(now);
        self.accumulated_secs = self.accumulated_secs.saturating_add(elapsed);
        self.started_at = None;
        self.running = false;
        Ok(())
    }

    /// Clear everything, whatever the current state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Total elapsed seconds including the run in progress.
    #[must_use]
    pub fn elapsed_secs(&self, now: OffsetDateTime) -> u64 {
        if self.running {
            self.accumulated_secs
                .saturating_add(self.current_run_secs(now))
        } else {
            self.accumulated_secs
        }
    }

    fn current_run_secs(&self, now: OffsetDateTime) -> u64 {
        self.started_at
            .map(|start| (now - start).whole_seconds().max(0) as u64)
            .unwrap_or(0)
    }
}

/// Countdown timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Countdown {
    /// When the countdown reaches zero.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339::option"))]
    pub target: Option<OffsetDateTime>,
    /// Requested length of the current countdown.
    pub duration_secs: u32,
    pub running: bool,
}

impl Default for Countdown {
    fn default() -> Self {
        Self {
            target: None,
            duration_secs: DEFAULT_COUNTDOWN_SECS,
            running: false,
        }
    }
}

impl Countdown {
    /// Start a fresh countdown of `minutes` (60 when absent or non-positive).
    pub fn start(&mut self, now: OffsetDateTime, minutes: Option<i64>) -> Result<(), TimerError> {
        if self.running {
            return Err(TimerError::CountdownRunning);
        }
        let minutes = minutes
            .filter(|m| *m > 0)
            .unwrap_or(DEFAULT_COUNTDOWN_MINUTES);
        let duration_secs = minutes
            .checked_mul(60)
            .and_then(|secs| u32::try_from(secs).ok())
            .ok_or(TimerError::DurationOutOfRange { minutes })?;
        let target = now
            .checked_add(Duration::minutes(minutes))
            .ok_or(TimerError::DurationOutOfRange { minutes })?;

        self.target = Some(target);
        self.duration_secs = duration_secs;
        self.running = true;
        Ok(())
    }

    /// Pause the countdown. The target is kept; a later `start` computes a
    /// new one.
    pub fn stop(&mut self) -> Result<(), TimerError> {
        if !self.running {
            return Err(TimerError::CountdownStopped);
        }
        self.running = false;
        Ok(())
    }

    /// Clear everything, whatever the current state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Move the target by a signed number of minutes.
    ///
    /// A target that would land at or before `now` is clamped to one second
    /// from `now`, so an adjustment never expires the countdown on the spot.
    pub fn adjust(&mut self, now: OffsetDateTime, minutes: i64) -> Result<(), TimerError> {
        if !self.running {
            return Err(TimerError::CountdownStopped);
        }
        let target = self.target.ok_or(TimerError::CountdownTargetUnset)?;
        let adjusted = minutes
            .checked_mul(60)
            .and_then(|secs| target.checked_add(Duration::seconds(secs)))
            .ok_or(TimerError::DurationOutOfRange { minutes })?;

        self.target = Some(if adjusted <= now {
            now + Duration::seconds(1)
        } else {
            adjusted
        });
        Ok(())
    }

    /// Stop the countdown if it is running and its target has been reached.
    ///
    /// Returns `true` when this call expired the countdown.
    pub fn expire_if_due(&mut self, now: OffsetDateTime) -> bool {
        match self.target {
            Some(target) if self.running && now >= target => {
                self.running = false;
                true
            }
            _ => false,
        }
    }

    /// Time left before the target, or `None` when no target is set.
    #[must_use]
    pub fn remaining(&self, now: OffsetDateTime) -> Option<Duration> {
        self.target
            .map(|target| (target - now).max(Duration::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(1_700_000_000 + secs)
    }

    #[test]
    fn test_stopwatch_start_stop_accumulates() {
        let mut sw = Stopwatch::default();
        sw.start(at(0)).unwrap();
        assert!(sw.running);
        assert_eq!(sw.started_at, Some(at(0)));

        sw.stop(at(90)).unwrap();
        assert!(!sw.running);
        assert_eq!(sw.started_at, None);
        assert_eq!(sw.accumulated_secs, 90);

        sw.start(at(200)).unwrap();
        sw.stop(at(230)).unwrap();
        assert_eq!(sw.accumulated_secs, 120);
    }

    #[test]
    fn test_stopwatch_preconditions() {
        let mut sw = Stopwatch::default();
        assert_eq!(sw.stop(at(0)), Err(TimerError::StopwatchStopped));

        sw.start(at(0)).unwrap();
        assert_eq!(sw.start(at(5)), Err(TimerError::StopwatchRunning));
        assert_eq!(sw.started_at, Some(at(0)));
    }

    #[test]
    fn test_stopwatch_reset_from_any_state() {
        let mut sw = Stopwatch::default();
        sw.start(at(0)).unwrap();
        sw.stop(at(10)).unwrap();
        sw.start(at(20)).unwrap();

        sw.reset();
        assert_eq!(sw, Stopwatch::default());

        sw.reset();
        assert_eq!(sw, Stopwatch::default());
    }

    #[test]
    fn test_stopwatch_clock_skew_never_negative() {
        let mut sw = Stopwatch::default();
        sw.start(at(100)).unwrap();
        sw.stop(at(40)).unwrap();
        assert_eq!(sw.accumulated_secs, 0);
    }

    #[test]
    fn test_stopwatch_elapsed_includes_running_portion() {
        let mut sw = Stopwatch {
            accumulated_secs: 50,
            ..Default::default()
        };
        assert_eq!(sw.elapsed_secs(at(0)), 50);
        sw.start(at(0)).unwrap();
        assert_eq!(sw.elapsed_secs(at(25)), 75);
    }

    #[test]
    fn test_countdown_start_defaults_to_an_hour() {
        for minutes in [None, Some(0), Some(-5)] {
            let mut cd = Countdown::default();
            cd.start(at(0), minutes).unwrap();
            assert_eq!(cd.target, Some(at(3600)));
            assert_eq!(cd.duration_secs, 3600);
            assert!(cd.running);
        }
    }

    #[test]
    fn test_countdown_start_custom_duration() {
        let mut cd = Countdown::default();
        cd.start(at(0), Some(15)).unwrap();
        assert_eq!(cd.target, Some(at(900)));
        assert_eq!(cd.duration_secs, 900);
    }

    #[test]
    fn test_countdown_start_rejects_huge_duration() {
        let mut cd = Countdown::default();
        let result = cd.start(at(0), Some(i64::MAX));
        assert!(matches!(result, Err(TimerError::DurationOutOfRange { .. })));
        assert!(!cd.running);
    }

    #[test]
    fn test_countdown_stop_keeps_target() {
        let mut cd = Countdown::default();
        assert_eq!(cd.stop(), Err(TimerError::CountdownStopped));

        cd.start(at(0), Some(10)).unwrap();
        cd.stop().unwrap();
        assert!(!cd.running);
        assert_eq!(cd.target, Some(at(600)));

        // Restart computes a fresh target.
        cd.start(at(100), Some(10)).unwrap();
        assert_eq!(cd.target, Some(at(700)));
    }

    #[test]
    fn test_countdown_reset() {
        let mut cd = Countdown::default();
        cd.start(at(0), Some(5)).unwrap();
        cd.reset();
        assert_eq!(cd.target, None);
        assert_eq!(cd.duration_secs, DEFAULT_COUNTDOWN_SECS);
        assert!(!cd.running);
    }

    #[test]
    fn test_countdown_adjust() {
        let mut cd = Countdown::default();
        cd.start(at(0), Some(10)).unwrap();

        cd.adjust(at(0), 1).unwrap();
        assert_eq!(cd.target, Some(at(660)));

        cd.adjust(at(0), -1).unwrap();
        assert_eq!(cd.target, Some(at(600)));
    }

    #[test]
    fn test_countdown_adjust_clamps_to_future() {
        let mut cd = Countdown {
            target: Some(at(30)),
            duration_secs: 60,
            running: true,
        };

        cd.adjust(at(0), -1).unwrap();
        assert_eq!(cd.target, Some(at(1)));
    }

    #[test]
    fn test_countdown_adjust_onto_now_clamps() {
        let mut cd = Countdown {
            target: Some(at(60)),
            duration_secs: 60,
            running: true,
        };

        cd.adjust(at(0), -1).unwrap();
        assert_eq!(cd.target, Some(at(1)));
        assert!(!cd.expire_if_due(at(0)));
        assert!(cd.running);
    }

    #[test]
    fn test_countdown_adjust_preconditions() {
        let mut cd = Countdown::default();
        assert_eq!(cd.adjust(at(0), 1), Err(TimerError::CountdownStopped));

        let mut no_target = Countdown {
            running: true,
            ..Default::default()
        };
        assert_eq!(
            no_target.adjust(at(0), 1),
            Err(TimerError::CountdownTargetUnset)
        );
    }

    #[test]
    fn test_countdown_expiry() {
        let mut cd = Countdown {
            target: Some(at(10)),
            duration_secs: 60,
            running: true,
        };

        assert!(!cd.expire_if_due(at(9)));
        assert!(cd.running);

        assert!(cd.expire_if_due(at(10)));
        assert!(!cd.running);
        assert_eq!(cd.target, Some(at(10)));

        // Already stopped: nothing to do.
        assert!(!cd.expire_if_due(at(20)));
    }

    #[test]
    fn test_countdown_remaining() {
        let cd = Countdown {
            target: Some(at(100)),
            duration_secs: 100,
            running: true,
        };
        assert_eq!(cd.remaining(at(40)), Some(Duration::seconds(60)));
        assert_eq!(cd.remaining(at(140)), Some(Duration::ZERO));
        assert_eq!(Countdown::default().remaining(at(0)), None);
    }
}
