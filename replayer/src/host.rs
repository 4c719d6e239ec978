use std::time::{Duration, Instant};

use anyhow::Result;

use model::headless::{HeadlessMap, ManualScheduler};
use model::{RoutePlayer, TickOutcome};

pub type Player = RoutePlayer<HeadlessMap, ManualScheduler>;

/// Stands in for a display's per-frame callbacks. Refresh rate is deliberately independent of
/// the replay's frame rate.
pub struct HostLoop {
    pub refresh_hz: f64,
    /// Actually sleep between callbacks, instead of simulating the clock
    pub realtime: bool,
}

#[derive(Debug, PartialEq)]
pub struct HostStats {
    pub callbacks: usize,
    pub frames: usize,
    pub elapsed_ms: f64,
}

impl HostLoop {
    pub fn new(refresh_hz: f64, realtime: bool) -> Result<Self> {
        if !(refresh_hz.is_finite() && refresh_hz > 0.0) {
            bail!("Refresh rate must be positive, not {}", refresh_hz);
        }
        Ok(Self {
            refresh_hz,
            realtime,
        })
    }

    /// Keeps calling back as long as the player asks for another frame.
    pub fn run(&self, player: &mut Player) -> Result<HostStats> {
        let dt_ms = 1000.0 / self.refresh_hz;
        let started = Instant::now();
        let mut now_ms = dt_ms;
        let mut stats = HostStats {
            callbacks: 0,
            frames: 0,
            elapsed_ms: 0.0,
        };
        let mut next_report = 0.1;

        while player.scheduler_mut().fire().is_some() {
            stats.callbacks += 1;
            match player.tick(now_ms)? {
                TickOutcome::Advanced { .. } | TickOutcome::Completed => {
                    stats.frames += 1;
                }
                TickOutcome::Waiting | TickOutcome::Idle => {}
            }
            if let Some(progress) = player.progress() {
                if progress >= next_report {
                    info!("Replay {:.0}% done", progress * 100.0);
                    while next_report <= progress {
                        next_report += 0.1;
                    }
                }
            }

            if self.realtime {
                std::thread::sleep(Duration::from_secs_f64(dt_ms / 1000.0));
                now_ms = dt_ms + started.elapsed().as_secs_f64() * 1000.0;
            } else {
                now_ms += dt_ms;
            }
        }

        stats.elapsed_ms = now_ms - dt_ms;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use model::{ReplayConfig, ReplayStatus, Viewport, Waypoint};

    use super::*;

    fn player_with_trip(fps: u32) -> Player {
        let day = |d| NaiveDate::from_ymd_opt(2023, 5, d).unwrap();
        let mut player = RoutePlayer::new(
            HeadlessMap::new(Viewport::default()),
            ManualScheduler::new(),
        );
        player
            .start(
                &[
                    Waypoint::new(30.59, 114.30, day(1), "武汉"),
                    Waypoint::new(31.24, 121.49, day(2), "上海"),
                ],
                &ReplayConfig {
                    frames_per_second: fps,
                    samples_per_segment: 30,
                    padding_px: 50.0,
                },
            )
            .unwrap();
        player
    }

    #[test]
    fn runs_until_complete() {
        let mut player = player_with_trip(60);
        let stats = HostLoop::new(144.0, false).unwrap().run(&mut player).unwrap();
        assert_eq!(stats.frames, 31);
        assert!(stats.callbacks > stats.frames);
        assert_eq!(player.last_outcome(), Some(ReplayStatus::Completed));
        assert!(player.surface().static_layers_visible);
    }

    #[test]
    fn refresh_rate_does_not_change_duration() {
        let mut fast = player_with_trip(30);
        let fast_stats = HostLoop::new(240.0, false).unwrap().run(&mut fast).unwrap();
        let mut slow = player_with_trip(30);
        let slow_stats = HostLoop::new(60.0, false).unwrap().run(&mut slow).unwrap();
        assert_eq!(fast_stats.frames, slow_stats.frames);
        // About a second either way
        assert!((fast_stats.elapsed_ms - slow_stats.elapsed_ms).abs() < 50.0);
        assert!(fast_stats.callbacks > slow_stats.callbacks);
    }

    #[test]
    fn bad_refresh_rate() {
        assert!(HostLoop::new(0.0, false).is_err());
        assert!(HostLoop::new(f64::NAN, false).is_err());
    }
}
