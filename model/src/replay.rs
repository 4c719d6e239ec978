use anyhow::Result;
use serde::{Deserialize, Serialize};

use footprints::{GPSBounds, LonLat, Waypoint};

use crate::curve::{self, DEFAULT_SAMPLES_PER_SEGMENT};
use crate::{FrameHandle, FrameScheduler, MapSurface, ReplayError};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Marker steps per second, no matter how often the host refreshes
    pub frames_per_second: u32,
    pub samples_per_segment: usize,
    /// Kept clear around the route when picking the zoom
    pub padding_px: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 60,
            samples_per_segment: DEFAULT_SAMPLES_PER_SEGMENT,
            padding_px: 50.0,
        }
    }
}

impl ReplayConfig {
    pub fn load(path: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(&fs_err::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReplayError> {
        if self.frames_per_second == 0 {
            return Err(ReplayError::InvalidFrameRate);
        }
        if self.samples_per_segment == 0 {
            return Err(ReplayError::InvalidSampleCount);
        }
        Ok(())
    }

    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.frames_per_second as f64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayStatus {
    Idle,
    Playing,
    Completed,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing is playing; a stale callback
    Idle,
    /// Too soon since the last frame
    Waiting,
    Advanced { index: usize },
    Completed,
}

/// Lives exactly as long as one replay session.
struct PlaybackState {
    path: Vec<LonLat>,
    current_index: usize,
    // Pinned for the whole session; re-fitting every frame makes the camera jitter
    fixed_zoom: f64,
    interval_ms: f64,
    last_frame_ms: f64,

    // What this session put on the map, so teardown undoes exactly that
    hid_static_layers: bool,
    trail_shown: bool,
    marker_placed: bool,
}

impl PlaybackState {
    fn new(path: Vec<LonLat>, fixed_zoom: f64, interval_ms: f64) -> Self {
        Self {
            path,
            current_index: 0,
            fixed_zoom,
            interval_ms,
            // The very first callback always draws
            last_frame_ms: 0.0,

            hid_static_layers: false,
            trail_shown: false,
            marker_placed: false,
        }
    }
}

/// Animates a marker along a user's footprints in date order, drawing a trail behind it.
///
/// `Idle -> Playing -> (Completed | Stopped) -> Idle`. Starting while something is already
/// playing stops the old session first. The host calls `tick` from its per-frame callback.
pub struct RoutePlayer<M: MapSurface, S: FrameScheduler> {
    surface: M,
    scheduler: S,
    session: Option<PlaybackState>,
    pending_frame: Option<FrameHandle>,
    last_outcome: Option<ReplayStatus>,
}

impl<M: MapSurface, S: FrameScheduler> RoutePlayer<M, S> {
    pub fn new(surface: M, scheduler: S) -> Self {
        Self {
            surface,
            scheduler,
            session: None,
            pending_frame: None,
            last_outcome: None,
        }
    }

    pub fn start(
        &mut self,
        waypoints: &[Waypoint],
        config: &ReplayConfig,
    ) -> Result<(), ReplayError> {
        config.validate()?;

        let mut valid: Vec<&Waypoint> = waypoints
            .iter()
            .filter(|w| w.has_valid_coordinates())
            .collect();
        if valid.len() < 2 {
            return Err(ReplayError::InsufficientData(valid.len()));
        }
        // Stable, so footprints on the same day keep their input order
        valid.sort_by_key(|w| w.date);
        let pts: Vec<LonLat> = valid.iter().map(|w| w.pos).collect();

        if self.session.is_some() {
            info!("Restarting replay");
            self.stop();
        }

        let fixed_zoom = self
            .surface
            .fit_bounds(&GPSBounds::from(&pts), config.padding_px)
            .map_err(ReplayError::RenderSurface)?;
        if !fixed_zoom.is_finite() {
            return Err(ReplayError::RenderSurface(anyhow!(
                "map reported zoom {} for the route",
                fixed_zoom
            )));
        }
        let path = curve::build_route(&pts, config.samples_per_segment)?;

        let mut session = PlaybackState::new(path, fixed_zoom, config.frame_interval_ms());
        if let Err(err) = self.enter(&mut session) {
            self.teardown(&session);
            return Err(ReplayError::RenderSurface(err));
        }

        info!(
            "Replaying {} footprints from {} to {}: {} frames at zoom {}",
            pts.len(),
            valid[0].location,
            valid[valid.len() - 1].location,
            session.path.len(),
            fixed_zoom
        );
        self.session = Some(session);
        self.pending_frame = Some(self.scheduler.request_frame());
        Ok(())
    }

    // Records each step as it happens, so teardown can undo a partial setup
    fn enter(&mut self, session: &mut PlaybackState) -> Result<()> {
        self.surface.set_static_layers_visible(false)?;
        session.hid_static_layers = true;
        self.surface.show_trail()?;
        session.trail_shown = true;
        self.surface.place_marker(session.path[0])?;
        session.marker_placed = true;
        Ok(())
    }

    /// Called from the host's frame callback. `timestamp_ms` is the host's clock.
    pub fn tick(&mut self, timestamp_ms: f64) -> Result<TickOutcome, ReplayError> {
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return Ok(TickOutcome::Idle),
        };
        // Normally this is the callback that already fired, but the host may also tick on its own
        if let Some(handle) = self.pending_frame.take() {
            self.scheduler.cancel_frame(handle);
        }

        let elapsed = timestamp_ms - session.last_frame_ms;
        if elapsed <= session.interval_ms {
            self.pending_frame = Some(self.scheduler.request_frame());
            return Ok(TickOutcome::Waiting);
        }
        session.last_frame_ms = timestamp_ms - (elapsed % session.interval_ms);

        let pt = session.path[session.current_index];
        if let Err(err) = draw_frame(&mut self.surface, pt, session.fixed_zoom) {
            warn!("Replay frame {} failed, stopping: {:#}", session.current_index, err);
            self.finish(ReplayStatus::Stopped);
            return Err(ReplayError::RenderSurface(err));
        }
        session.current_index += 1;
        let index = session.current_index;
        debug!("Replay frame {}/{} at {}", index, session.path.len(), pt);

        if index >= session.path.len() {
            self.finish(ReplayStatus::Completed);
            return Ok(TickOutcome::Completed);
        }
        self.pending_frame = Some(self.scheduler.request_frame());
        Ok(TickOutcome::Advanced { index })
    }

    /// Safe to call at any time, any number of times.
    pub fn stop(&mut self) {
        self.finish(ReplayStatus::Stopped);
    }

    fn finish(&mut self, outcome: ReplayStatus) {
        if let Some(handle) = self.pending_frame.take() {
            self.scheduler.cancel_frame(handle);
        }
        if let Some(session) = self.session.take() {
            self.teardown(&session);
            self.last_outcome = Some(outcome);
            info!(
                "Replay {:?} after {}/{} frames",
                outcome,
                session.current_index,
                session.path.len()
            );
        }
    }

    fn teardown(&mut self, session: &PlaybackState) {
        if session.trail_shown {
            self.surface.remove_trail();
        }
        if session.marker_placed {
            self.surface.remove_marker();
        }
        if session.hid_static_layers {
            if let Err(err) = self.surface.set_static_layers_visible(true) {
                error!("Couldn't restore static footprints after replay: {:#}", err);
            }
        }
    }

    pub fn status(&self) -> ReplayStatus {
        if self.session.is_some() {
            ReplayStatus::Playing
        } else {
            ReplayStatus::Idle
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    /// How the previous session ended, if there was one
    pub fn last_outcome(&self) -> Option<ReplayStatus> {
        self.last_outcome
    }

    pub fn current_index(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.current_index)
    }

    pub fn fixed_zoom(&self) -> Option<f64> {
        self.session.as_ref().map(|s| s.fixed_zoom)
    }

    pub fn path(&self) -> Option<&[LonLat]> {
        self.session.as_ref().map(|s| s.path.as_slice())
    }

    /// From 0 to 1
    pub fn progress(&self) -> Option<f64> {
        self.session
            .as_ref()
            .map(|s| s.current_index as f64 / s.path.len() as f64)
    }

    pub fn surface(&self) -> &M {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut M {
        &mut self.surface
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}

// Dropping mid-replay must not leave the static footprints hidden
impl<M: MapSurface, S: FrameScheduler> Drop for RoutePlayer<M, S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn draw_frame<M: MapSurface>(surface: &mut M, pt: LonLat, zoom: f64) -> Result<()> {
    surface.extend_trail(pt)?;
    surface.move_marker(pt)?;
    surface.set_view(pt, zoom)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::headless::{Failure, HeadlessMap, ManualScheduler};
    use crate::Viewport;

    type Player = RoutePlayer<HeadlessMap, ManualScheduler>;

    fn player() -> Player {
        RoutePlayer::new(HeadlessMap::new(Viewport::new(800.0, 600.0)), ManualScheduler::new())
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 5, d).unwrap()
    }

    fn trip() -> Vec<Waypoint> {
        // Deliberately out of order
        vec![
            Waypoint::new(31.24, 121.49, day(20), "上海"),
            Waypoint::new(30.59, 114.30, day(1), "武汉"),
            Waypoint::new(30.66, 104.06, day(10), "成都"),
        ]
    }

    fn config(samples: usize) -> ReplayConfig {
        ReplayConfig {
            frames_per_second: 10,
            samples_per_segment: samples,
            padding_px: 50.0,
        }
    }

    /// One display callback, the way a host delivers it
    fn step(player: &mut Player, now: f64) -> TickOutcome {
        assert!(player.scheduler_mut().fire().is_some());
        player.tick(now).unwrap()
    }

    /// Pretends to be a host refreshing every `dt_ms`, starting at `t0`. Returns the final time.
    fn run(player: &mut Player, t0: f64, dt_ms: f64) -> f64 {
        let mut now = t0;
        for _ in 0..100_000 {
            if player.scheduler_mut().fire().is_none() {
                return now;
            }
            player.tick(now).unwrap();
            now += dt_ms;
        }
        panic!("replay never finished");
    }

    #[test]
    fn rejects_too_few_points() {
        let mut p = player();
        let one = vec![Waypoint::new(30.59, 114.30, day(1), "武汉")];
        assert!(matches!(
            p.start(&one, &config(10)),
            Err(ReplayError::InsufficientData(1))
        ));
        assert!(matches!(
            p.start(&[], &config(10)),
            Err(ReplayError::InsufficientData(0))
        ));

        // Invalid coordinates are filtered before counting
        let mut bad = one.clone();
        bad.push(Waypoint::new(f64::NAN, 114.0, day(2), "???"));
        assert!(matches!(
            p.start(&bad, &config(10)),
            Err(ReplayError::InsufficientData(1))
        ));

        assert_eq!(p.status(), ReplayStatus::Idle);
        assert_eq!(p.surface().hide_calls, 0);
        assert_eq!(p.scheduler().requested, 0);

        bad.push(Waypoint::new(31.24, 121.49, day(3), "上海"));
        p.start(&bad, &config(10)).unwrap();
        assert_eq!(p.status(), ReplayStatus::Playing);
    }

    #[test]
    fn invalid_config_rejected() {
        let mut p = player();
        let mut cfg = config(10);
        cfg.frames_per_second = 0;
        assert!(matches!(p.start(&trip(), &cfg), Err(ReplayError::InvalidFrameRate)));
        assert!(matches!(
            p.start(&trip(), &config(0)),
            Err(ReplayError::InvalidSampleCount)
        ));
        assert!(!p.is_playing());
    }

    #[test]
    fn path_is_sorted_by_date() {
        let mut p = player();
        p.start(&trip(), &config(10)).unwrap();
        let path = p.path().unwrap();
        assert_eq!(path.len(), 21);
        assert_eq!(path[0], LonLat::new(114.30, 30.59));
        assert!(path[10].approx_eq(LonLat::new(104.06, 30.66), 1e-9));
        assert!(path[20].approx_eq(LonLat::new(121.49, 31.24), 1e-9));
        assert_eq!(p.current_index(), Some(0));
        assert_eq!(p.progress(), Some(0.0));
    }

    #[test]
    fn same_day_keeps_input_order() {
        let mut p = player();
        let waypoints = vec![
            Waypoint::new(39.90, 116.40, day(2), "北京"),
            Waypoint::new(30.59, 114.30, day(1), "武汉"),
            Waypoint::new(31.24, 121.49, day(1), "上海"),
        ];
        p.start(&waypoints, &config(4)).unwrap();
        let path = p.path().unwrap();
        assert_eq!(path[0], LonLat::new(114.30, 30.59));
        assert!(path[4].approx_eq(LonLat::new(121.49, 31.24), 1e-9));
        assert!(path[8].approx_eq(LonLat::new(116.40, 39.90), 1e-9));
    }

    #[test]
    fn plays_to_completion_and_restores() {
        let mut p = player();
        p.start(&trip(), &config(10)).unwrap();
        let zoom = p.fixed_zoom().unwrap();
        assert!(!p.surface().static_layers_visible);
        assert_eq!(p.surface().hide_calls, 1);
        assert_eq!(p.surface().live_markers, 1);

        run(&mut p, 1000.0, 16.0);

        assert_eq!(p.status(), ReplayStatus::Idle);
        assert_eq!(p.last_outcome(), Some(ReplayStatus::Completed));
        let map = p.surface();
        assert_eq!(map.frames_drawn, 21);
        assert_eq!(map.hide_calls, 1);
        assert_eq!(map.restore_calls, 1);
        assert!(map.static_layers_visible);
        assert!(map.trail.is_none());
        assert_eq!(map.live_markers, 0);
        // The camera never re-zoomed
        assert_eq!(map.zoom, zoom);
        assert!(map.center.unwrap().approx_eq(LonLat::new(121.49, 31.24), 1e-9));
        assert!(p.scheduler().pending().is_none());
    }

    #[test]
    fn throttles_to_frame_rate() {
        let mut p = player();
        // 10 fps means a frame every 100ms
        p.start(&trip(), &config(10)).unwrap();
        assert_eq!(step(&mut p, 1000.0), TickOutcome::Advanced { index: 1 });
        assert_eq!(step(&mut p, 1050.0), TickOutcome::Waiting);
        assert_eq!(step(&mut p, 1100.0), TickOutcome::Waiting);
        assert_eq!(step(&mut p, 1101.0), TickOutcome::Advanced { index: 2 });
        assert_eq!(p.surface().trail_len(), 2);

        // A fast host and a slow host take the same wall-clock time
        let mut fast = player();
        fast.start(&trip(), &config(10)).unwrap();
        let fast_end = run(&mut fast, 1000.0, 1000.0 / 240.0);
        let mut slow = player();
        slow.start(&trip(), &config(10)).unwrap();
        let slow_end = run(&mut slow, 1000.0, 1000.0 / 30.0);
        assert!((fast_end - slow_end).abs() < 150.0);
        assert_eq!(fast.surface().frames_drawn, slow.surface().frames_drawn);
    }

    #[test]
    fn stop_mid_replay() {
        let mut p = player();
        p.start(&trip(), &config(10)).unwrap();
        step(&mut p, 1000.0);
        step(&mut p, 1200.0);
        p.stop();

        assert_eq!(p.last_outcome(), Some(ReplayStatus::Stopped));
        assert_eq!(p.scheduler().cancelled, 1);
        assert!(p.scheduler().pending().is_none());
        let map = p.surface();
        assert_eq!(map.restore_calls, 1);
        assert!(map.trail.is_none());
        assert_eq!(map.live_markers, 0);

        // A callback that was already in flight does nothing
        assert_eq!(p.tick(1400.0).unwrap(), TickOutcome::Idle);
        assert_eq!(p.surface().frames_drawn, 2);

        p.stop();
        assert_eq!(p.surface().restore_calls, 1);
    }

    #[test]
    fn restart_leaves_one_marker() {
        let mut p = player();
        p.start(&trip(), &config(10)).unwrap();
        step(&mut p, 1000.0);
        p.start(&trip(), &config(5)).unwrap();

        assert_eq!(p.surface().live_markers, 1);
        assert_eq!(p.surface().trail_len(), 0);
        assert_eq!(p.surface().hide_calls, 2);
        assert_eq!(p.surface().restore_calls, 1);
        assert_eq!(p.scheduler().cancelled, 1);
        assert_eq!(p.path().unwrap().len(), 11);
        assert_eq!(p.last_outcome(), Some(ReplayStatus::Stopped));

        run(&mut p, 5000.0, 16.0);
        assert_eq!(p.surface().live_markers, 0);
        assert_eq!(p.surface().restore_calls, 2);
    }

    #[test]
    fn failed_restart_keeps_nothing() {
        let mut p = player();
        p.start(&trip(), &config(10)).unwrap();
        p.surface_mut().fail = Some(Failure::FitBounds);
        assert!(matches!(
            p.start(&trip(), &config(10)),
            Err(ReplayError::RenderSurface(_))
        ));
        assert!(!p.is_playing());
        assert_eq!(p.surface().live_markers, 0);
        assert!(p.surface().static_layers_visible);
    }

    #[test]
    fn partial_setup_is_undone() {
        let mut p = player();
        p.surface_mut().fail = Some(Failure::PlaceMarker);
        assert!(matches!(
            p.start(&trip(), &config(10)),
            Err(ReplayError::RenderSurface(_))
        ));
        assert!(!p.is_playing());
        let map = p.surface();
        assert_eq!(map.hide_calls, 1);
        assert_eq!(map.restore_calls, 1);
        assert!(map.trail.is_none());
        assert_eq!(p.scheduler().requested, 0);

        let mut p = player();
        p.surface_mut().fail = Some(Failure::HideStaticLayers);
        assert!(p.start(&trip(), &config(10)).is_err());
        assert_eq!(p.surface().restore_calls, 0);
        assert!(p.surface().trail.is_none());
    }

    #[test]
    fn frame_failure_stops() {
        let mut p = player();
        p.surface_mut().fail = Some(Failure::ExtendTrailAfter(3));
        p.start(&trip(), &config(10)).unwrap();
        let mut now = 1000.0;
        let mut result = Ok(TickOutcome::Waiting);
        while p.is_playing() {
            result = p.tick(now);
            now += 101.0;
        }
        assert!(matches!(result, Err(ReplayError::RenderSurface(_))));
        assert_eq!(p.last_outcome(), Some(ReplayStatus::Stopped));
        assert_eq!(p.surface().restore_calls, 1);
        assert_eq!(p.surface().live_markers, 0);
        // Ticked without the callback firing, so the failing tick had to cancel it
        assert!(p.scheduler().pending().is_none());
        assert!(p.scheduler().cancelled > 0);
        assert_eq!(p.tick(now).unwrap(), TickOutcome::Idle);
    }

    #[test]
    fn unusable_zoom_rejected() {
        let mut p = player();
        p.surface_mut().fail = Some(Failure::NonFiniteZoom);
        assert!(matches!(
            p.start(&trip(), &config(10)),
            Err(ReplayError::RenderSurface(_))
        ));
        assert!(!p.is_playing());
        let map = p.surface();
        assert_eq!(map.hide_calls, 0);
        assert_eq!(map.live_markers, 0);
        assert!(map.trail.is_none());
        assert_eq!(map.frames_drawn, 0);
        assert_eq!(p.scheduler().requested, 0);
    }

    #[test]
    fn config_from_json_uses_defaults() {
        let cfg: ReplayConfig = serde_json::from_str(r#"{"frames_per_second": 30}"#).unwrap();
        assert_eq!(cfg.frames_per_second, 30);
        assert_eq!(cfg.samples_per_segment, DEFAULT_SAMPLES_PER_SEGMENT);
        assert_eq!(cfg.padding_px, 50.0);
        assert!((cfg.frame_interval_ms() - 33.333).abs() < 0.001);
    }

    #[test]
    fn config_from_file() {
        let dir = std::env::temp_dir().join(format!("replay-config-{}", std::process::id()));
        fs_err::create_dir_all(&dir).unwrap();

        let good = dir.join("good.json");
        fs_err::write(&good, r#"{"frames_per_second": 24, "padding_px": 10}"#).unwrap();
        let cfg = ReplayConfig::load(good.to_str().unwrap()).unwrap();
        assert_eq!(cfg.frames_per_second, 24);
        assert_eq!(cfg.padding_px, 10.0);
        assert_eq!(cfg.samples_per_segment, DEFAULT_SAMPLES_PER_SEGMENT);

        let zero = dir.join("zero.json");
        fs_err::write(&zero, r#"{"samples_per_segment": 0}"#).unwrap();
        let err = ReplayConfig::load(zero.to_str().unwrap()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayError>(),
            Some(ReplayError::InvalidSampleCount)
        ));

        let broken = dir.join("broken.json");
        fs_err::write(&broken, "{frames_per_second: ").unwrap();
        assert!(ReplayConfig::load(broken.to_str().unwrap()).is_err());
        assert!(ReplayConfig::load(dir.join("missing.json").to_str().unwrap()).is_err());

        fs_err::remove_dir_all(&dir).unwrap();
    }
}
