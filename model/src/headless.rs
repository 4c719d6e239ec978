//! A map surface and frame scheduler with no screen attached. The command-line replayer draws
//! into these, and tests use them to check exactly what a replay did to the map.

use anyhow::Result;

use footprints::{GPSBounds, LonLat};

use crate::{FrameHandle, FrameScheduler, MapSurface, Viewport};

/// Operations that can be told to fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Failure {
    FitBounds,
    /// Fitting succeeds but reports a NaN zoom
    NonFiniteZoom,
    HideStaticLayers,
    PlaceMarker,
    /// The trail accepts this many points, then fails
    ExtendTrailAfter(usize),
}

pub struct HeadlessMap {
    pub viewport: Viewport,
    pub center: Option<LonLat>,
    pub zoom: f64,

    pub static_layers_visible: bool,
    pub hide_calls: usize,
    pub restore_calls: usize,

    pub trail: Option<Vec<LonLat>>,
    /// Markers currently on the map. More than 1 means somebody leaked one.
    pub live_markers: usize,
    pub marker_pos: Option<LonLat>,
    pub frames_drawn: usize,

    pub fail: Option<Failure>,
}

impl HeadlessMap {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            center: None,
            zoom: 0.0,

            static_layers_visible: true,
            hide_calls: 0,
            restore_calls: 0,

            trail: None,
            live_markers: 0,
            marker_pos: None,
            frames_drawn: 0,

            fail: None,
        }
    }

    pub fn trail_len(&self) -> usize {
        self.trail.as_ref().map(|t| t.len()).unwrap_or(0)
    }

    fn check(&self, failure: Failure) -> Result<()> {
        if self.fail == Some(failure) {
            bail!("injected failure: {:?}", failure);
        }
        Ok(())
    }
}

impl MapSurface for HeadlessMap {
    fn fit_bounds(&mut self, bounds: &GPSBounds, padding_px: f64) -> Result<f64> {
        self.check(Failure::FitBounds)?;
        if bounds.is_empty() {
            bail!("can't fit empty bounds");
        }
        self.zoom = self.viewport.fit_zoom(bounds, padding_px);
        self.center = Some(bounds.center());
        if self.fail == Some(Failure::NonFiniteZoom) {
            return Ok(f64::NAN);
        }
        Ok(self.zoom)
    }

    fn set_view(&mut self, center: LonLat, zoom: f64) -> Result<()> {
        self.center = Some(center);
        self.zoom = zoom;
        self.frames_drawn += 1;
        Ok(())
    }

    fn set_static_layers_visible(&mut self, visible: bool) -> Result<()> {
        if visible {
            self.restore_calls += 1;
        } else {
            self.check(Failure::HideStaticLayers)?;
            self.hide_calls += 1;
        }
        self.static_layers_visible = visible;
        Ok(())
    }

    fn show_trail(&mut self) -> Result<()> {
        if self.trail.is_some() {
            bail!("a trail is already on the map");
        }
        self.trail = Some(Vec::new());
        Ok(())
    }

    fn extend_trail(&mut self, pt: LonLat) -> Result<()> {
        if let Some(Failure::ExtendTrailAfter(n)) = self.fail {
            if self.trail_len() >= n {
                bail!("injected failure after {} trail points", n);
            }
        }
        match self.trail {
            Some(ref mut trail) => {
                trail.push(pt);
                Ok(())
            }
            None => bail!("no trail to extend"),
        }
    }

    fn remove_trail(&mut self) {
        self.trail = None;
    }

    fn place_marker(&mut self, pt: LonLat) -> Result<()> {
        self.check(Failure::PlaceMarker)?;
        self.live_markers += 1;
        self.marker_pos = Some(pt);
        Ok(())
    }

    fn move_marker(&mut self, pt: LonLat) -> Result<()> {
        if self.live_markers == 0 {
            bail!("no marker to move");
        }
        self.marker_pos = Some(pt);
        Ok(())
    }

    fn remove_marker(&mut self) {
        if self.live_markers > 0 {
            self.live_markers -= 1;
        }
        if self.live_markers == 0 {
            self.marker_pos = None;
        }
    }
}

/// Hands out frames one at a time. The host loop calls `fire` to find out if the player still
/// wants a callback.
#[derive(Default)]
pub struct ManualScheduler {
    next_id: u64,
    pending: Option<FrameHandle>,
    pub requested: usize,
    pub cancelled: usize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Consumes the pending frame, if any
    pub fn fire(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending = Some(handle);
        self.requested += 1;
        handle
    }

    /// Cancelling a frame that already fired does nothing.
    fn cancel_frame(&mut self, handle: FrameHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
            self.cancelled += 1;
        }
    }
}
