use anyhow::Result;

use footprints::{GPSBounds, LonLat};

/// Whatever draws the map. Replay only needs a moving marker, a growing trail, a camera, and a
/// way to temporarily hide the static footprint markers and route line.
pub trait MapSurface {
    /// Moves the camera so the bounds fit inside the viewport, less some padding on every
    /// side, and returns the resulting zoom level.
    fn fit_bounds(&mut self, bounds: &GPSBounds, padding_px: f64) -> Result<f64>;
    fn set_view(&mut self, center: LonLat, zoom: f64) -> Result<()>;

    fn set_static_layers_visible(&mut self, visible: bool) -> Result<()>;

    fn show_trail(&mut self) -> Result<()>;
    fn extend_trail(&mut self, pt: LonLat) -> Result<()>;
    fn remove_trail(&mut self);

    fn place_marker(&mut self, pt: LonLat) -> Result<()>;
    fn move_marker(&mut self, pt: LonLat) -> Result<()>;
    fn remove_marker(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameHandle(pub u64);

/// The host's per-frame callback mechanism. The player never drives the clock; it only asks to
/// be called on the next frame, and the host calls `RoutePlayer::tick` when that happens.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}
