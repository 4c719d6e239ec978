use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use footprints::{GPSBounds, LonLat};

const TILE_SIZE: f64 = 256.0;
// Web Mercator is undefined at the poles
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// A slippy-map viewport, just detailed enough to answer "what zoom fits these bounds?"
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Viewport {
    pub width_px: f64,
    pub height_px: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom levels are floored to a multiple of this
    pub zoom_snap: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width_px: 1280.0,
            height_px: 800.0,
            min_zoom: 0.0,
            max_zoom: 18.0,
            zoom_snap: 0.1,
        }
    }
}

impl Viewport {
    pub fn new(width_px: f64, height_px: f64) -> Self {
        Self {
            width_px,
            height_px,
            ..Default::default()
        }
    }

    /// The largest snapped zoom where the bounds, plus `padding_px` on every side, fit.
    pub fn fit_zoom(&self, bounds: &GPSBounds, padding_px: f64) -> f64 {
        if bounds.is_empty() {
            return self.min_zoom;
        }
        let avail_width = self.width_px - 2.0 * padding_px;
        let avail_height = self.height_px - 2.0 * padding_px;
        if avail_width <= 0.0 || avail_height <= 0.0 {
            return self.min_zoom;
        }

        let (width, height) = self.bounds_size_px(bounds, 0.0);
        if width == 0.0 && height == 0.0 {
            return self.max_zoom;
        }

        let scale = ratio(avail_width, width).min(ratio(avail_height, height));
        let zoom = self.snap(scale.log2());
        zoom.max(self.min_zoom).min(self.max_zoom)
    }

    /// Pixel size of the bounds at some zoom
    pub fn bounds_size_px(&self, bounds: &GPSBounds, zoom: f64) -> (f64, f64) {
        let (x1, y1) = project(LonLat::new(bounds.min_lon, bounds.max_lat));
        let (x2, y2) = project(LonLat::new(bounds.max_lon, bounds.min_lat));
        let scale = 2.0_f64.powf(zoom);
        ((x2 - x1).abs() * scale, (y2 - y1).abs() * scale)
    }

    fn snap(&self, zoom: f64) -> f64 {
        if self.zoom_snap <= 0.0 {
            return zoom;
        }
        // The epsilon keeps an exact fit from dropping a whole step to float error
        let steps = (zoom / self.zoom_snap + 1e-9).floor();
        (steps * self.zoom_snap * 1e6).round() / 1e6
    }
}

fn ratio(available: f64, needed: f64) -> f64 {
    if needed == 0.0 {
        f64::INFINITY
    } else {
        available / needed
    }
}

/// Position in pixels at zoom 0
fn project(pt: LonLat) -> (f64, f64) {
    let lat = pt.latitude.max(-MAX_LATITUDE).min(MAX_LATITUDE).to_radians();
    let x = (pt.longitude + 180.0) / 360.0 * TILE_SIZE;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * TILE_SIZE;
    (x, y)
}
