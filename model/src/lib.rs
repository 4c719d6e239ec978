#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod coverage;
mod curve;
mod error;
pub mod headless;
mod replay;
mod surface;
mod viewport;

pub use self::coverage::{Coverage, ProvinceTable};
pub use self::curve::{
    build_route, interpolate_segment, CURVE_FACTOR, DEFAULT_SAMPLES_PER_SEGMENT,
};
pub use self::error::ReplayError;
pub use self::replay::{ReplayConfig, ReplayStatus, RoutePlayer, TickOutcome};
pub use self::surface::{FrameHandle, FrameScheduler, MapSurface};
pub use self::viewport::Viewport;

// Callers shouldn't need to depend on the data crate just for these
pub use footprints::{GPSBounds, LonLat, Waypoint};
