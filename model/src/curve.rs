use footprints::LonLat;

use crate::ReplayError;

/// How far the control point sits from the midpoint, relative to the segment's length.
pub const CURVE_FACTOR: f64 = 0.2;
pub const DEFAULT_SAMPLES_PER_SEGMENT: usize = 150;

/// Samples a quadratic Bézier curve bowing away from the straight line between two points.
/// Returns `sample_count + 1` points; the first is exactly `start` and the last exactly `end`.
pub fn interpolate_segment(
    start: LonLat,
    end: LonLat,
    sample_count: usize,
) -> Result<Vec<LonLat>, ReplayError> {
    if sample_count == 0 {
        return Err(ReplayError::InvalidSampleCount);
    }
    for pt in [start, end] {
        if !pt.is_finite() {
            return Err(ReplayError::InvalidCoordinate(pt.to_string()));
        }
    }
    if start == end {
        return Ok(vec![start; sample_count + 1]);
    }

    // The control point is offset perpendicular to the displacement
    let mid_lat = (start.latitude + end.latitude) / 2.0;
    let mid_lng = (start.longitude + end.longitude) / 2.0;
    let control_lat = mid_lat + (end.longitude - start.longitude) * CURVE_FACTOR;
    let control_lng = mid_lng - (end.latitude - start.latitude) * CURVE_FACTOR;

    let mut pts = Vec::with_capacity(sample_count + 1);
    for i in 0..=sample_count {
        let t = i as f64 / sample_count as f64;
        let a = (1.0 - t) * (1.0 - t);
        let b = 2.0 * (1.0 - t) * t;
        let c = t * t;
        pts.push(LonLat::new(
            a * start.longitude + b * control_lng + c * end.longitude,
            a * start.latitude + b * control_lat + c * end.latitude,
        ));
    }
    Ok(pts)
}

/// Chains curves between consecutive points. Adjacent segments share an endpoint, so every
/// segment after the first drops its leading sample.
pub fn build_route(
    pts: &[LonLat],
    samples_per_segment: usize,
) -> Result<Vec<LonLat>, ReplayError> {
    if pts.len() < 2 {
        return Err(ReplayError::InsufficientData(pts.len()));
    }
    let mut route = Vec::with_capacity((pts.len() - 1) * samples_per_segment + 1);
    for (idx, pair) in pts.windows(2).enumerate() {
        let curve = interpolate_segment(pair[0], pair[1], samples_per_segment)?;
        if idx == 0 {
            route.extend(curve);
        } else {
            route.extend(curve.into_iter().skip(1));
        }
    }
    Ok(route)
}
