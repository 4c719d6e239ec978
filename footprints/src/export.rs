use anyhow::Result;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};

use crate::LonLat;

pub fn linestring_feature(pts: &[LonLat], kind: &str) -> Feature {
    let mut feature = Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(
            pts.iter().map(|pt| vec![pt.x(), pt.y()]).collect(),
        ))),
        id: None,
        properties: None,
        foreign_members: None,
    };
    feature.set_property("type", kind);
    feature
}

pub fn point_feature(pt: LonLat, kind: &str) -> Feature {
    let mut feature = Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![pt.x(), pt.y()]))),
        id: None,
        properties: None,
        foreign_members: None,
    };
    feature.set_property("type", kind);
    feature
}

pub fn to_string(features: Vec<Feature>) -> Result<String> {
    let gj = GeoJson::FeatureCollection(FeatureCollection {
        features,
        bbox: None,
        foreign_members: None,
    });
    Ok(serde_json::to_string_pretty(&gj)?)
}

pub fn write_features(path: &str, features: Vec<Feature>) -> Result<()> {
    fs_err::write(path, to_string(features)?)?;
    info!("Wrote {}", path);
    Ok(())
}
