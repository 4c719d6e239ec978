use std::collections::BTreeSet;

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{FootprintID, LonLat, UserID};

/// One row of the `footprints` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Footprint {
    pub id: FootprintID,
    pub user_id: UserID,
    pub location: String,
    // Either may be missing or garbage in the raw export. Those records still show up in lists
    // and statistics, but never on the map.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// A footprint with usable coordinates, ready to be an endpoint of a travel segment.
#[derive(Clone, Debug, PartialEq)]
pub struct Waypoint {
    pub pos: LonLat,
    pub date: NaiveDate,
    pub location: String,
}

impl Waypoint {
    pub fn new(latitude: f64, longitude: f64, date: NaiveDate, location: &str) -> Self {
        Self {
            pos: LonLat::new(longitude, latitude),
            date,
            location: location.to_string(),
        }
    }

    pub fn has_valid_coordinates(&self) -> bool {
        self.pos.is_finite()
    }
}

impl Footprint {
    pub fn pos(&self) -> Option<LonLat> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) => Some(LonLat::new(lon, lat)),
            _ => None,
        }
    }

    pub fn to_waypoint(&self) -> Option<Waypoint> {
        Some(Waypoint {
            pos: self.pos()?,
            date: self.date,
            location: self.location.clone(),
        })
    }

    /// Case-insensitive match against the location and description, or a raw match against the
    /// date written as YYYY-MM-DD. `keyword` must already be trimmed and lowercased.
    pub fn matches(&self, keyword: &str) -> bool {
        if self.location.to_lowercase().contains(keyword) {
            return true;
        }
        if let Some(ref description) = self.description {
            if description.to_lowercase().contains(keyword) {
                return true;
            }
        }
        self.date.format("%Y-%m-%d").to_string().contains(keyword)
    }
}

pub fn load<R: std::io::Read>(reader: R) -> Result<Vec<Footprint>> {
    let mut seen = BTreeSet::new();
    let mut footprints = Vec::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        if !seen.insert(rec.id) {
            bail!("Duplicate {}", rec.id);
        }
        let latitude = parse_coordinate(rec.latitude.as_deref());
        let longitude = parse_coordinate(rec.longitude.as_deref());
        if latitude.is_none() || longitude.is_none() {
            debug!("{} at {} has no usable coordinates", rec.id, rec.location);
        }
        footprints.push(Footprint {
            id: rec.id,
            user_id: rec.user_id,
            location: rec.location,
            latitude,
            longitude,
            date: parse_date(&rec.date)?,
            description: rec.description,
            image_url: rec.image_url,
        });
    }
    Ok(footprints)
}

fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    let x = raw?.trim().parse::<f64>().ok()?;
    if x.is_finite() {
        Some(x)
    } else {
        None
    }
}

/// Plain dates, or full timestamps as the database driver serializes them.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(datetime) => Ok(datetime.naive_utc().date()),
        Err(err) => bail!("Can't parse date {:?}: {}", raw, err),
    }
}

#[derive(Deserialize)]
struct Record {
    id: FootprintID,
    user_id: UserID,
    location: String,
    latitude: Option<String>,
    longitude: Option<String>,
    date: String,
    description: Option<String>,
    image_url: Option<String>,
}
