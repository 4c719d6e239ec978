#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

pub mod export;
mod footprint;
mod geo;
mod ids;
mod users;

use std::collections::BTreeMap;

use anyhow::Result;

pub use footprint::{parse_date, Footprint, Waypoint};
pub use geo::{GPSBounds, LonLat};
pub use ids::{FootprintID, UserID};
pub use users::User;

/// Everything exported from the `users` and `footprints` tables.
#[derive(Clone)]
pub struct Footprints {
    pub users: BTreeMap<UserID, User>,
    // In export order, which is the order ties are broken in
    pub footprints: Vec<Footprint>,
}

impl Footprints {
    /// Expects `users.csv` and `footprints.csv` in the directory.
    pub fn load_from_dir(path: &str) -> Result<Self> {
        Self::load(
            fs_err::File::open(format!("{path}/users.csv"))?,
            fs_err::File::open(format!("{path}/footprints.csv"))?,
        )
    }

    pub fn load<R1: std::io::Read, R2: std::io::Read>(
        users_csv: R1,
        footprints_csv: R2,
    ) -> Result<Self> {
        let users = users::load(users_csv)?;
        let mut kept = Vec::new();
        for fp in footprint::load(footprints_csv)? {
            if !users.contains_key(&fp.user_id) {
                warn!("{} belongs to unknown {}, skipping", fp.id, fp.user_id);
                continue;
            }
            kept.push(fp);
        }
        info!("Loaded {} users and {} footprints", users.len(), kept.len());
        Ok(Self {
            users,
            footprints: kept,
        })
    }

    pub fn empty() -> Self {
        Self {
            users: BTreeMap::new(),
            footprints: Vec::new(),
        }
    }

    /// Accepts a numeric ID or an exact (case-insensitive) name.
    pub fn find_user(&self, query: &str) -> Result<&User> {
        if let Ok(id) = query.trim().parse::<usize>() {
            if let Some(user) = self.users.get(&UserID(id)) {
                return Ok(user);
            }
        }
        let query = query.trim().to_lowercase();
        match self
            .users
            .values()
            .find(|user| user.name.to_lowercase() == query)
        {
            Some(user) => Ok(user),
            None => bail!("No user matches {:?}", query),
        }
    }

    /// Newest first. Equal dates keep export order.
    pub fn for_user(&self, user: UserID) -> Vec<&Footprint> {
        let mut list: Vec<&Footprint> = self
            .footprints
            .iter()
            .filter(|fp| fp.user_id == user)
            .collect();
        list.sort_by(|a, b| b.date.cmp(&a.date));
        list
    }

    /// A blank keyword matches everything.
    pub fn search(&self, user: UserID, keyword: &str) -> Vec<&Footprint> {
        let keyword = keyword.trim().to_lowercase();
        self.for_user(user)
            .into_iter()
            .filter(|fp| keyword.is_empty() || fp.matches(&keyword))
            .collect()
    }

    /// In export order; footprints without usable coordinates are dropped.
    pub fn waypoints_for_user(&self, user: UserID) -> Vec<Waypoint> {
        self.footprints
            .iter()
            .filter(|fp| fp.user_id == user)
            .filter_map(|fp| fp.to_waypoint())
            .collect()
    }

    /// Every location string, for coverage statistics. `None` covers all users.
    pub fn locations(&self, user: Option<UserID>) -> Vec<&str> {
        self.footprints
            .iter()
            .filter(|fp| user.map(|id| fp.user_id == id).unwrap_or(true))
            .map(|fp| fp.location.as_str())
            .collect()
    }

    /// Oldest-to-newest travel line of each user, skipping users with fewer than 2 usable
    /// points. This is what the "all members" view draws.
    pub fn routes_per_user(&self) -> BTreeMap<UserID, Vec<LonLat>> {
        let mut per_user: BTreeMap<UserID, Vec<Waypoint>> = BTreeMap::new();
        for fp in &self.footprints {
            if let Some(waypoint) = fp.to_waypoint() {
                per_user
                    .entry(fp.user_id)
                    .or_insert_with(Vec::new)
                    .push(waypoint);
            }
        }

        let mut results = BTreeMap::new();
        for (user, mut waypoints) in per_user {
            if waypoints.len() < 2 {
                continue;
            }
            waypoints.sort_by_key(|w| w.date);
            results.insert(user, waypoints.into_iter().map(|w| w.pos).collect());
        }
        results
    }

    pub fn export_to_geojson(&self, user: UserID, path: &str) -> Result<()> {
        let mut features = Vec::new();

        let mut waypoints = self.waypoints_for_user(user);
        if waypoints.is_empty() {
            bail!("{} has no footprints with coordinates", user);
        }
        waypoints.sort_by_key(|w| w.date);
        if waypoints.len() > 1 {
            let pts: Vec<LonLat> = waypoints.iter().map(|w| w.pos).collect();
            features.push(export::linestring_feature(&pts, "route"));
        }

        for (idx, waypoint) in waypoints.iter().enumerate() {
            let mut feature = export::point_feature(waypoint.pos, "footprint");
            feature.set_property("location", waypoint.location.clone());
            feature.set_property("date", waypoint.date.format("%Y-%m-%d").to_string());
            feature.set_property("sequence", idx + 1);
            features.push(feature);
        }

        export::write_features(path, features)
    }

    /// One line per member, as `routes_per_user` groups them.
    pub fn export_routes_to_geojson(&self, path: &str) -> Result<()> {
        let routes = self.routes_per_user();
        if routes.is_empty() {
            bail!("Nobody has 2 footprints with coordinates");
        }
        let mut features = Vec::new();
        for (user, pts) in routes {
            let mut feature = export::linestring_feature(&pts, "route");
            feature.set_property("user_id", user.0);
            feature.set_property("name", self.users[&user].name.clone());
            features.push(feature);
        }
        export::write_features(path, features)
    }
}
