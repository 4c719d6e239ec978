use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::UserID;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: UserID,
    pub name: String,
    /// URL or path of an uploaded avatar image
    pub avatar: Option<String>,
}

pub fn load<R: std::io::Read>(reader: R) -> Result<BTreeMap<UserID, User>> {
    let mut users = BTreeMap::new();
    for rec in csv::Reader::from_reader(reader).deserialize() {
        let rec: Record = rec?;
        if users.contains_key(&rec.id) {
            bail!("Duplicate {}", rec.id);
        }
        let name = rec.name.trim().to_string();
        if name.is_empty() {
            bail!("{} has no name", rec.id);
        }
        users.insert(
            rec.id,
            User {
                id: rec.id,
                name,
                avatar: rec.avatar,
            },
        );
    }
    Ok(users)
}

#[derive(Deserialize)]
struct Record {
    id: UserID,
    name: String,
    avatar: Option<String>,
}
