use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary key of the `users` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserID(pub usize);

/// Primary key of the `footprints` table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FootprintID(pub usize);

impl fmt::Display for UserID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "user #{}", self.0)
    }
}

impl fmt::Display for FootprintID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "footprint #{}", self.0)
    }
}
