//! Caller identity.
//!
//! A caller is only used to pick the set of mounts it may see. Deciding what
//! that set is belongs to the mount registry, not to bucketfs itself.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallerKind {
    /// Administrator session. Sees every active mount.
    Admin,
    /// API key. Sees only the mounts granted to the key.
    ApiKey,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Caller {
    pub id: String,
    pub kind: CallerKind,
}

impl Caller {
    /// An administrator caller.
    pub fn admin(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: CallerKind::Admin,
        }
    }

    /// An API-key caller.
    pub fn api_key(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: CallerKind::ApiKey,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.kind == CallerKind::Admin
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_ref(), self.id)
    }
}
