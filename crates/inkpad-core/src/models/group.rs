//! Group model

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::id::GroupId;
use crate::util::unix_millis_now;

/// Color used when a group is created without a valid color
pub const DEFAULT_GROUP_COLOR: &str = "#3b82f6";

/// A named, colored folder for notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier
    pub id: GroupId,
    pub name: String,
    /// Hex display color, e.g. `#3b82f6`
    pub color: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Group {
    #[must_use]
    pub fn new(name: impl Into<String>, color: &str) -> Self {
        Self {
            id: GroupId::new(),
            name: name.into().trim().to_string(),
            color: normalize_color(color),
            created_at: unix_millis_now(),
        }
    }

    pub fn apply(&mut self, patch: &GroupPatch) {
        if let Some(name) = &patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(color) = &patch.color {
            self.color = normalize_color(color);
        }
    }
}

/// Partial update for a [`Group`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// Lowercase a `#rgb`/`#rrggbb` color, or fall back to the default.
#[must_use]
pub fn normalize_color(raw: &str) -> String {
    static HEX_COLOR: OnceLock<Regex> = OnceLock::new();
    let re = HEX_COLOR.get_or_init(|| {
        Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("Invalid regex")
    });

    let trimmed = raw.trim();
    if re.is_match(trimmed) {
        trimmed.to_ascii_lowercase()
    } else {
        DEFAULT_GROUP_COLOR.to_string()
    }
}
