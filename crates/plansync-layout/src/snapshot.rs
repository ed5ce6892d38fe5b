//! Layout records
//!
//! [`NodeLayout`] is a rectangle on the canvas, [`LayoutMap`] keys them by
//! node id and [`LayoutSnapshot`] is the envelope written to
//! `<plan>.layout.json`.

use chrono::{DateTime, Utc};
use plansync_model::Fingerprint;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// Snapshot format version written by this crate
pub const LAYOUT_VERSION: u32 = 1;

/// Position and size of a node in canvas pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeLayout {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NodeLayout {
    /// Create a layout rectangle
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Bottom edge
    #[inline]
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Right edge
    #[inline]
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Same size at a new position
    #[inline]
    #[must_use]
    pub fn moved_to(self, x: f64, y: f64) -> Self {
        Self { x, y, ..self }
    }

    /// Whether the interiors overlap; touching edges do not count
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Node id to placement, sorted by id
pub type LayoutMap = BTreeMap<String, NodeLayout>;

/// Persisted layout envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSnapshot {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Fingerprint of the plan text the layout was computed against
    #[serde(
        default,
        alias = "planHash",
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub content_hash: Option<Fingerprint>,

    /// Placements
    #[serde(default)]
    pub layouts: LayoutMap,

    /// When the snapshot was last produced
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Default for LayoutSnapshot {
    fn default() -> Self {
        Self {
            version: LAYOUT_VERSION,
            content_hash: None,
            layouts: LayoutMap::new(),
            last_modified: None,
        }
    }
}

impl LayoutSnapshot {
    /// Snapshot of `layouts` bound to `content_hash`, stamped now
    #[must_use]
    pub fn new(layouts: LayoutMap, content_hash: Fingerprint) -> Self {
        Self {
            version: LAYOUT_VERSION,
            content_hash: Some(content_hash),
            layouts,
            last_modified: Some(Utc::now()),
        }
    }

    /// Whether this snapshot was computed against `hash`
    #[inline]
    #[must_use]
    pub fn matches(&self, hash: Fingerprint) -> bool {
        self.content_hash == Some(hash)
    }

    /// Refresh the timestamp
    #[inline]
    pub fn touch(&mut self) {
        self.last_modified = Some(Utc::now());
    }
}

fn default_version() -> u32 {
    LAYOUT_VERSION
}

/// Older files store empty strings instead of omitting the field
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text.parse().map(Some).map_err(de::Error::custom),
    }
}
