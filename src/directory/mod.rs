//! # Node Directory
//!
//! Read-only view of the known-node roster consumed by the identity resolver.
//! The roster itself is owned elsewhere (advert ingestion, contact sync); this
//! module defines the record schema at that boundary plus two reference
//! implementations: an in-memory directory for embedding and tests, and a
//! JSON snapshot loader for the offline CLI.
//!
//! Records are validated into a fixed, versioned shape here so the resolver
//! and topology builder never have to probe loosely shaped contact data.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::Location;

/// Schema version stamped into serialized node records.
pub const NODE_SCHEMA_VERSION: u8 = 1;

/// Errors raised while loading or validating directory snapshots.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema mismatch for node {key}: expected {expected}, got {found}")]
    SchemaMismatch {
        key: String,
        expected: u8,
        found: u8,
    },

    #[error("invalid node record: {0}")]
    InvalidRecord(String),
}

/// Role a node advertises on the mesh.
///
/// Only repeaters and room servers participate in routing, so only they can
/// appear in a trace path; companions are end devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Repeater,
    #[serde(alias = "room_server")]
    Roomserver,
    Companion,
    Other,
}

impl NodeRole {
    /// Whether this role relays packets and can therefore be a trace hop.
    pub fn is_routing(self) -> bool {
        matches!(self, NodeRole::Repeater | NodeRole::Roomserver)
    }
}

/// A single directory entry for a known node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(default = "default_schema_version")]
    pub schema_version: u8,
    /// Full stable identity: the node's public key as lowercase hex.
    pub public_key: String,
    pub role: NodeRole,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub last_seen: DateTime<Utc>,
    /// User-applied pin; wins every disambiguation tiebreak.
    #[serde(default)]
    pub starred: bool,
    /// Display name, carried for tooling output only.
    #[serde(default)]
    pub name: Option<String>,
}

fn default_schema_version() -> u8 {
    NODE_SCHEMA_VERSION
}

impl NodeRecord {
    /// The record's advertised location, honoring the hidden-location
    /// convention (missing or all-zero coordinates mean "not shared").
    pub fn location(&self) -> Option<Location> {
        Location::from_coords(self.latitude, self.longitude)
    }

    /// Whether `public_key` starts with the given lowercase hex prefix.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.public_key.starts_with(prefix)
    }
}

/// Read-only directory queries used by the identity resolver.
pub trait NodeDirectory {
    /// Return all routing-role records whose public key starts with `prefix`
    /// (lowercase hex), optionally restricted to nodes seen within
    /// `recency_window` of `now`.
    fn routing_nodes_by_prefix(
        &self,
        prefix: &str,
        recency_window: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Vec<NodeRecord>;
}

/// Directory backed by a plain vector. Suits tests and hosts that already
/// hold their roster in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    nodes: Vec<NodeRecord>,
}

impl InMemoryDirectory {
    pub fn new(nodes: Vec<NodeRecord>) -> Self {
        Self { nodes }
    }

    /// Load a directory snapshot from a JSON array of node records.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DirectoryError> {
        let text = std::fs::read_to_string(path)?;
        let nodes: Vec<NodeRecord> = serde_json::from_str(&text)?;
        for node in &nodes {
            if node.schema_version != NODE_SCHEMA_VERSION {
                return Err(DirectoryError::SchemaMismatch {
                    key: node.public_key.clone(),
                    expected: NODE_SCHEMA_VERSION,
                    found: node.schema_version,
                });
            }
            if node.public_key.len() < 2
                || !node.public_key.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(DirectoryError::InvalidRecord(format!(
                    "public key {:?} is not hex",
                    node.public_key
                )));
            }
        }
        Ok(Self::new(nodes))
    }

    pub fn push(&mut self, node: NodeRecord) {
        self.nodes.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeDirectory for InMemoryDirectory {
    fn routing_nodes_by_prefix(
        &self,
        prefix: &str,
        recency_window: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Vec<NodeRecord> {
        let prefix = prefix.to_ascii_lowercase();
        self.nodes
            .iter()
            .filter(|n| n.role.is_routing())
            .filter(|n| n.matches_prefix(&prefix))
            .filter(|n| match recency_window {
                Some(window) => now - n.last_seen <= window,
                None => true,
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a repeater record with the given key prefix and coordinates.
    pub fn repeater(key: &str, lat: f64, lon: f64) -> NodeRecord {
        NodeRecord {
            schema_version: NODE_SCHEMA_VERSION,
            public_key: key.to_string(),
            role: NodeRole::Repeater,
            latitude: Some(lat),
            longitude: Some(lon),
            last_seen: Utc::now(),
            starred: false,
            name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::repeater;
    use super::*;

    #[test]
    fn prefix_query_excludes_companions() {
        let mut companion = repeater("7a11", 0.0, 0.0);
        companion.role = NodeRole::Companion;
        let dir = InMemoryDirectory::new(vec![repeater("7abc", 1.0, 2.0), companion]);
        let hits = dir.routing_nodes_by_prefix("7a", None, Utc::now());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].public_key, "7abc");
    }

    #[test]
    fn recency_window_filters_stale_nodes() {
        let mut stale = repeater("7a00", 1.0, 2.0);
        stale.last_seen = Utc::now() - Duration::days(30);
        let dir = InMemoryDirectory::new(vec![repeater("7abc", 1.0, 2.0), stale]);
        let hits = dir.routing_nodes_by_prefix("7a", Some(Duration::days(7)), Utc::now());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].public_key, "7abc");
    }

    #[test]
    fn prefix_matching_is_case_insensitive_on_query() {
        let dir = InMemoryDirectory::new(vec![repeater("7abc", 1.0, 2.0)]);
        assert_eq!(dir.routing_nodes_by_prefix("7A", None, Utc::now()).len(), 1);
    }

    #[test]
    fn hidden_location_reported_absent() {
        let node = repeater("7abc", 0.0, 0.0);
        assert!(node.location().is_none());
        let node = repeater("7abc", 47.6, -122.3);
        assert!(node.location().is_some());
    }

    #[test]
    fn json_snapshot_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nodes.json");
        let nodes = vec![repeater("7abc", 47.6, -122.3)];
        std::fs::write(&path, serde_json::to_string(&nodes).unwrap()).unwrap();
        let loaded = InMemoryDirectory::load_json(&path).expect("load");
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn json_snapshot_rejects_bad_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nodes.json");
        let mut node = repeater("7abc", 47.6, -122.3);
        node.public_key = "not-hex".to_string();
        std::fs::write(&path, serde_json::to_string(&vec![node]).unwrap()).unwrap();
        assert!(matches!(
            InMemoryDirectory::load_json(&path),
            Err(DirectoryError::InvalidRecord(_))
        ));
    }
}
