//! Edge persistence for the topology graph.
//!
//! Edges are directional and keyed by the (from, to) hash-prefix pair, so a
//! repeated observation refreshes the stored record instead of duplicating
//! it. Expiry is handled here as a pruning pass over `last_confirmed`; the
//! builder never deletes anything.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sled::IVec;
use thiserror::Error;

/// Schema version stamped into serialized edge records.
pub const EDGE_SCHEMA_VERSION: u8 = 1;

const TREE_EDGES: &str = "topology_edges";

/// Errors from the topology store.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for edge {from}->{to}: expected {expected}, got {found}")]
    SchemaMismatch {
        from: String,
        to: String,
        expected: u8,
        found: u8,
    },
}

/// A directed, distance-annotated link between two mesh nodes.
///
/// The reverse direction is a distinct edge: radio links are frequently
/// asymmetric, so confirming `a -> b` says nothing about `b -> a`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub schema_version: u8,
    /// Hash prefix of the transmitting node, lowercase hex.
    pub from_prefix: String,
    /// Hash prefix of the receiving node, lowercase hex.
    pub to_prefix: String,
    /// Full identity of the transmitter, when the prefix resolved.
    pub from_public_key: Option<String>,
    /// Full identity of the receiver, when the prefix resolved.
    pub to_public_key: Option<String>,
    /// 1-based position of this link along the observed trace path.
    pub hop_position: u32,
    /// Great-circle distance between the resolved endpoints, when both
    /// shared a location.
    pub geographic_distance_km: Option<f64>,
    /// When this link was last confirmed by a trace.
    pub last_confirmed: DateTime<Utc>,
}

impl GraphEdge {
    /// Age of the observation relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_confirmed
    }
}

/// Write path consumed by the topology builder, plus the reads the CLI and
/// tests need. Upserts are best-effort and may race benignly with writers in
/// other processes; last write wins.
pub trait TopologyStore {
    /// Insert or refresh the edge keyed by its (from, to) prefix pair.
    fn upsert_edge(&self, edge: GraphEdge) -> Result<(), TopologyError>;

    /// Fetch one edge by its directed prefix pair.
    fn get_edge(&self, from_prefix: &str, to_prefix: &str)
        -> Result<Option<GraphEdge>, TopologyError>;

    /// All stored edges, in key order.
    fn list_edges(&self) -> Result<Vec<GraphEdge>, TopologyError>;

    /// Number of stored edges.
    fn edge_count(&self) -> Result<usize, TopologyError>;
}

/// Sled-backed edge store.
pub struct SledTopologyStore {
    _db: sled::Db,
    edges: sled::Tree,
}

impl SledTopologyStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TopologyError> {
        let path_ref: &Path = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let edges = db.open_tree(TREE_EDGES)?;
        Ok(Self { _db: db, edges })
    }

    /// Conventional location under a data directory.
    pub fn default_path(data_dir: &str) -> PathBuf {
        Path::new(data_dir).join("topology")
    }

    fn edge_key(from_prefix: &str, to_prefix: &str) -> Vec<u8> {
        format!(
            "edges:{}:{}",
            from_prefix.to_ascii_lowercase(),
            to_prefix.to_ascii_lowercase()
        )
        .into_bytes()
    }

    fn serialize(edge: &GraphEdge) -> Result<Vec<u8>, TopologyError> {
        Ok(bincode::serialize(edge)?)
    }

    fn deserialize(bytes: IVec) -> Result<GraphEdge, TopologyError> {
        let edge: GraphEdge = bincode::deserialize(&bytes)?;
        if edge.schema_version != EDGE_SCHEMA_VERSION {
            return Err(TopologyError::SchemaMismatch {
                from: edge.from_prefix,
                to: edge.to_prefix,
                expected: EDGE_SCHEMA_VERSION,
                found: edge.schema_version,
            });
        }
        Ok(edge)
    }

    /// Delete edges whose last confirmation is older than `window`.
    /// Returns the number removed.
    pub fn prune_expired(
        &self,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<usize, TopologyError> {
        let mut stale_keys = Vec::new();
        for entry in self.edges.iter() {
            let (key, value) = entry?;
            let edge = Self::deserialize(value)?;
            if edge.age(now) > window {
                stale_keys.push(key);
            }
        }
        let removed = stale_keys.len();
        for key in stale_keys {
            self.edges.remove(key)?;
        }
        if removed > 0 {
            self.edges.flush()?;
        }
        Ok(removed)
    }
}

impl TopologyStore for SledTopologyStore {
    fn upsert_edge(&self, mut edge: GraphEdge) -> Result<(), TopologyError> {
        edge.schema_version = EDGE_SCHEMA_VERSION;
        edge.from_prefix = edge.from_prefix.to_ascii_lowercase();
        edge.to_prefix = edge.to_prefix.to_ascii_lowercase();
        let key = Self::edge_key(&edge.from_prefix, &edge.to_prefix);
        let bytes = Self::serialize(&edge)?;
        self.edges.insert(key, bytes)?;
        self.edges.flush()?;
        Ok(())
    }

    fn get_edge(
        &self,
        from_prefix: &str,
        to_prefix: &str,
    ) -> Result<Option<GraphEdge>, TopologyError> {
        let key = Self::edge_key(from_prefix, to_prefix);
        match self.edges.get(key)? {
            Some(bytes) => Ok(Some(Self::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn list_edges(&self) -> Result<Vec<GraphEdge>, TopologyError> {
        let mut out = Vec::new();
        for entry in self.edges.iter() {
            let (_, value) = entry?;
            out.push(Self::deserialize(value)?);
        }
        Ok(out)
    }

    fn edge_count(&self) -> Result<usize, TopologyError> {
        Ok(self.edges.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn edge(from: &str, to: &str, hop: u32) -> GraphEdge {
        GraphEdge {
            schema_version: EDGE_SCHEMA_VERSION,
            from_prefix: from.to_string(),
            to_prefix: to.to_string(),
            from_public_key: None,
            to_public_key: None,
            hop_position: hop,
            geographic_distance_km: None,
            last_confirmed: Utc::now(),
        }
    }

    #[test]
    fn upsert_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let store = SledTopologyStore::open(dir.path()).expect("store");
        let mut e = edge("01", "7a", 1);
        e.geographic_distance_km = Some(12.5);
        store.upsert_edge(e).expect("upsert");
        let fetched = store.get_edge("01", "7a").expect("get").expect("present");
        assert_eq!(fetched.hop_position, 1);
        assert_eq!(fetched.geographic_distance_km, Some(12.5));
        assert_eq!(fetched.schema_version, EDGE_SCHEMA_VERSION);
    }

    #[test]
    fn reverse_direction_is_a_distinct_edge() {
        let dir = TempDir::new().expect("tempdir");
        let store = SledTopologyStore::open(dir.path()).expect("store");
        store.upsert_edge(edge("01", "7a", 1)).expect("upsert");
        store.upsert_edge(edge("7a", "01", 1)).expect("upsert");
        assert_eq!(store.edge_count().expect("count"), 2);
        assert!(store.get_edge("01", "7a").expect("get").is_some());
        assert!(store.get_edge("7a", "01").expect("get").is_some());
    }

    #[test]
    fn repeated_upsert_refreshes_instead_of_duplicating() {
        let dir = TempDir::new().expect("tempdir");
        let store = SledTopologyStore::open(dir.path()).expect("store");
        let first = edge("01", "7a", 1);
        let first_seen = first.last_confirmed;
        store.upsert_edge(first).expect("upsert");
        let mut again = edge("01", "7a", 1);
        again.last_confirmed = first_seen + Duration::minutes(5);
        again.geographic_distance_km = Some(3.0);
        store.upsert_edge(again).expect("upsert again");
        assert_eq!(store.edge_count().expect("count"), 1);
        let fetched = store.get_edge("01", "7a").expect("get").expect("present");
        assert!(fetched.last_confirmed > first_seen);
        assert_eq!(fetched.geographic_distance_km, Some(3.0));
    }

    #[test]
    fn keys_normalize_case() {
        let dir = TempDir::new().expect("tempdir");
        let store = SledTopologyStore::open(dir.path()).expect("store");
        store.upsert_edge(edge("7A", "01", 1)).expect("upsert");
        assert!(store.get_edge("7a", "01").expect("get").is_some());
        assert!(store.get_edge("7A", "01").expect("get").is_some());
    }

    #[test]
    fn prune_removes_only_stale_edges() {
        let dir = TempDir::new().expect("tempdir");
        let store = SledTopologyStore::open(dir.path()).expect("store");
        let now = Utc::now();
        let mut stale = edge("01", "7a", 1);
        stale.last_confirmed = now - Duration::days(30);
        store.upsert_edge(stale).expect("upsert stale");
        store.upsert_edge(edge("7a", "55", 2)).expect("upsert fresh");
        let removed = store
            .prune_expired(Duration::days(7), now)
            .expect("prune");
        assert_eq!(removed, 1);
        assert_eq!(store.edge_count().expect("count"), 1);
        assert!(store.get_edge("7a", "55").expect("get").is_some());
    }
}
