//! # Topology Graph Builder
//!
//! Converts a confirmed trace path into directed, distance-annotated edges.
//! When this node receives a trace it is the destination, so every link the
//! packet crossed is a real, just-confirmed edge. The builder resolves each
//! hash prefix through the identity resolver, chaining each resolved location
//! into the next resolution so geographic context accumulates hop by hop, and
//! upserts one edge per consecutive pair into the topology store.
//!
//! Resolution failures degrade gracefully: the affected endpoint keeps only
//! its prefix (no key, no distance) and the walk continues. Only store errors
//! abort an update.

pub mod store;

use chrono::{Duration, Utc};
use log::{debug, info};

use crate::directory::NodeDirectory;
use crate::geo::{haversine_km, Location};
use crate::resolver::IdentityResolver;
pub use store::{GraphEdge, SledTopologyStore, TopologyError, TopologyStore, EDGE_SCHEMA_VERSION};

/// Identity of the node this engine runs on, as the graph sees it.
#[derive(Debug, Clone)]
pub struct TraceOrigin {
    /// Our own hash prefix, lowercase hex.
    pub prefix: String,
    /// Our full public key, when known.
    pub public_key: Option<String>,
    /// Our advertised location, when shared.
    pub location: Option<Location>,
}

impl TraceOrigin {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().to_ascii_lowercase(),
            public_key: None,
            location: None,
        }
    }

    pub fn with_public_key(mut self, key: impl Into<String>) -> Self {
        self.public_key = Some(key.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// Builds and refreshes the topology graph from resolved trace paths.
pub struct TopologyBuilder<'a, D: NodeDirectory, S: TopologyStore> {
    resolver: IdentityResolver<'a, D>,
    store: &'a S,
    origin: TraceOrigin,
    recency_window: Option<Duration>,
}

impl<'a, D: NodeDirectory, S: TopologyStore> TopologyBuilder<'a, D, S> {
    pub fn new(
        directory: &'a D,
        store: &'a S,
        origin: TraceOrigin,
        recency_window: Option<Duration>,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(directory),
            store,
            origin,
            recency_window,
        }
    }

    /// Apply one confirmed trace path to the graph.
    ///
    /// `path_hashes` is the hop sequence as recorded in the packet, first
    /// relay first; this node is the destination. `self_trace` marks a
    /// round-trip probe we initiated ourselves, which is what licenses the
    /// symmetric immediate-neighbor shortcut.
    pub fn update_from_trace(
        &self,
        path_hashes: &[String],
        self_trace: bool,
    ) -> Result<(), TopologyError> {
        let path: Vec<String> = path_hashes
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        if path.is_empty() {
            debug!("topology: trace has no path hashes, skipping update");
            return Ok(());
        }

        let origin_location = self.origin_location();

        // A one-hop round trip we sent ourselves proves both directions: the
        // probe only travels outward and the echo only inward, but together
        // they cover the pair.
        if self_trace && path.len() == 1 {
            return self.update_immediate_neighbor(&path[0], origin_location);
        }

        debug!(
            "topology: updating from path {:?} (destination: {}, self_trace: {})",
            path, self.origin.prefix, self_trace
        );

        // Final link: last relay into us.
        let last = &path[path.len() - 1];
        let last_resolved = self.resolver.resolve(last, origin_location, self.recency_window);
        let last_location = last_resolved.as_ref().and_then(|r| r.location);
        let distance = pair_distance(last_location, origin_location);
        self.upsert(
            last,
            &self.origin.prefix,
            last_resolved.as_ref().map(|r| r.public_key.clone()),
            self.origin.public_key.clone(),
            path.len() as u32,
            distance,
        )?;

        // Remaining links between consecutive relays, walked from the far
        // end toward us so each resolved location seeds the next lookup.
        let mut previous_location = origin_location;
        for i in (1..path.len()).rev() {
            let from = &path[i - 1];
            let to = &path[i];
            let hop_position = (path.len() - i) as u32;

            let from_resolved = self.resolver.resolve(from, previous_location, self.recency_window);
            let from_location = from_resolved.as_ref().and_then(|r| r.location);
            let to_resolved = self.resolver.resolve(
                to,
                from_location.or(previous_location),
                self.recency_window,
            );
            let to_location = to_resolved.as_ref().and_then(|r| r.location);

            let distance = pair_distance(from_location, to_location);
            if let Some(loc) = from_location {
                previous_location = Some(loc);
            }

            self.upsert(
                from,
                to,
                from_resolved.map(|r| r.public_key),
                to_resolved.map(|r| r.public_key),
                hop_position,
                distance,
            )?;
        }

        Ok(())
    }

    fn update_immediate_neighbor(
        &self,
        neighbor: &str,
        origin_location: Option<Location>,
    ) -> Result<(), TopologyError> {
        let resolved = self
            .resolver
            .resolve(neighbor, origin_location, self.recency_window);
        let neighbor_key = resolved.as_ref().map(|r| r.public_key.clone());
        let distance = pair_distance(
            origin_location,
            resolved.as_ref().and_then(|r| r.location),
        );

        self.upsert(
            &self.origin.prefix,
            neighbor,
            self.origin.public_key.clone(),
            neighbor_key.clone(),
            1,
            distance,
        )?;
        self.upsert(
            neighbor,
            &self.origin.prefix,
            neighbor_key,
            self.origin.public_key.clone(),
            1,
            distance,
        )?;
        info!(
            "topology: trusted bidirectional edge with immediate neighbor {}",
            neighbor
        );
        Ok(())
    }

    /// Our own location: explicit when configured, otherwise looked up from
    /// the directory by our prefix.
    fn origin_location(&self) -> Option<Location> {
        if self.origin.location.is_some() {
            return self.origin.location;
        }
        self.resolver
            .resolve(&self.origin.prefix, None, self.recency_window)
            .and_then(|r| r.location)
    }

    fn upsert(
        &self,
        from_prefix: &str,
        to_prefix: &str,
        from_public_key: Option<String>,
        to_public_key: Option<String>,
        hop_position: u32,
        geographic_distance_km: Option<f64>,
    ) -> Result<(), TopologyError> {
        self.store.upsert_edge(GraphEdge {
            schema_version: EDGE_SCHEMA_VERSION,
            from_prefix: from_prefix.to_string(),
            to_prefix: to_prefix.to_string(),
            from_public_key,
            to_public_key,
            hop_position,
            geographic_distance_km,
            last_confirmed: Utc::now(),
        })
    }
}

fn pair_distance(a: Option<Location>, b: Option<Location>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(haversine_km(a, b)),
        _ => None,
    }
}
