//! # Identity Resolver
//!
//! Turns a short, collision-prone hash prefix from a trace path into the best
//! matching directory node. Prefixes are one byte, so on a busy mesh several
//! repeaters can share one; the disambiguation heuristic leans on physics:
//! LoRa range is bounded, so among colliding candidates the one geometrically
//! nearest an already-established point in the path is almost certainly the
//! node that actually relayed the packet.
//!
//! Ranking, when a reference location is available:
//! starred pins first, then haversine distance ascending, then recency.
//! Without a reference: starred pins first, then recency.

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::directory::{NodeDirectory, NodeRecord};
use crate::geo::{haversine_km, Location};

/// Outcome of resolving a hash prefix.
#[derive(Debug, Clone)]
pub struct ResolvedNode {
    /// Full stable identity of the selected node.
    pub public_key: String,
    /// Advertised location, absent when the node hides it.
    pub location: Option<Location>,
    /// How many directory candidates shared the prefix. Anything above one
    /// means the answer is a heuristic, not a certainty.
    pub candidate_count: usize,
}

impl ResolvedNode {
    /// Whether the prefix mapped to exactly one candidate.
    pub fn is_unambiguous(&self) -> bool {
        self.candidate_count == 1
    }
}

/// Resolver over a read-only node directory.
pub struct IdentityResolver<'a, D: NodeDirectory> {
    directory: &'a D,
}

impl<'a, D: NodeDirectory> IdentityResolver<'a, D> {
    pub fn new(directory: &'a D) -> Self {
        Self { directory }
    }

    /// Resolve `prefix` (lowercase hex) to the most plausible routing node.
    ///
    /// `reference_location` is a point the path is already known to pass
    /// near, used to break prefix collisions; `recency_window` restricts
    /// candidates to recently heard nodes. Returns `None` when no routing
    /// node matches.
    pub fn resolve(
        &self,
        prefix: &str,
        reference_location: Option<Location>,
        recency_window: Option<Duration>,
    ) -> Option<ResolvedNode> {
        self.resolve_at(prefix, reference_location, recency_window, Utc::now())
    }

    /// [`resolve`](Self::resolve) with an explicit clock, for deterministic tests.
    pub fn resolve_at(
        &self,
        prefix: &str,
        reference_location: Option<Location>,
        recency_window: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Option<ResolvedNode> {
        let prefix = prefix.to_ascii_lowercase();
        let mut candidates = self
            .directory
            .routing_nodes_by_prefix(&prefix, recency_window, now);

        if candidates.is_empty() {
            debug!("resolve {prefix}: no routing candidates");
            return None;
        }
        let candidate_count = candidates.len();

        if candidate_count > 1 {
            match reference_location {
                Some(reference) => {
                    candidates.sort_by(|a, b| {
                        rank_with_reference(a, reference)
                            .partial_cmp(&rank_with_reference(b, reference))
                            .unwrap_or(std::cmp::Ordering::Equal)
                    });
                    debug!(
                        "resolve {prefix}: {candidate_count} candidates, nearest to reference wins"
                    );
                }
                None => {
                    candidates.sort_by_key(|n| (!n.starred, std::cmp::Reverse(n.last_seen)));
                    debug!("resolve {prefix}: {candidate_count} candidates, most recent wins");
                }
            }
        }

        let best = candidates.into_iter().next()?;
        Some(ResolvedNode {
            location: best.location(),
            public_key: best.public_key,
            candidate_count,
        })
    }
}

/// Sort key when a reference point exists: starred first, then distance
/// ascending (location-less candidates last), then most recently seen.
fn rank_with_reference(node: &NodeRecord, reference: Location) -> (u8, f64, i64) {
    let distance = match node.location() {
        Some(loc) => haversine_km(reference, loc),
        None => f64::INFINITY,
    };
    let starred_rank = if node.starred { 0 } else { 1 };
    // Negate the timestamp so newer sorts first under ascending comparison.
    (starred_rank, distance, -node.last_seen.timestamp())
}
