//! # Meshtrace - Trace & Topology Inference for MeshCore Meshes
//!
//! Meshtrace discovers and maintains a confidence-weighted topology graph of
//! a packet radio mesh. Nodes are addressed only by short, collision-prone
//! hash prefixes, and topology can only be probed indirectly with echo-style
//! trace packets that get lost, retried, and answered out of order — this
//! crate is the machinery that copes with all of that.
//!
//! ## Features
//!
//! - **Trace Protocol Runner**: correlated probe/response with hop-scaled
//!   timeouts and bounded retry, over an injected transport.
//! - **Wire Codec**: packed path-length decoding with a legacy fallback, and
//!   content-addressed packet identity digests for duplicate suppression.
//! - **Identity Resolution**: disambiguates colliding hash prefixes using
//!   the physics of LoRa range — the geometrically nearest candidate to an
//!   established point in the path is the probable match.
//! - **Topology Graph**: directed, distance-annotated edges persisted in
//!   sled, refreshed idempotently on every confirmed trace.
//! - **Async Design**: single cooperative task per trace, no blocking waits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meshtrace::config::Config;
//! use meshtrace::trace::{TraceRunner, TraceTransport};
//!
//! async fn probe<T: TraceTransport>(transport: &T) -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let runner = TraceRunner::new(transport, &config.trace);
//!     let path = vec!["01".to_string(), "7a".to_string(), "55".to_string()];
//!     let report = runner.run_trace(Some(&path), config.trace.flags(), None).await?;
//!     println!("trace ok in {} attempt(s), {} hops", report.attempts, report.path_nodes.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`trace`] - probe protocol runner and the transport seam
//! - [`codec`] - packed path-length and packet-identity functions
//! - [`path`] - path-string parsing and round-trip construction
//! - [`resolver`] - hash-prefix to node-identity disambiguation
//! - [`directory`] - read-only node roster schema and queries
//! - [`topology`] - graph builder and sled-backed edge store
//! - [`geo`] - haversine distance and the hidden-location convention
//! - [`config`] - TOML configuration with defaults
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐   probe/response   ┌─────────────────┐
//! │ Trace Runner │ ─────────────────▶ │ resolved path    │
//! └──────────────┘                    │ {prefix, snr}... │
//!        │ transport (injected)       └─────────────────┘
//!        ▼                                     │
//! ┌──────────────┐    directory      ┌─────────────────┐
//! │   Radio /    │   ┌───────────▶   │ Topology Builder │
//! │   Firmware   │   │               └─────────────────┘
//! └──────────────┘   │                        │ upsert edges
//!              ┌───────────┐          ┌──────────────┐
//!              │ Resolver  │          │ sled store   │
//!              └───────────┘          └──────────────┘
//! ```

pub mod codec;
pub mod config;
pub mod directory;
pub mod geo;
pub mod path;
pub mod resolver;
pub mod topology;
pub mod trace;
