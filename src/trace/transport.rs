//! Transport seam between the trace runner and whatever speaks to the radio.
//!
//! The runner never touches framing or an event bus directly: a host
//! implements [`TraceTransport`], sending probes and parking the runner on a
//! future that resolves with the correlated response. Timeout policy stays in
//! the runner; the transport only distinguishes "answered", "mesh said no",
//! and "link going away".

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;

/// One probe attempt, built fresh for every retry (tags are never reused).
#[derive(Debug, Clone)]
pub struct TraceProbe {
    /// Random non-zero 32-bit correlation id.
    pub tag: u32,
    /// Encoding-mode flags passed through to the firmware.
    pub flags: u8,
    /// Wire path string (comma-joined lowercase hex), `None` for a flood.
    pub path: Option<String>,
    /// Window the runner will wait for the correlated response.
    pub timeout: Duration,
}

/// One hop reported in a trace response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathNode {
    /// Hash prefix of the reporting node, lowercase hex.
    pub hash_prefix: String,
    /// Signal quality (SNR, dB) measured at that hop, when reported.
    pub snr: Option<f64>,
}

/// Correlated trace response event delivered by the transport.
#[derive(Debug, Clone, Default)]
pub struct TraceResponse {
    /// Ordered hops as recorded in the packet, first relay first.
    pub path_nodes: Vec<PathNode>,
    /// Raw path-length byte value from the wire.
    pub path_len: u8,
    /// Flags echoed by the responder.
    pub flags: u8,
}

/// Failures a transport can report to the runner.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// A well-formed error response from the mesh (retryable).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The transport is shutting down; nothing more will arrive.
    #[error("transport closed")]
    Closed,
}

/// Radio-facing collaborator injected into the trace runner.
#[allow(async_fn_in_trait)]
pub trait TraceTransport {
    /// Whether the link is up and the firmware exposes trace probes.
    fn is_connected(&self) -> bool;

    /// Transmit one probe. A `Protocol` error fails the attempt immediately.
    async fn send_trace(&self, probe: &TraceProbe) -> Result<(), TransportError>;

    /// Suspend until the response matching `tag` arrives. No internal
    /// timeout: the runner bounds this wait. `Closed` means the host is
    /// shutting the link down, which the runner reports as cancellation
    /// rather than a timeout.
    async fn wait_for_response(&self, tag: u32) -> Result<TraceResponse, TransportError>;
}
