//! # Trace Protocol Runner
//!
//! Issues echo-style trace probes over an injected [`TraceTransport`] and
//! waits for the correlated response, with hop-scaled timeouts and a bounded
//! retry loop. Shared by the interactive trace command and any automated
//! topology sweep.
//!
//! Protocol shape per logical request:
//!
//! 1. refuse immediately when the transport is down (no attempts);
//! 2. per attempt: fresh random tag, transmit, suspend up to the timeout for
//!    the response carrying that tag;
//! 3. protocol errors and timeouts consume an attempt and retry after a fixed
//!    delay; the last attempt's outcome is the caller's answer;
//! 4. a transport shutdown mid-wait is a distinct `Cancelled` outcome, never
//!    confused with a timeout.
//!
//! Attempts run strictly sequentially, and because every attempt carries a
//! unique tag, a straggler response from attempt N can never satisfy
//! attempt N+1.

pub mod transport;

use log::debug;
use rand::Rng;
use thiserror::Error;
use tokio::time::{sleep, Duration};

use crate::config::TraceConfig;
use crate::path;
pub use transport::{PathNode, TraceProbe, TraceResponse, TraceTransport, TransportError};

/// Hook for hosts that keep a transmission log for duplicate suppression.
/// Called once per attempt, before the probe goes out.
pub trait TransmissionLog {
    fn record_trace_sent(&self, tag: u32);
}

/// Successful outcome of a logical trace request.
#[derive(Debug, Clone)]
pub struct TraceReport {
    /// Correlation tag of the attempt that succeeded.
    pub tag: u32,
    /// Ordered hops with per-hop signal quality, first relay first.
    pub path_nodes: Vec<PathNode>,
    /// Raw path-length byte from the response.
    pub path_len: u8,
    /// Flags echoed by the responder.
    pub flags: u8,
    /// Attempts consumed, including the successful one.
    pub attempts: u32,
}

/// Ways a logical trace request can fail.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Link down or probe capability missing; surfaced before any attempt.
    #[error("not connected or trace not available")]
    NotConnected,

    /// The mesh answered with an error on the final attempt.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No correlated response inside the window on the final attempt.
    #[error("no trace response within {timeout_seconds:.1}s (path: {path})")]
    Timeout { timeout_seconds: f64, path: String },

    /// The transport shut down while we were waiting.
    #[error("trace cancelled")]
    Cancelled,
}

/// Runs the trace protocol against an injected transport.
pub struct TraceRunner<'a, T: TraceTransport> {
    transport: &'a T,
    config: &'a TraceConfig,
    transmissions: Option<&'a dyn TransmissionLog>,
}

impl<'a, T: TraceTransport> TraceRunner<'a, T> {
    pub fn new(transport: &'a T, config: &'a TraceConfig) -> Self {
        Self {
            transport,
            config,
            transmissions: None,
        }
    }

    /// Attach a transmission log so sent probes can later be recognized as
    /// our own when they echo back.
    pub fn with_transmission_log(mut self, log: &'a dyn TransmissionLog) -> Self {
        self.transmissions = Some(log);
        self
    }

    /// Send a trace and wait for its response, retrying per config.
    ///
    /// `path` is the ordered hop list (empty or `None` floods); `flags`
    /// selects the wire encoding mode; `timeout` overrides the hop-scaled
    /// window when given. Returns the last attempt's outcome.
    pub async fn run_trace(
        &self,
        path: Option<&[String]>,
        flags: u8,
        timeout: Option<Duration>,
    ) -> Result<TraceReport, TraceError> {
        if !self.transport.is_connected() {
            return Err(TraceError::NotConnected);
        }

        let wire_path = path.and_then(path::path_to_wire);
        let hops = path.map(|p| p.len()).unwrap_or(0);
        let timeout = timeout.unwrap_or_else(|| self.config.timeout_for_hops(hops));
        let path_debug = wire_path.as_deref().unwrap_or("(flood)").to_string();

        let max_attempts = self.config.retry_count.max(1);
        let retry_delay = Duration::from_secs_f64(self.config.retry_delay_seconds.max(0.0));

        let mut last_err = TraceError::Timeout {
            timeout_seconds: timeout.as_secs_f64(),
            path: path_debug.clone(),
        };

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                debug!(
                    "trace retry {}/{} after {:.1}s delay",
                    attempt,
                    max_attempts,
                    retry_delay.as_secs_f64()
                );
                sleep(retry_delay).await;
            }

            let tag = rand::thread_rng().gen_range(1..=u32::MAX);
            if let Some(log) = self.transmissions {
                log.record_trace_sent(tag);
            }
            debug!(
                "trace: path={} hops={} timeout={:.1}s tag={} attempt={}/{}",
                path_debug,
                hops,
                timeout.as_secs_f64(),
                tag,
                attempt,
                max_attempts
            );

            let probe = TraceProbe {
                tag,
                flags,
                path: wire_path.clone(),
                timeout,
            };

            match self.run_attempt(&probe).await {
                Ok(response) => {
                    return Ok(TraceReport {
                        tag,
                        path_nodes: response.path_nodes,
                        path_len: response.path_len,
                        flags: response.flags,
                        attempts: attempt,
                    });
                }
                Err(TraceError::Cancelled) => return Err(TraceError::Cancelled),
                Err(err) => {
                    debug!("trace attempt {}/{} failed: {}", attempt, max_attempts, err);
                    last_err = err;
                }
            }
        }

        Err(last_err)
    }

    /// One attempt: transmit, then suspend up to the window for the
    /// correlated response. A response arriving after the window is simply
    /// never observed; the pending wait is dropped with the future.
    async fn run_attempt(&self, probe: &TraceProbe) -> Result<TraceResponse, TraceError> {
        if let Err(err) = self.transport.send_trace(probe).await {
            return Err(match err {
                TransportError::Protocol(reason) => TraceError::Protocol(reason),
                TransportError::Closed => TraceError::Cancelled,
            });
        }

        match tokio::time::timeout(probe.timeout, self.transport.wait_for_response(probe.tag)).await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(TransportError::Closed)) => Err(TraceError::Cancelled),
            Ok(Err(TransportError::Protocol(reason))) => Err(TraceError::Protocol(reason)),
            Err(_elapsed) => Err(TraceError::Timeout {
                timeout_seconds: probe.timeout.as_secs_f64(),
                path: probe.path.clone().unwrap_or_else(|| "(flood)".to_string()),
            }),
        }
    }
}
