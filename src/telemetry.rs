//! Telemetry utilities: subscriber setup, request timing and spans.

use crate::config::LogConfig;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if config.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Records request handling latency when dropped.
pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        crate::metrics::observe_request_duration(self.start.elapsed().as_secs_f64());
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Evaluation of one chat message.
    pub fn request(channel: &str, requester: &str) -> Span {
        info_span!("request", channel = %channel, requester = %requester)
    }

    /// One membership convergence run.
    pub fn reconcile(desired: usize, joined: usize) -> Span {
        info_span!("reconcile", desired, joined)
    }

    /// One live-status poll of the fleet loop.
    pub fn fleet_tick(tick: u64) -> Span {
        info_span!("fleet_tick", tick)
    }

    /// One in-game command.
    pub fn command(name: &str, source: &str) -> Span {
        info_span!("command", name = %name, source = %source)
    }
}
