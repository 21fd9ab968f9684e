//! Convergence of joined chat channels toward the desired set.

use super::bucket::JoinBucket;
use crate::chat::ChatTransport;
use crate::error::ChatError;
use crate::telemetry::spans;
use futures_util::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, debug, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct MembershipConfig {
    /// Joins allowed per `window` (K).
    pub join_limit: usize,
    /// Rolling window of the join limit (W).
    pub window: Duration,
    /// How long a join may go unacknowledged.
    pub join_timeout: Duration,
}

/// Result of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub parted: Vec<String>,
    pub joined: Vec<String>,
    /// Joins that timed out or errored; retried on the next run.
    pub failed: Vec<String>,
}

#[derive(Debug)]
struct State {
    joined: BTreeSet<String>,
    last_desired: Option<BTreeSet<String>>,
    bucket: JoinBucket,
}

/// Owns the joined channel set and the join budget.
///
/// The state mutex doubles as the reconciliation lock: only one convergence
/// runs at a time, so concurrent runs can never race the join budget.
pub struct ChannelMembershipController {
    transport: Arc<dyn ChatTransport>,
    config: MembershipConfig,
    state: Mutex<State>,
}

impl ChannelMembershipController {
    pub fn new(transport: Arc<dyn ChatTransport>, config: MembershipConfig) -> Self {
        Self {
            transport,
            config,
            state: Mutex::new(State {
                joined: BTreeSet::new(),
                last_desired: None,
                bucket: JoinBucket::new(config.join_limit, config.window),
            }),
        }
    }

    pub async fn joined(&self) -> BTreeSet<String> {
        self.state.lock().await.joined.clone()
    }

    /// Converge toward `desired`: part everything not wanted, then join the
    /// missing channels in budget-sized batches.
    pub async fn reconcile(&self, desired: &BTreeSet<String>) -> ReconcileReport {
        let mut state = self.state.lock().await;
        state.last_desired = Some(desired.clone());

        let span = spans::reconcile(desired.len(), state.joined.len());
        let report = self.converge(&mut state, desired).instrument(span).await;
        crate::metrics::set_joined_channels(state.joined.len());
        report
    }

    /// Forget every joined channel after the chat connection dropped.
    pub async fn forget_all(&self) {
        let mut state = self.state.lock().await;
        if !state.joined.is_empty() {
            info!(channels = state.joined.len(), "Chat connection lost, clearing joined channels");
        }
        state.joined.clear();
        crate::metrics::set_joined_channels(0);
    }

    /// Re-run the last reconciliation, e.g. right after reconnecting.
    pub async fn resync(&self) -> Option<ReconcileReport> {
        let desired = self.state.lock().await.last_desired.clone()?;
        Some(self.reconcile(&desired).await)
    }

    /// Reconcile every desired set received until the sender goes away.
    ///
    /// Sets that queued up while a run was in progress are collapsed to the
    /// newest one.
    pub async fn run(self: Arc<Self>, mut desired_rx: mpsc::Receiver<BTreeSet<String>>) {
        while let Some(mut desired) = desired_rx.recv().await {
            while let Ok(newer) = desired_rx.try_recv() {
                desired = newer;
            }
            let report = self.reconcile(&desired).await;
            if !report.failed.is_empty() {
                warn!(failed = ?report.failed, "Some channels failed to join");
            }
        }
        debug!("Desired set channel closed, membership controller stopping");
    }

    async fn converge(&self, state: &mut State, desired: &BTreeSet<String>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let to_leave: Vec<String> = state.joined.difference(desired).cloned().collect();
        let parts = join_all(to_leave.iter().map(|channel| self.transport.part(channel))).await;
        for (channel, result) in to_leave.into_iter().zip(parts) {
            if let Err(e) = result {
                warn!(channel = %channel, error = %e, "Part failed");
            }
            state.joined.remove(&channel);
            report.parted.push(channel);
        }

        let mut pending = desired
            .difference(&state.joined)
            .cloned()
            .collect::<Vec<_>>()
            .into_iter();

        loop {
            let remaining = pending.len();
            if remaining == 0 {
                break;
            }
            let granted = state.bucket.take_batch(remaining).await;
            let batch: Vec<String> = pending.by_ref().take(granted).collect();
            debug!(batch = batch.len(), remaining = remaining - batch.len(), "Joining batch");

            let results = join_all(batch.iter().map(|channel| self.join_one(channel))).await;
            for (channel, result) in batch.into_iter().zip(results) {
                match result {
                    Ok(()) => {
                        crate::metrics::record_join("ok");
                        state.joined.insert(channel.clone());
                        report.joined.push(channel);
                    }
                    Err(e) => {
                        let label = match e {
                            ChatError::JoinTimeout { .. } => "timeout",
                            _ => "error",
                        };
                        crate::metrics::record_join(label);
                        warn!(channel = %channel, error = %e, "Join failed, retrying next cycle");
                        report.failed.push(channel);
                    }
                }
            }
        }

        if !report.parted.is_empty() || !report.joined.is_empty() {
            info!(
                parted = report.parted.len(),
                joined = report.joined.len(),
                failed = report.failed.len(),
                total = state.joined.len(),
                "Reconciled channel membership"
            );
        }
        report
    }

    async fn join_one(&self, channel: &str) -> Result<(), ChatError> {
        match tokio::time::timeout(self.config.join_timeout, self.transport.join(channel)).await {
            Ok(result) => result,
            Err(_) => Err(ChatError::JoinTimeout {
                channel: channel.to_owned(),
                timeout: self.config.join_timeout,
            }),
        }
    }
}
