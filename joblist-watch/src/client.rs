//! Cancellable blocking-query client.
//!
//! Every logical query stream owns one [`QueryChannel`]. Issuing a request on a
//! channel cancels whatever that channel still had in flight, so each channel
//! has at most one outstanding request: the new request waits until the old
//! one has actually been dropped before it reaches the transport. Results that
//! complete after their request was superseded are discarded.

use crate::error::WatchResult;
use crate::transport::{QueryResult, QueryTransport, RequestSpec};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Default)]
struct ChannelSlot {
    generation: u64,
    token: Option<CancellationToken>,
}

/// A named stream of requests with at most one in flight.
#[derive(Debug)]
pub struct QueryChannel {
    name: &'static str,
    slot: Mutex<ChannelSlot>,
    /// Held by the request currently talking to the transport.
    permit: tokio::sync::Mutex<()>,
}

impl QueryChannel {
    /// Creates an idle channel.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(ChannelSlot::default()),
            permit: tokio::sync::Mutex::new(()),
        }
    }

    /// The channel's name, used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether a request is currently outstanding.
    pub fn is_busy(&self) -> bool {
        self.lock().token.is_some()
    }

    /// Aborts the outstanding request, if any. Its result will be dropped even
    /// if it has already arrived.
    pub fn cancel(&self) {
        let mut slot = self.lock();
        slot.generation += 1;
        if let Some(token) = slot.token.take() {
            debug!("Cancelling in-flight {} query", self.name);
            token.cancel();
        }
    }

    /// Cancels the previous request and installs a token for a new one.
    fn rearm(&self) -> (u64, CancellationToken) {
        let mut slot = self.lock();
        if let Some(previous) = slot.token.take() {
            debug!("Superseding in-flight {} query", self.name);
            previous.cancel();
        }
        slot.generation += 1;
        let token = CancellationToken::new();
        slot.token = Some(token.clone());
        (slot.generation, token)
    }

    /// Marks the request with `generation` complete. Returns false when it was
    /// superseded or cancelled in the meantime.
    fn finish(&self, generation: u64) -> bool {
        let mut slot = self.lock();
        if slot.generation == generation {
            slot.token = None;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelSlot> {
        // The slot holds no invariants a panicking holder could break.
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Issues index-gated queries through a [`QueryTransport`].
#[derive(Clone)]
pub struct BlockingQueryClient {
    transport: Arc<dyn QueryTransport>,
}

impl BlockingQueryClient {
    /// Creates a client over the given transport.
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        Self { transport }
    }

    /// Issues `spec` on `channel`, cancelling the channel's previous request.
    ///
    /// Returns `Ok(None)` when the request was aborted or superseded before
    /// its result could be used. Transport failures and authorization denials
    /// are returned as errors.
    pub async fn query(
        &self,
        channel: &QueryChannel,
        spec: &RequestSpec,
    ) -> WatchResult<Option<QueryResult>> {
        let (generation, token) = channel.rearm();

        // Wait for the superseded request to let go of the transport.
        let _permit = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            permit = channel.permit.lock() => permit,
        };

        debug!(
            "Issuing {} query on {} at index {}",
            spec.kind.label(),
            channel.name(),
            spec.index
        );

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.transport.issue(spec) => Some(result),
        };

        let Some(result) = outcome else {
            debug!("{} query aborted", channel.name());
            return Ok(None);
        };

        if !channel.finish(generation) {
            debug!("Discarding superseded {} result", channel.name());
            return Ok(None);
        }

        result.map(Some)
    }

    /// Issues a request outside any channel. Used for lookups that are awaited
    /// directly by a user action and never superseded.
    pub async fn one_shot(&self, spec: &RequestSpec) -> WatchResult<QueryResult> {
        debug!("Issuing one-shot {} query", spec.kind.label());
        self.transport.issue(spec).await
    }
}

impl std::fmt::Debug for BlockingQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingQueryClient").finish_non_exhaustive()
    }
}
