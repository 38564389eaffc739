//! Single-flight deduplication of concurrent renders.

use crate::error::{ApiError, ApiResult};
use crate::metrics::SINGLE_FLIGHT_COALESCED;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use vignette_core::{RenderResult, SourceRef};

type Flight = Shared<BoxFuture<'static, ApiResult<RenderResult>>>;

/// Identity of one render: the full source reference, host and scheme
/// included, plus the requested size token.
///
/// Cache keys may drop the host, so two different origins can share a cache
/// key. They must never share a render.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FlightKey {
    source: SourceRef,
    size_token: String,
}

impl FlightKey {
    pub fn new(source: &SourceRef, size_token: &str) -> Self {
        Self {
            source: source.clone(),
            size_token: size_token.to_string(),
        }
    }
}

impl fmt::Display for FlightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.size_token, self.source)
    }
}

/// Per-key registry of renders in progress.
///
/// The first caller for a key spawns the work; callers arriving while it runs
/// await the same result. The work runs on its own task, so it completes even
/// if every caller goes away, and the key is released as soon as it finishes.
#[derive(Clone, Default)]
pub struct SingleFlight {
    in_flight: Arc<DashMap<FlightKey, Flight>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key` unless an identical run is already in progress.
    ///
    /// Returns the result and whether this caller started the work.
    pub async fn run<F>(&self, key: &FlightKey, work: F) -> (ApiResult<RenderResult>, bool)
    where
        F: Future<Output = ApiResult<RenderResult>> + Send + 'static,
    {
        let (flight, leader) = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => (existing.get().clone(), false),
            Entry::Vacant(vacant) => {
                let (tx, rx) = oneshot::channel();
                let flight: Flight = async move {
                    rx.await.unwrap_or_else(|_| {
                        Err(ApiError::Internal("render task aborted".to_string()))
                    })
                }
                .boxed()
                .shared();
                vacant.insert(flight.clone());

                // spawned only after the key is registered, so the task
                // cannot finish and deregister before insertion
                let in_flight = self.in_flight.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    let result = work.await;
                    in_flight.remove(&key);
                    let _ = tx.send(result);
                });
                (flight, true)
            }
        };

        if !leader {
            SINGLE_FLIGHT_COALESCED.inc();
            tracing::debug!(key = %key, "Awaiting in-flight render");
        }
        (flight.await, leader)
    }

    /// Number of keys currently rendering.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}
