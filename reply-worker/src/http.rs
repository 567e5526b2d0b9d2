//! HTTP server is used by supervisor to check worker liveness and progress.

use crate::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use warp::Filter;

/// Written by the poll loop, read by the health endpoint.
#[derive(Default)]
pub struct StatusReport {
    pub cycle_count: AtomicU64,
    pub processed_count: AtomicU64,
    /// Cycles aborted by a fetch fault.
    pub error_count: AtomicU64,
    /// Unix seconds of the last poll, zero until the first cycle runs.
    pub last_poll_epoch_s: AtomicU64,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    chain: &'static str,
    auth: &'static str,
    last_poll: Option<u64>,
    cycle_count: u64,
    processed_count: u64,
    error_count: u64,
}

/// Blocking operation which starts http server with paths:
/// 1. GET /health => JSON with the last poll timestamp and running counters
///
/// # Note
/// We use [`Ordering::SeqCst`] to read the values as performance here is
/// not paramount and it's just easier to not have to think about.
pub async fn start(conf: Conf, status: Arc<StatusReport>) {
    // 1.
    let health = warp::path("health").map(move || {
        let o = Ordering::SeqCst;
        let last_poll = match status.last_poll_epoch_s.load(o) {
            0 => None,
            s => Some(s),
        };

        warp::reply::json(&Health {
            status: "ok",
            chain: misc::CHAIN,
            auth: "oauth2",
            last_poll,
            cycle_count: status.cycle_count.load(o),
            processed_count: status.processed_count.load(o),
            error_count: status.error_count.load(o),
        })
    });

    let routes = warp::get().and(health);

    warp::serve(routes).run(conf.http_addr).await;
}
