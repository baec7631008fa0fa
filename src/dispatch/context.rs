// src/dispatch/context.rs

/// Per-request counters threaded through the Dispatcher's retry/failover
/// loop. `retry` counts same-backend retries on the current backend;
/// `attempts` counts distinct backends tried for this request. Both default
/// to their spec-mandated values when absent: `retry = 0`, `attempts = 1`.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub retry: u32,
    pub attempts: u32,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            retry: 0,
            attempts: 1,
        }
    }
}
