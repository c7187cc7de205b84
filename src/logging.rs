//! Logging utilities for guardrail
//!
//! Re-exports tracing macros under log_* naming so call sites read uniformly
//! across the crate.

// Re-export tracing macros with log_* naming
pub use tracing::{
    debug as log_debug,
    error as log_error,
    info as log_info,
    trace as log_trace,
    warn as log_warn,
};
