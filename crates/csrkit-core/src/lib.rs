#![forbid(unsafe_code)]

//! Core: terminal scroll capabilities and logging shims shared by the
//! csrkit render kernel.

pub mod capabilities;
pub mod logging;

pub use capabilities::{CapabilityContext, CapabilityError, DetectInputs, ScrollCaps};

// Re-export tracing macros at crate root so call sites read the same with
// or without the `tracing` feature.
#[cfg(feature = "tracing")]
pub use logging::{debug, debug_span, trace, trace_span, warn};
