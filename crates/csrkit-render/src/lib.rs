#![forbid(unsafe_code)]

//! Render kernel: turns two successive screen snapshots into the cheapest
//! correct repaint plan, using hardware scrolling when it pays off.
//!
//! The pipeline is one-directional:
//!
//! ```text
//! old/new BufferView ─► detect (line hashes) ─► ScrollOperation
//!                                                   │
//!                        CapabilityContext ─► cost::analyze_csr ─► accept / reject
//!                                                   │
//!                                             ansi sequences + redraw rows
//! ```
//!
//! Everything here is a pure function over its arguments: no I/O, no
//! retained state between calls.

pub mod ansi;
pub mod buffer;
pub mod cell;
pub mod cost;
pub mod detect;
pub mod smart_csr;
pub mod terminal_model;
pub mod view;

pub use csrkit_core::{CapabilityContext, CapabilityError, ScrollCaps};
pub use cost::{
    CsrReason, ScrollStrategy, SmartCsrAnalysis, SmartCsrConfig, analyze_csr, can_use_csr,
};
pub use detect::{LineHash, ScrollDirection, ScrollOperation, detect_scroll_operation, hash_line};
pub use smart_csr::{CsrScrollResult, SmartCsr, scroll_sequence};
pub use view::BufferView;
