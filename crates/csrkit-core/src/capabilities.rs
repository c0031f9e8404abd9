#![forbid(unsafe_code)]

//! Terminal scroll capabilities and the per-session capability context.
//!
//! A [`CapabilityContext`] is the only session-scoped value the render kernel
//! needs: the terminal dimensions plus the [`ScrollCaps`] flags describing
//! which hardware scroll primitives can be trusted. It is immutable; a resize
//! produces a new context rather than mutating the old one.
//!
//! # Detection
//!
//! [`ScrollCaps::detect`] reads a handful of environment variables:
//!
//! - `TERM`: dumb or empty terminals get no scroll primitives at all
//! - `TMUX`, `STY`, `ZELLIJ`: DECSTBM is not trusted inside a multiplexer;
//!   IL/DL still are
//! - `TERM=linux`: the Linux console keeps DECSTBM but is treated as
//!   damaging rows outside the region, so those rows get repainted
//!
//! Detection is deterministic: the same inputs always produce the same flags.
//! False negatives (disabling a primitive that would work) only cost bytes;
//! false positives corrupt the screen, so unknown situations fall back to
//! the conservative answer.

use std::env;
use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Hardware scroll primitives supported by the target terminal.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScrollCaps: u8 {
        /// DECSTBM scroll regions (`CSI top ; bottom r`) with SU/SD.
        const CSR = 0b0000_0001;
        /// IL/DL (`CSI n L` / `CSI n M`).
        const INSERT_DELETE = 0b0000_0010;
        /// Scrolling a region clobbers cells outside of it.
        const DESTROYS_OUTSIDE = 0b0000_0100;
    }
}

/// Environment snapshot consumed by [`ScrollCaps::detect_from_inputs`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectInputs {
    /// Value of `TERM`.
    pub term: String,
    /// `TMUX` is set.
    pub in_tmux: bool,
    /// `STY` is set (GNU screen).
    pub in_screen: bool,
    /// `ZELLIJ` is set.
    pub in_zellij: bool,
    /// `WT_SESSION` is set (Windows Terminal often omits `TERM`).
    pub wt_session: bool,
}

impl DetectInputs {
    /// Read the detection inputs from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            term: env::var("TERM").unwrap_or_default(),
            in_tmux: env::var("TMUX").is_ok(),
            in_screen: env::var("STY").is_ok(),
            in_zellij: env::var("ZELLIJ").is_ok(),
            wt_session: env::var("WT_SESSION").is_ok(),
        }
    }

    /// Running inside any known multiplexer.
    #[must_use]
    #[inline]
    pub const fn in_any_mux(&self) -> bool {
        self.in_tmux || self.in_screen || self.in_zellij
    }
}

impl ScrollCaps {
    /// Detect scroll capabilities from the process environment.
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_from_inputs(&DetectInputs::from_env())
    }

    /// Detect scroll capabilities from an explicit environment snapshot.
    #[must_use]
    pub fn detect_from_inputs(env: &DetectInputs) -> Self {
        let term = env.term.as_str();
        let is_dumb = term == "dumb" || (term.is_empty() && !env.wt_session);
        if is_dumb {
            return Self::empty();
        }

        // Inside a multiplexer only IL/DL are trusted.
        let mut caps = Self::INSERT_DELETE;
        if !env.in_any_mux() {
            caps |= Self::CSR;
        }
        if term == "linux" {
            caps |= Self::DESTROYS_OUTSIDE;
        }
        caps
    }

    /// DECSTBM scrolling is available.
    #[must_use]
    #[inline]
    pub const fn supports_csr(self) -> bool {
        self.contains(Self::CSR)
    }

    /// IL/DL are available.
    #[must_use]
    #[inline]
    pub const fn supports_insert_delete(self) -> bool {
        self.contains(Self::INSERT_DELETE)
    }

    /// Scrolling a region damages rows outside of it.
    #[must_use]
    #[inline]
    pub const fn destroys_outside_content(self) -> bool {
        self.contains(Self::DESTROYS_OUTSIDE)
    }
}

/// Construction error for [`CapabilityContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityError {
    /// Width or height was zero.
    InvalidDimensions {
        /// Requested width.
        width: u16,
        /// Requested height.
        height: u16,
    },
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions { width, height } => write!(
                f,
                "invalid terminal dimensions {width}x{height} (both must be non-zero)"
            ),
        }
    }
}

impl std::error::Error for CapabilityError {}

/// Immutable description of the target terminal for one session.
///
/// Threaded by the caller into every render-kernel call; nothing in the
/// kernel reads terminal size from global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityContext {
    width: u16,
    height: u16,
    caps: ScrollCaps,
}

impl CapabilityContext {
    /// Create a context for a `width` x `height` terminal.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::InvalidDimensions`] if either dimension is
    /// zero. This is a caller bug, not a runtime condition.
    pub fn new(width: u16, height: u16, caps: ScrollCaps) -> Result<Self, CapabilityError> {
        if width == 0 || height == 0 {
            return Err(CapabilityError::InvalidDimensions { width, height });
        }
        Ok(Self {
            width,
            height,
            caps,
        })
    }

    /// Create a context with capabilities detected from the environment.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn detect(width: u16, height: u16) -> Result<Self, CapabilityError> {
        Self::new(width, height, ScrollCaps::detect())
    }

    /// Return a context for new dimensions with the same capability flags.
    ///
    /// Never fails: a zero dimension (seen transiently while a window is
    /// being dragged) is clamped to one.
    #[must_use]
    pub fn resize(&self, width: u16, height: u16) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            caps: self.caps,
        }
    }

    /// Terminal width in columns.
    #[must_use]
    #[inline]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Terminal height in rows.
    #[must_use]
    #[inline]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Capability flags.
    #[must_use]
    #[inline]
    pub const fn caps(&self) -> ScrollCaps {
        self.caps
    }

    #[must_use]
    #[inline]
    pub const fn supports_csr(&self) -> bool {
        self.caps.supports_csr()
    }

    #[must_use]
    #[inline]
    pub const fn supports_insert_delete(&self) -> bool {
        self.caps.supports_insert_delete()
    }

    #[must_use]
    #[inline]
    pub const fn destroys_outside_content(&self) -> bool {
        self.caps.destroys_outside_content()
    }
}


#[cfg(test)]
mod capability_proptests {
    use super::{CapabilityContext, ScrollCaps};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn nonzero_dimensions_always_construct(w in 1u16.., h in 1u16.., bits in any::<u8>()) {
            let caps = ScrollCaps::from_bits_truncate(bits);
            let ctx = CapabilityContext::new(w, h, caps).unwrap();
            prop_assert_eq!(ctx.width(), w);
            prop_assert_eq!(ctx.height(), h);
            prop_assert_eq!(ctx.caps(), caps);
        }

        #[test]
        fn resize_never_yields_zero(w in any::<u16>(), h in any::<u16>()) {
            let ctx = CapabilityContext::new(10, 10, ScrollCaps::CSR).unwrap();
            let resized = ctx.resize(w, h);
            prop_assert!(resized.width() >= 1);
            prop_assert!(resized.height() >= 1);
            prop_assert_eq!(resized.caps(), ScrollCaps::CSR);
        }
    }
}
