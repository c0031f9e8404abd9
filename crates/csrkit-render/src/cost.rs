#![forbid(unsafe_code)]

//! Cost model and admission control for hardware scrolling.
//!
//! Hardware scrolling replaces rewriting `lines_preserved` rows with a short
//! control sequence. The model is a linear byte estimate, not a measurement:
//!
//! ```text
//! redraw_cost = lines_preserved × width × bytes_per_cell
//! csr_cost    = csr_overhead_bytes
//!             + rows_outside_region × width × bytes_per_cell   (destructive terminals only)
//! ```
//!
//! Scrolling is admitted only when `csr_cost < redraw_cost`.
//!
//! [`can_use_csr`] is the quick yes/no gate with fixed constants.
//! [`analyze_csr`] is the policy-driven version used by the orchestrator; it
//! reports why a scroll was rejected. Its check order is part of the
//! contract:
//!
//! 1. enabled
//! 2. capability
//! 3. geometry fits the terminal
//! 4. region height
//! 5. scroll ratio
//! 6. lines preserved
//! 7. clean edges
//! 8. cost

use std::fmt;

use csrkit_core::CapabilityContext;

use crate::detect::{ScrollDirection, ScrollOperation};

/// Estimated bytes for set-region + scroll + reset-region.
pub const CSR_OVERHEAD_BYTES: u32 = 20;

/// Estimated bytes to repaint one cell (SGR churn plus the glyph).
pub const BYTES_PER_CELL: u32 = 10;

/// Why hardware scrolling was or was not used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CsrReason {
    /// Accepted: hardware scroll is strictly cheaper.
    CsrCheaper,
    /// Smart CSR is turned off in the config.
    CsrDisabled,
    /// The terminal has no usable scroll primitive.
    TerminalNoCsr,
    /// Bounds are out of range or degenerate.
    InvalidGeometry,
    /// Region shorter than `min_region_height`.
    RegionTooSmall,
    /// Scroll amount exceeds `max_scroll_ratio` of the region.
    ScrollTooLarge,
    /// Fewer than `min_lines_preserved` rows survive the shift.
    TooFewLinesPreserved,
    /// Content touches the region's first or last column.
    EdgesNotClean,
    /// Redrawing is at least as cheap as scrolling.
    CsrMoreExpensive,
    /// No vertical shift explains the new content.
    NoScrollDetected,
}

impl CsrReason {
    /// Stable snake_case code for logs and assertions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CsrCheaper => "csr_cheaper",
            Self::CsrDisabled => "csr_disabled",
            Self::TerminalNoCsr => "terminal_no_csr",
            Self::InvalidGeometry => "invalid_geometry",
            Self::RegionTooSmall => "region_too_small",
            Self::ScrollTooLarge => "scroll_too_large",
            Self::TooFewLinesPreserved => "too_few_lines_preserved",
            Self::EdgesNotClean => "edges_not_clean",
            Self::CsrMoreExpensive => "csr_more_expensive",
            Self::NoScrollDetected => "no_scroll_detected",
        }
    }

    /// Whether this reason means hardware scrolling was admitted.
    #[must_use]
    #[inline]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::CsrCheaper)
    }
}

impl fmt::Display for CsrReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which primitive carries out an admitted scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollStrategy {
    /// DECSTBM region plus SU/SD.
    Csr,
    /// DL at one end of the region, IL at the other, full-screen margins.
    InsertDelete,
}

/// Admission policy for [`analyze_csr`].
///
/// Immutable; derive variants with the `with_*` methods.
#[derive(Debug, Clone, PartialEq)]
pub struct SmartCsrConfig {
    /// Master switch.
    pub enabled: bool,
    /// Regions shorter than this are always redrawn.
    pub min_region_height: u16,
    /// Largest `lines / region_height` still worth scrolling, in `0.0..=1.0`.
    pub max_scroll_ratio: f64,
    /// Fewest rows that must survive the shift.
    pub min_lines_preserved: u16,
    /// Estimated bytes to repaint one cell.
    pub bytes_per_cell: u32,
    /// Estimated bytes for the scroll sequences themselves.
    pub csr_overhead_bytes: u32,
    /// Reject scrolls when the region's first or last column has content.
    pub require_clean_sides: bool,
    /// Fall back to IL/DL on terminals without DECSTBM.
    pub allow_insert_delete: bool,
}

impl Default for SmartCsrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_region_height: 3,
            max_scroll_ratio: 0.75,
            min_lines_preserved: 2,
            bytes_per_cell: BYTES_PER_CELL,
            csr_overhead_bytes: CSR_OVERHEAD_BYTES,
            require_clean_sides: false,
            allow_insert_delete: false,
        }
    }
}

impl SmartCsrConfig {
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_min_region_height(mut self, rows: u16) -> Self {
        self.min_region_height = rows;
        self
    }

    /// Clamped to `0.0..=1.0`; NaN is treated as `0.0`.
    #[must_use]
    pub fn with_max_scroll_ratio(mut self, ratio: f64) -> Self {
        self.max_scroll_ratio = if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, 1.0)
        };
        self
    }

    #[must_use]
    pub fn with_min_lines_preserved(mut self, rows: u16) -> Self {
        self.min_lines_preserved = rows;
        self
    }

    #[must_use]
    pub fn with_bytes_per_cell(mut self, bytes: u32) -> Self {
        self.bytes_per_cell = bytes;
        self
    }

    #[must_use]
    pub fn with_csr_overhead_bytes(mut self, bytes: u32) -> Self {
        self.csr_overhead_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_require_clean_sides(mut self, require: bool) -> Self {
        self.require_clean_sides = require;
        self
    }

    #[must_use]
    pub fn with_allow_insert_delete(mut self, allow: bool) -> Self {
        self.allow_insert_delete = allow;
        self
    }
}

/// Explainable admission decision for one scroll operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmartCsrAnalysis {
    /// Whether hardware scrolling was admitted.
    pub use_csr: bool,
    /// Decision code.
    pub reason: CsrReason,
    /// Primitive that would carry the scroll; `None` when the terminal has none.
    pub strategy: Option<ScrollStrategy>,
    /// The operation analyzed.
    pub operation: ScrollOperation,
    /// Estimated bytes for the scroll plan.
    pub csr_cost: u64,
    /// Estimated bytes to redraw the preserved rows instead.
    pub redraw_cost: u64,
    /// `redraw_cost - csr_cost`; negative when scrolling is the worse deal.
    pub bytes_saved: i64,
    /// Rows that survive the shift.
    pub lines_preserved: u16,
}

#[inline]
fn rows_cost(rows: u64, width: u16, bytes_per_cell: u32) -> u64 {
    rows.saturating_mul(u64::from(width))
        .saturating_mul(u64::from(bytes_per_cell))
}

/// Byte estimate for the scroll plan itself.
fn plan_cost(
    ctx: &CapabilityContext,
    strategy: Option<ScrollStrategy>,
    region_height: u16,
    overhead: u32,
    bytes_per_cell: u32,
) -> u64 {
    let mut cost = u64::from(overhead);
    if strategy == Some(ScrollStrategy::Csr) && ctx.destroys_outside_content() {
        let outside = u64::from(ctx.height().saturating_sub(region_height));
        cost = cost.saturating_add(rows_cost(outside, ctx.width(), bytes_per_cell));
    }
    cost
}

/// Quick admission gate using the fixed default constants.
///
/// Rejects when the terminal lacks DECSTBM, when the bounds are invalid
/// (`top < 0`, `bottom > height`, `top >= bottom`), when `lines <= 0`, when
/// `lines` covers the whole region (that is a clear, not a scroll), or when
/// redrawing the preserved rows is not strictly more expensive.
pub fn can_use_csr(
    ctx: &CapabilityContext,
    top: i32,
    bottom: i32,
    lines: i32,
    direction: ScrollDirection,
) -> bool {
    csr_admission(ctx, top, bottom, lines, direction).is_ok()
}

/// [`can_use_csr`] with the rejection reason.
pub(crate) fn csr_admission(
    ctx: &CapabilityContext,
    top: i32,
    bottom: i32,
    lines: i32,
    direction: ScrollDirection,
) -> Result<ScrollOperation, CsrReason> {
    if !ctx.supports_csr() {
        return Err(CsrReason::TerminalNoCsr);
    }
    if top < 0 || bottom > i32::from(ctx.height()) || top >= bottom || lines <= 0 {
        return Err(CsrReason::InvalidGeometry);
    }
    if lines >= bottom - top {
        return Err(CsrReason::ScrollTooLarge);
    }
    // All three fit in u16 now: 0 <= top < bottom <= height and lines < bottom - top.
    let op = ScrollOperation::new(top as u16, bottom as u16, lines as u16, direction)
        .ok_or(CsrReason::InvalidGeometry)?;

    let csr_cost = plan_cost(
        ctx,
        Some(ScrollStrategy::Csr),
        op.region_height(),
        CSR_OVERHEAD_BYTES,
        BYTES_PER_CELL,
    );
    let redraw_cost = rows_cost(u64::from(op.lines_preserved()), ctx.width(), BYTES_PER_CELL);
    if csr_cost < redraw_cost {
        Ok(op)
    } else {
        Err(CsrReason::CsrMoreExpensive)
    }
}

/// Policy-driven admission decision for `op`.
///
/// `edges_clean` reports whether the region's first and last columns are
/// blank in both snapshots; it only matters when
/// [`SmartCsrConfig::require_clean_sides`] is set.
pub fn analyze_csr(
    ctx: &CapabilityContext,
    config: &SmartCsrConfig,
    op: &ScrollOperation,
    edges_clean: bool,
) -> SmartCsrAnalysis {
    let strategy = if ctx.supports_csr() {
        Some(ScrollStrategy::Csr)
    } else if config.allow_insert_delete && ctx.supports_insert_delete() {
        Some(ScrollStrategy::InsertDelete)
    } else {
        None
    };

    let region_height = op.region_height();
    let lines_preserved = op.lines_preserved();
    let csr_cost = plan_cost(
        ctx,
        strategy,
        region_height,
        config.csr_overhead_bytes,
        config.bytes_per_cell,
    );
    let redraw_cost = rows_cost(
        u64::from(lines_preserved),
        ctx.width(),
        config.bytes_per_cell,
    );
    let bytes_saved = i64::try_from(redraw_cost)
        .unwrap_or(i64::MAX)
        .saturating_sub(i64::try_from(csr_cost).unwrap_or(i64::MAX));

    let scroll_ratio = f64::from(op.lines()) / f64::from(region_height);

    let reason = if !config.enabled {
        CsrReason::CsrDisabled
    } else if strategy.is_none() {
        CsrReason::TerminalNoCsr
    } else if !op.fits(ctx.height()) {
        CsrReason::InvalidGeometry
    } else if region_height < config.min_region_height {
        CsrReason::RegionTooSmall
    } else if scroll_ratio > config.max_scroll_ratio {
        CsrReason::ScrollTooLarge
    } else if lines_preserved < config.min_lines_preserved {
        CsrReason::TooFewLinesPreserved
    } else if config.require_clean_sides && !edges_clean {
        CsrReason::EdgesNotClean
    } else if csr_cost >= redraw_cost {
        CsrReason::CsrMoreExpensive
    } else {
        CsrReason::CsrCheaper
    };

    SmartCsrAnalysis {
        use_csr: reason.is_accepted(),
        reason,
        strategy,
        operation: *op,
        csr_cost,
        redraw_cost,
        bytes_saved,
        lines_preserved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csrkit_core::ScrollCaps;

    fn ctx(width: u16, height: u16, caps: ScrollCaps) -> CapabilityContext {
        CapabilityContext::new(width, height, caps).unwrap()
    }

    fn csr_ctx() -> CapabilityContext {
        ctx(80, 24, ScrollCaps::CSR)
    }

    fn up(top: u16, bottom: u16, lines: u16) -> ScrollOperation {
        ScrollOperation::new(top, bottom, lines, ScrollDirection::Up).unwrap()
    }

    // ---- can_use_csr ----

    #[test]
    fn can_use_csr_accepts_typical_scroll() {
        assert!(can_use_csr(&csr_ctx(), 5, 20, 3, ScrollDirection::Up));
        assert!(can_use_csr(&csr_ctx(), 0, 24, 1, ScrollDirection::Down));
    }

    #[test]
    fn can_use_csr_requires_capability() {
        let no_csr = ctx(80, 24, ScrollCaps::INSERT_DELETE);
        for (top, bottom, lines) in [(0, 24, 1), (5, 20, 3), (0, 10, 2)] {
            assert!(!can_use_csr(&no_csr, top, bottom, lines, ScrollDirection::Up));
            assert!(!can_use_csr(&no_csr, top, bottom, lines, ScrollDirection::Down));
        }
    }

    #[test]
    fn can_use_csr_rejects_invalid_bounds() {
        let c = csr_ctx();
        assert!(!can_use_csr(&c, -1, 10, 1, ScrollDirection::Up));
        assert!(!can_use_csr(&c, 0, 25, 1, ScrollDirection::Up));
        assert!(!can_use_csr(&c, 10, 10, 1, ScrollDirection::Up));
        assert!(!can_use_csr(&c, 12, 10, 1, ScrollDirection::Up));
    }

    #[test]
    fn can_use_csr_rejects_non_positive_lines() {
        assert!(!can_use_csr(&csr_ctx(), 0, 10, 0, ScrollDirection::Up));
        assert!(!can_use_csr(&csr_ctx(), 0, 10, -3, ScrollDirection::Down));
    }

    #[test]
    fn can_use_csr_rejects_whole_region_scroll() {
        for lines in [10, 11, 50] {
            assert!(!can_use_csr(&csr_ctx(), 0, 10, lines, ScrollDirection::Up));
        }
    }

    #[test]
    fn can_use_csr_cost_boundary() {
        // One preserved row on a 2-column terminal: 1 × 2 × 10 = 20, not < 20.
        let narrow = ctx(2, 24, ScrollCaps::CSR);
        assert!(!can_use_csr(&narrow, 0, 2, 1, ScrollDirection::Up));
        // Three columns: 30 > 20.
        let wider = ctx(3, 24, ScrollCaps::CSR);
        assert!(can_use_csr(&wider, 0, 2, 1, ScrollDirection::Up));
    }

    #[test]
    fn admission_reports_reason() {
        let c = csr_ctx();
        assert_eq!(
            csr_admission(&c, 0, 10, 10, ScrollDirection::Up),
            Err(CsrReason::ScrollTooLarge)
        );
        assert_eq!(
            csr_admission(&c, 0, 30, 1, ScrollDirection::Up),
            Err(CsrReason::InvalidGeometry)
        );
        let no_csr = ctx(80, 24, ScrollCaps::empty());
        assert_eq!(
            csr_admission(&no_csr, 0, 10, 1, ScrollDirection::Up),
            Err(CsrReason::TerminalNoCsr)
        );
    }

    // ---- analyze_csr ----

    #[test]
    fn analyze_accepts_with_cost_accounting() {
        let a = analyze_csr(&csr_ctx(), &SmartCsrConfig::default(), &up(5, 20, 3), true);
        assert!(a.use_csr);
        assert_eq!(a.reason, CsrReason::CsrCheaper);
        assert_eq!(a.strategy, Some(ScrollStrategy::Csr));
        assert_eq!(a.lines_preserved, 12);
        assert_eq!(a.redraw_cost, 12 * 80 * 10);
        assert_eq!(a.csr_cost, 20);
        assert_eq!(a.bytes_saved, 9600 - 20);
    }

    #[test]
    fn analyze_disabled_wins_over_everything() {
        let config = SmartCsrConfig::default().with_enabled(false);
        let no_csr = ctx(80, 24, ScrollCaps::empty());
        let a = analyze_csr(&no_csr, &config, &up(0, 2, 1), false);
        assert_eq!(a.reason, CsrReason::CsrDisabled);
        assert!(!a.use_csr);
    }

    #[test]
    fn analyze_capability_before_geometry() {
        let no_csr = ctx(80, 24, ScrollCaps::INSERT_DELETE);
        let a = analyze_csr(&no_csr, &SmartCsrConfig::default(), &up(0, 2, 1), false);
        assert_eq!(a.reason, CsrReason::TerminalNoCsr);
        assert_eq!(a.strategy, None);
    }

    #[test]
    fn analyze_insert_delete_fallback() {
        let no_csr = ctx(80, 24, ScrollCaps::INSERT_DELETE);
        let config = SmartCsrConfig::default().with_allow_insert_delete(true);
        let a = analyze_csr(&no_csr, &config, &up(0, 10, 2), true);
        assert!(a.use_csr);
        assert_eq!(a.strategy, Some(ScrollStrategy::InsertDelete));
    }

    #[test]
    fn analyze_region_outside_terminal() {
        let small = ctx(80, 8, ScrollCaps::CSR);
        let a = analyze_csr(&small, &SmartCsrConfig::default(), &up(0, 10, 2), true);
        assert_eq!(a.reason, CsrReason::InvalidGeometry);
    }

    #[test]
    fn analyze_region_height_before_ratio() {
        // Height 2 with 1 line: too small and ratio 0.5; height check comes first.
        let a = analyze_csr(&csr_ctx(), &SmartCsrConfig::default(), &up(0, 2, 1), true);
        assert_eq!(a.reason, CsrReason::RegionTooSmall);
    }

    #[test]
    fn analyze_ratio_boundary() {
        let config = SmartCsrConfig::default().with_min_lines_preserved(0);
        // 3/4 = 0.75 is allowed, 4/5 = 0.8 is not.
        let at = analyze_csr(&csr_ctx(), &config, &up(0, 4, 3), true);
        assert_eq!(at.reason, CsrReason::CsrCheaper);
        let over = analyze_csr(&csr_ctx(), &config, &up(0, 5, 4), true);
        assert_eq!(over.reason, CsrReason::ScrollTooLarge);
    }

    #[test]
    fn analyze_ratio_before_lines_preserved() {
        // 4 of 5 rows: ratio 0.8 and only 1 preserved; ratio reported.
        let a = analyze_csr(&csr_ctx(), &SmartCsrConfig::default(), &up(0, 5, 4), true);
        assert_eq!(a.reason, CsrReason::ScrollTooLarge);
    }

    #[test]
    fn analyze_too_few_lines_preserved() {
        let config = SmartCsrConfig::default().with_min_lines_preserved(5);
        let a = analyze_csr(&csr_ctx(), &config, &up(0, 8, 4), true);
        assert_eq!(a.reason, CsrReason::TooFewLinesPreserved);
    }

    #[test]
    fn analyze_edges_only_when_required() {
        let op = up(0, 10, 2);
        let lax = analyze_csr(&csr_ctx(), &SmartCsrConfig::default(), &op, false);
        assert_eq!(lax.reason, CsrReason::CsrCheaper);

        let strict = SmartCsrConfig::default().with_require_clean_sides(true);
        let dirty = analyze_csr(&csr_ctx(), &strict, &op, false);
        assert_eq!(dirty.reason, CsrReason::EdgesNotClean);
        let clean = analyze_csr(&csr_ctx(), &strict, &op, true);
        assert_eq!(clean.reason, CsrReason::CsrCheaper);
    }

    #[test]
    fn analyze_edges_before_cost() {
        let config = SmartCsrConfig::default()
            .with_require_clean_sides(true)
            .with_csr_overhead_bytes(1_000_000);
        let a = analyze_csr(&csr_ctx(), &config, &up(0, 10, 2), false);
        assert_eq!(a.reason, CsrReason::EdgesNotClean);
    }

    #[test]
    fn analyze_cost_rejection() {
        let config = SmartCsrConfig::default().with_csr_overhead_bytes(1_000_000);
        let a = analyze_csr(&csr_ctx(), &config, &up(0, 10, 2), true);
        assert_eq!(a.reason, CsrReason::CsrMoreExpensive);
        assert!(a.bytes_saved < 0);
    }

    #[test]
    fn analyze_destructive_terminal_pays_for_outside_rows() {
        let destructive = ctx(80, 24, ScrollCaps::CSR | ScrollCaps::DESTROYS_OUTSIDE);
        // 10-row region: 14 outside rows cost more than 8 preserved rows.
        let a = analyze_csr(&destructive, &SmartCsrConfig::default(), &up(0, 10, 2), true);
        assert_eq!(a.csr_cost, 20 + 14 * 80 * 10);
        assert_eq!(a.reason, CsrReason::CsrMoreExpensive);
        // Full-screen region: nothing outside to repair.
        let full = analyze_csr(&destructive, &SmartCsrConfig::default(), &up(0, 24, 2), true);
        assert_eq!(full.csr_cost, 20);
        assert_eq!(full.reason, CsrReason::CsrCheaper);
    }

    #[test]
    fn ratio_override_is_clamped() {
        assert_eq!(
            SmartCsrConfig::default()
                .with_max_scroll_ratio(3.0)
                .max_scroll_ratio,
            1.0
        );
        assert_eq!(
            SmartCsrConfig::default()
                .with_max_scroll_ratio(f64::NAN)
                .max_scroll_ratio,
            0.0
        );
    }

    #[test]
    fn reason_codes_are_stable() {
        let all = [
            (CsrReason::CsrCheaper, "csr_cheaper"),
            (CsrReason::CsrDisabled, "csr_disabled"),
            (CsrReason::TerminalNoCsr, "terminal_no_csr"),
            (CsrReason::InvalidGeometry, "invalid_geometry"),
            (CsrReason::RegionTooSmall, "region_too_small"),
            (CsrReason::ScrollTooLarge, "scroll_too_large"),
            (CsrReason::TooFewLinesPreserved, "too_few_lines_preserved"),
            (CsrReason::EdgesNotClean, "edges_not_clean"),
            (CsrReason::CsrMoreExpensive, "csr_more_expensive"),
            (CsrReason::NoScrollDetected, "no_scroll_detected"),
        ];
        for (reason, code) in all {
            assert_eq!(reason.to_string(), code);
            assert_eq!(reason.is_accepted(), code == "csr_cheaper");
        }
    }
}
