#![forbid(unsafe_code)]

//! Smart CSR orchestrator.
//!
//! [`SmartCsr::scroll`] compares two snapshots of a screen region and, when a
//! vertical shift explains the change and hardware scrolling is cheaper than
//! redrawing, returns the escape sequences that move the preserved rows plus
//! the rows the caller still has to repaint.
//!
//! # Usage
//!
//! ```
//! use csrkit_render::buffer::Buffer;
//! use csrkit_render::{CapabilityContext, ScrollCaps, SmartCsr};
//!
//! let ctx = CapabilityContext::new(20, 6, ScrollCaps::CSR).unwrap();
//! let old = Buffer::from_lines(20, 6, &["a", "b", "c", "d", "e", "f"]);
//! let new = Buffer::from_lines(20, 6, &["b", "c", "d", "e", "f", "g"]);
//!
//! let result = SmartCsr::default().scroll(&ctx, &old, &new, 0, 6);
//! assert!(result.used_csr);
//! assert_eq!(result.joined(), "\x1b[1;6r\x1b[6;1H\x1b[S\x1b[r");
//! assert_eq!(result.lines_to_redraw, vec![5]);
//! ```
//!
//! # Plans
//!
//! With DECSTBM (`ScrollStrategy::Csr`):
//!
//! ```text
//! up n:    CSI top+1;bottom r   CSI bottom;1 H   CSI n S   CSI r
//! down n:  CSI top+1;bottom r   CSI top+1;1 H    CSI n T   CSI r
//! ```
//!
//! Without it, when allowed (`ScrollStrategy::InsertDelete`):
//!
//! ```text
//! up n:    CUP top+1      DL n   CUP bottom-n+1   IL n
//! down n:  CUP bottom-n+1 DL n   CUP top+1        IL n
//! ```
//!
//! The second pair leaves rows below the region where they were.
//!
//! # Redraw rows
//!
//! `lines_to_redraw` is sorted, deduplicated, and holds:
//! - the rows exposed by the shift;
//! - preserved rows whose new content differs from the shifted old content
//!   (detection tolerates up to 20% mismatches);
//! - every row outside the region on terminals that blank it while scrolling.

use std::io::{self, Write};

use csrkit_core::{CapabilityContext, debug, debug_span, trace};

use crate::ansi;
use crate::cost::{self, CsrReason, ScrollStrategy, SmartCsrAnalysis, SmartCsrConfig};
use crate::detect::{self, LineHash, ScrollDirection, ScrollOperation};
use crate::view::BufferView;

/// Outcome of one scroll decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrScrollResult {
    /// Whether `sequences` performs a hardware scroll.
    pub used_csr: bool,
    /// Escape sequences to write, in order. Empty when rejected.
    pub sequences: Vec<String>,
    /// 0-indexed rows to repaint after writing `sequences`.
    pub lines_to_redraw: Vec<u16>,
    /// Decision code.
    pub reason: CsrReason,
    /// Detected or requested operation, when there was one.
    pub operation: Option<ScrollOperation>,
    /// Cost accounting, when the policy analysis ran.
    pub analysis: Option<SmartCsrAnalysis>,
}

impl CsrScrollResult {
    /// A rejection with nothing to write and nothing extra to redraw.
    #[must_use]
    pub fn none(reason: CsrReason) -> Self {
        Self {
            used_csr: false,
            sequences: Vec::new(),
            lines_to_redraw: Vec::new(),
            reason,
            operation: None,
            analysis: None,
        }
    }

    /// All sequences concatenated.
    #[must_use]
    pub fn joined(&self) -> String {
        self.sequences.concat()
    }

    /// Write every sequence to `w`, in order.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for seq in &self.sequences {
            w.write_all(seq.as_bytes())?;
        }
        Ok(())
    }

    /// Exact number of bytes [`write_to`](Self::write_to) emits.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.sequences.iter().map(String::len).sum()
    }
}

/// Emit the scroll plan for `op` using `strategy`.
fn plan_sequences(op: &ScrollOperation, strategy: ScrollStrategy) -> Vec<String> {
    let n = i32::from(op.lines());
    let top1 = op.top() + 1;
    let bottom1 = op.bottom();
    // First row of the n-row band at the bottom of the region, 1-indexed.
    let band1 = op.bottom() - op.lines() + 1;

    match (strategy, op.direction()) {
        (ScrollStrategy::Csr, direction) => {
            let (cursor_row, scroll) = match direction {
                ScrollDirection::Up => (bottom1, ansi::encode(|w| ansi::scroll_up(w, n))),
                ScrollDirection::Down => (top1, ansi::encode(|w| ansi::scroll_down(w, n))),
            };
            vec![
                ansi::encode(|w| ansi::set_scroll_region(w, top1, bottom1)),
                ansi::encode(|w| ansi::move_cursor(w, cursor_row, 1)),
                scroll,
                ansi::encode(ansi::reset_scroll_region),
            ]
        }
        (ScrollStrategy::InsertDelete, direction) => {
            let (delete_at, insert_at) = match direction {
                ScrollDirection::Up => (top1, band1),
                ScrollDirection::Down => (band1, top1),
            };
            vec![
                ansi::encode(|w| ansi::move_cursor(w, delete_at, 1)),
                ansi::encode(|w| ansi::delete_line(w, n)),
                ansi::encode(|w| ansi::move_cursor(w, insert_at, 1)),
                ansi::encode(|w| ansi::insert_line(w, n)),
            ]
        }
    }
}

/// Exposed rows, plus rows outside the region when the terminal blanks them.
///
/// Outside rows stop at `screen_rows`, the number of rows the caller holds.
fn base_redraw_rows(
    ctx: &CapabilityContext,
    op: &ScrollOperation,
    strategy: ScrollStrategy,
    screen_rows: u16,
) -> Vec<u16> {
    let mut rows: Vec<u16> = op.exposed_rows().collect();
    if strategy == ScrollStrategy::Csr && ctx.destroys_outside_content() {
        let end = ctx.height().min(screen_rows);
        rows.extend((0..op.top()).chain(op.bottom()..end));
    }
    rows
}

/// Plan for a known operation, gated by [`cost::can_use_csr`].
///
/// Uses DECSTBM only. Rejections carry the reason and an empty plan.
pub fn scroll_sequence(
    ctx: &CapabilityContext,
    top: i32,
    bottom: i32,
    lines: i32,
    direction: ScrollDirection,
) -> CsrScrollResult {
    let op = match cost::csr_admission(ctx, top, bottom, lines, direction) {
        Ok(op) => op,
        Err(reason) => {
            debug!(top, bottom, lines, reason = reason.as_str(), "scroll sequence rejected");
            return CsrScrollResult::none(reason);
        }
    };

    let mut lines_to_redraw = base_redraw_rows(ctx, &op, ScrollStrategy::Csr, ctx.height());
    lines_to_redraw.sort_unstable();
    lines_to_redraw.dedup();

    CsrScrollResult {
        used_csr: true,
        sequences: plan_sequences(&op, ScrollStrategy::Csr),
        lines_to_redraw,
        reason: CsrReason::CsrCheaper,
        operation: Some(op),
        analysis: None,
    }
}

/// Whether the first and last column of every region row is blank in `view`.
fn edges_clean<V: BufferView + ?Sized>(view: &V, top: u16, bottom: u16) -> bool {
    let width = view.width();
    if width == 0 {
        return true;
    }
    let right = width - 1;
    (top..bottom).all(|y| {
        [0, right]
            .into_iter()
            .all(|x| view.cell(x, y).is_none_or(|c| c.is_blank()))
    })
}

/// Stateless scroll optimizer configured by a [`SmartCsrConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmartCsr {
    config: SmartCsrConfig,
}

impl SmartCsr {
    /// Create an optimizer with the given admission policy.
    #[must_use]
    pub fn new(config: SmartCsrConfig) -> Self {
        Self { config }
    }

    /// The admission policy in use.
    #[must_use]
    #[inline]
    pub fn config(&self) -> &SmartCsrConfig {
        &self.config
    }

    /// Policy-driven admission decision for a known operation.
    pub fn analyze(
        &self,
        ctx: &CapabilityContext,
        op: &ScrollOperation,
        edges_clean: bool,
    ) -> SmartCsrAnalysis {
        cost::analyze_csr(ctx, &self.config, op, edges_clean)
    }

    /// Detect a scroll in `[top, bottom)` between `old` and `new` and plan it.
    ///
    /// Never fails: every way of not scrolling is reported through
    /// [`CsrScrollResult::reason`], and the caller falls back to a normal
    /// repaint of the region.
    pub fn scroll<V: BufferView + ?Sized>(
        &self,
        ctx: &CapabilityContext,
        old: &V,
        new: &V,
        top: u16,
        bottom: u16,
    ) -> CsrScrollResult {
        let span = debug_span!(
            "smart_csr",
            top,
            bottom,
            width = ctx.width(),
            height = ctx.height()
        );
        let _guard = span.enter();

        if !self.config.enabled {
            return CsrScrollResult::none(CsrReason::CsrDisabled);
        }
        let fallback_ok = self.config.allow_insert_delete && ctx.supports_insert_delete();
        if !ctx.supports_csr() && !fallback_ok {
            return CsrScrollResult::none(CsrReason::TerminalNoCsr);
        }
        if top >= bottom
            || bottom > ctx.height()
            || bottom > old.height()
            || bottom > new.height()
        {
            debug!(top, bottom, "region outside the screen");
            return CsrScrollResult::none(CsrReason::InvalidGeometry);
        }

        let mut scratch = Vec::with_capacity(usize::from(ctx.width()) * 4);
        let old_hashes = detect::hash_rows(old, top..bottom, &mut scratch);
        let new_hashes = detect::hash_rows(new, top..bottom, &mut scratch);

        if old_hashes == new_hashes {
            trace!("region unchanged");
            return CsrScrollResult::none(CsrReason::NoScrollDetected);
        }

        let height = bottom - top;
        let Some(op) = detect::detect_scroll_operation(&old_hashes, &new_hashes, 0, height)
            .and_then(|local| local.offset(top))
        else {
            trace!("no shift explains the change");
            return CsrScrollResult::none(CsrReason::NoScrollDetected);
        };

        // Edges only matter to the decision when the policy asks for them.
        let clean = !self.config.require_clean_sides
            || (edges_clean(old, top, bottom) && edges_clean(new, top, bottom));
        let analysis = self.analyze(ctx, &op, clean);
        debug!(
            direction = op.direction().as_str(),
            lines = op.lines(),
            reason = analysis.reason.as_str(),
            csr_cost = analysis.csr_cost,
            redraw_cost = analysis.redraw_cost,
            "scroll analyzed"
        );

        let strategy = match (analysis.use_csr, analysis.strategy) {
            (true, Some(strategy)) => strategy,
            _ => {
                return CsrScrollResult {
                    operation: Some(op),
                    analysis: Some(analysis),
                    ..CsrScrollResult::none(analysis.reason)
                };
            }
        };

        let mut lines_to_redraw = base_redraw_rows(ctx, &op, strategy, new.height());
        lines_to_redraw.extend(stale_rows(&op, top, &old_hashes, &new_hashes));
        lines_to_redraw.sort_unstable();
        lines_to_redraw.dedup();

        CsrScrollResult {
            used_csr: true,
            sequences: plan_sequences(&op, strategy),
            lines_to_redraw,
            reason: analysis.reason,
            operation: Some(op),
            analysis: Some(analysis),
        }
    }
}

/// Preserved rows whose new content is not the shifted old content.
///
/// Hashes are indexed from `base` (the region top).
fn stale_rows<'a>(
    op: &'a ScrollOperation,
    base: u16,
    old: &'a [LineHash],
    new: &'a [LineHash],
) -> impl Iterator<Item = u16> + 'a {
    op.preserved_rows()
        .filter(move |&(dst, src)| old[usize::from(src - base)] != new[usize::from(dst - base)])
        .map(|(dst, _)| dst)
}
