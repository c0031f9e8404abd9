#![forbid(unsafe_code)]

//! ANSI escape sequence generation helpers.
//!
//! Pure byte writers for the scroll-related subset of ECMA-48 / DEC
//! sequences, plus the SGR subset used to render line content. No state
//! tracking and no validation: row and column arguments are 1-indexed and
//! taken as given.
//!
//! # Sequence Reference
//!
//! | Category | Sequence | Description |
//! |----------|----------|-------------|
//! | CSI | `ESC [ top ; bottom r` | DECSTBM (Set Scroll Region, inclusive) |
//! | CSI | `ESC [ r` | DECSTBM reset (full screen) |
//! | CSI | `ESC [ n S` | SU (Scroll Up) |
//! | CSI | `ESC [ n T` | SD (Scroll Down) |
//! | CSI | `ESC [ n L` | IL (Insert Line) |
//! | CSI | `ESC [ n M` | DL (Delete Line) |
//! | CSI | `ESC [ row ; col H` | CUP (Cursor Position) |
//! | CSI | `ESC [ n m` | SGR (Select Graphic Rendition) |
//!
//! Counted sequences omit the count when it is 1 and emit nothing at all
//! when it is zero or negative, so plans can be built by concatenation.

use std::io::{self, Write};

use crate::cell::{PackedRgba, StyleFlags};

// =============================================================================
// Scroll Region
// =============================================================================

/// Reset scroll region to full screen: `CSI r`
pub const RESET_SCROLL_REGION: &[u8] = b"\x1b[r";

/// DECSTBM: `CSI top ; bottom r`, both 1-indexed and inclusive.
#[inline]
pub fn set_scroll_region<W: Write>(w: &mut W, top: u16, bottom: u16) -> io::Result<()> {
    write!(w, "\x1b[{top};{bottom}r")
}

/// Write reset scroll region.
#[inline]
pub fn reset_scroll_region<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(RESET_SCROLL_REGION)
}

// =============================================================================
// Scrolling and Line Editing
// =============================================================================

#[inline]
fn counted<W: Write>(w: &mut W, n: i32, single: &[u8], final_byte: char) -> io::Result<()> {
    match n {
        i32::MIN..=0 => Ok(()),
        1 => w.write_all(single),
        _ => write!(w, "\x1b[{n}{final_byte}"),
    }
}

/// SU (Scroll Up): `CSI n S`
pub fn scroll_up<W: Write>(w: &mut W, n: i32) -> io::Result<()> {
    counted(w, n, b"\x1b[S", 'S')
}

/// SD (Scroll Down): `CSI n T`
pub fn scroll_down<W: Write>(w: &mut W, n: i32) -> io::Result<()> {
    counted(w, n, b"\x1b[T", 'T')
}

/// IL (Insert Line): `CSI n L`
pub fn insert_line<W: Write>(w: &mut W, n: i32) -> io::Result<()> {
    counted(w, n, b"\x1b[L", 'L')
}

/// DL (Delete Line): `CSI n M`
pub fn delete_line<W: Write>(w: &mut W, n: i32) -> io::Result<()> {
    counted(w, n, b"\x1b[M", 'M')
}

// =============================================================================
// Cursor Positioning
// =============================================================================

/// CUP (Cursor Position): `CSI row ; col H`, 1-indexed.
#[inline]
pub fn move_cursor<W: Write>(w: &mut W, row: u16, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{row};{col}H")
}

// =============================================================================
// SGR (line content rendering)
// =============================================================================

/// SGR reset: `CSI 0 m`
pub const SGR_RESET: &[u8] = b"\x1b[0m";

/// Write SGR reset sequence.
#[inline]
pub fn sgr_reset<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SGR_RESET)
}

/// Ordered table of (flag, SGR on code).
const FLAG_CODES: [(StyleFlags, u8); 8] = [
    (StyleFlags::BOLD, 1),
    (StyleFlags::DIM, 2),
    (StyleFlags::ITALIC, 3),
    (StyleFlags::UNDERLINE, 4),
    (StyleFlags::BLINK, 5),
    (StyleFlags::REVERSE, 7),
    (StyleFlags::HIDDEN, 8),
    (StyleFlags::STRIKETHROUGH, 9),
];

/// Write one `CSI n ; n ; ... m` enabling every set flag.
///
/// Emits nothing for an empty set. Does not reset first.
pub fn sgr_flags<W: Write>(w: &mut W, flags: StyleFlags) -> io::Result<()> {
    if flags.is_empty() {
        return Ok(());
    }
    w.write_all(b"\x1b[")?;
    let mut first = true;
    for (flag, code) in FLAG_CODES {
        if flags.contains(flag) {
            if !first {
                w.write_all(b";")?;
            }
            write!(w, "{code}")?;
            first = false;
        }
    }
    w.write_all(b"m")
}

/// Foreground color: `CSI 38;2;r;g;b m`, or `CSI 39 m` when transparent.
pub fn sgr_fg<W: Write>(w: &mut W, color: PackedRgba) -> io::Result<()> {
    if color.a() == 0 {
        return w.write_all(b"\x1b[39m");
    }
    write!(w, "\x1b[38;2;{};{};{}m", color.r(), color.g(), color.b())
}

/// Background color: `CSI 48;2;r;g;b m`, or `CSI 49 m` when transparent.
pub fn sgr_bg<W: Write>(w: &mut W, color: PackedRgba) -> io::Result<()> {
    if color.a() == 0 {
        return w.write_all(b"\x1b[49m");
    }
    write!(w, "\x1b[48;2;{};{};{}m", color.r(), color.g(), color.b())
}

// =============================================================================
// Owned encoding
// =============================================================================

/// Run a writer against a scratch buffer and return the bytes as a `String`.
///
/// Every sequence in this module is ASCII, so the conversion is lossless.
pub fn encode<F>(f: F) -> String
where
    F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
{
    let mut buf = Vec::with_capacity(16);
    // Writes into a Vec cannot fail.
    let _ = f(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}
