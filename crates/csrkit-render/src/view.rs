#![forbid(unsafe_code)]

//! Read-only view over a rendered cell buffer.
//!
//! The kernel never owns screen state. The renderer lends it two snapshots
//! through this trait for the duration of one analysis call.

use crate::cell::Cell;

/// A read-only screen snapshot.
pub trait BufferView {
    /// Width in columns.
    fn width(&self) -> u16;

    /// Height in rows.
    fn height(&self) -> u16;

    /// Cell at `(x, y)`, or `None` when out of bounds.
    fn cell(&self, x: u16, y: u16) -> Option<Cell>;

    /// Append the rendered bytes of row `y` (text plus style changes) to `out`.
    ///
    /// Two rows with equal content must render to equal bytes. Out-of-range
    /// rows append nothing.
    fn line_content(&self, y: u16, out: &mut Vec<u8>);
}

impl<T: BufferView + ?Sized> BufferView for &T {
    #[inline]
    fn width(&self) -> u16 {
        (**self).width()
    }

    #[inline]
    fn height(&self) -> u16 {
        (**self).height()
    }

    #[inline]
    fn cell(&self, x: u16, y: u16) -> Option<Cell> {
        (**self).cell(x, y)
    }

    #[inline]
    fn line_content(&self, y: u16, out: &mut Vec<u8>) {
        (**self).line_content(y, out);
    }
}
