#![forbid(unsafe_code)]

//! Cell types.
//!
//! A [`Cell`] is one resolved grid position as handed over by the higher
//! layers: a character, two colors and style flags. Colors are already
//! blended; the kernel only compares and serializes them.

/// A compact RGBA color.
///
/// - **Layout:** `0xRRGGBBAA` (R in bits 31..24, A in bits 7..0).
/// - Alpha 0 means "terminal default", which is how SGR 39/49 round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct PackedRgba(pub u32);

impl PackedRgba {
    /// Fully transparent (alpha = 0), rendered as the terminal default.
    pub const TRANSPARENT: Self = Self(0);
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Create an opaque RGB color.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Create an RGBA color.
    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8) | a as u32)
    }

    #[inline]
    pub const fn r(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline]
    pub const fn g(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub const fn b(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub const fn a(self) -> u8 {
        self.0 as u8
    }
}

bitflags::bitflags! {
    /// 8-bit cell style flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleFlags: u8 {
        /// Bold / increased intensity.
        const BOLD          = 0b0000_0001;
        /// Dim / decreased intensity.
        const DIM           = 0b0000_0010;
        /// Italic text.
        const ITALIC        = 0b0000_0100;
        /// Underlined text.
        const UNDERLINE     = 0b0000_1000;
        /// Blinking text.
        const BLINK         = 0b0001_0000;
        /// Reverse video (swap fg/bg).
        const REVERSE       = 0b0010_0000;
        /// Strikethrough text.
        const STRIKETHROUGH = 0b0100_0000;
        /// Hidden / invisible text.
        const HIDDEN        = 0b1000_0000;
    }
}

impl StyleFlags {
    /// Flags that paint something even on a space character.
    pub const VISIBLE_ON_BLANK: Self = Self::UNDERLINE
        .union(Self::REVERSE)
        .union(Self::STRIKETHROUGH);
}

/// One grid cell: character, colors, style.
///
/// The default cell is a space with white foreground, transparent
/// (terminal default) background and no style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Character content.
    pub ch: char,
    /// Foreground color.
    pub fg: PackedRgba,
    /// Background color.
    pub bg: PackedRgba,
    /// Style flags.
    pub flags: StyleFlags,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: PackedRgba::WHITE,
            bg: PackedRgba::TRANSPARENT,
            flags: StyleFlags::empty(),
        }
    }
}

impl Cell {
    /// Create a cell from a single character with default style.
    #[inline]
    pub fn from_char(ch: char) -> Self {
        Self {
            ch,
            ..Self::default()
        }
    }

    #[inline]
    pub const fn with_fg(mut self, fg: PackedRgba) -> Self {
        self.fg = fg;
        self
    }

    #[inline]
    pub const fn with_bg(mut self, bg: PackedRgba) -> Self {
        self.bg = bg;
        self
    }

    #[inline]
    pub const fn with_flags(mut self, flags: StyleFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether the cell shows nothing: a space on the default background
    /// with no style that paints blanks.
    ///
    /// The foreground color is irrelevant for a space.
    #[inline]
    pub fn is_blank(&self) -> bool {
        self.ch == ' ' && self.bg.a() == 0 && !self.flags.intersects(StyleFlags::VISIBLE_ON_BLANK)
    }

    /// Whether fg, bg and flags match (content ignored).
    #[inline]
    pub fn same_style(&self, other: &Self) -> bool {
        self.fg == other.fg && self.bg == other.bg && self.flags == other.flags
    }
}
