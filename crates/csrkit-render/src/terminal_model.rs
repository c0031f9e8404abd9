#![forbid(unsafe_code)]

//! Terminal model for scroll plan validation.
//!
//! A minimal terminal emulator that understands the subset of ANSI
//! sequences the kernel and [`Buffer::line_content`](crate::buffer::Buffer)
//! emit, so a plan can be replayed and the resulting screen compared with
//! the snapshot it was meant to produce, without real terminal I/O.
//!
//! # Scope
//!
//! This is NOT a full VT emulator. It supports only:
//! - Cursor positioning (CUP)
//! - SGR (flags, default colors, basic and truecolor)
//! - Erase operations (EL, ED)
//! - Scroll margins (DECSTBM) and scrolling within them (SU, SD)
//! - Line insertion and deletion within the margins (IL, DL)
//!
//! Terminals that blank rows outside the margins while scrolling are
//! modelled with [`TerminalModel::with_destructive_scroll`].
//!
//! # Usage
//!
//! ```
//! use csrkit_render::terminal_model::TerminalModel;
//!
//! let mut model = TerminalModel::new(10, 4);
//! model.process(b"one\x1b[2;1Htwo\x1b[3;1Hthree");
//! model.process(b"\x1b[1;3r\x1b[S\x1b[r");
//! assert_eq!(model.row_text(0).as_deref(), Some("two"));
//! assert_eq!(model.row_text(1).as_deref(), Some("three"));
//! assert_eq!(model.row_text(2).as_deref(), Some(""));
//! ```

use unicode_width::UnicodeWidthChar;

use crate::cell::{Cell, PackedRgba, StyleFlags};
use crate::view::BufferView;

/// Current SGR (style) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgrState {
    pub fg: PackedRgba,
    pub bg: PackedRgba,
    pub flags: StyleFlags,
}

impl Default for SgrState {
    fn default() -> Self {
        Self {
            fg: PackedRgba::WHITE,
            bg: PackedRgba::TRANSPARENT,
            flags: StyleFlags::empty(),
        }
    }
}

impl SgrState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Ground,
    Escape,
    CsiEntry,
    CsiParam,
}

/// A minimal terminal model for testing scroll plans.
#[derive(Debug, Clone)]
pub struct TerminalModel {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    cursor_x: usize,
    cursor_y: usize,
    sgr: SgrState,
    /// Scroll margins, 0-indexed, bottom exclusive.
    margin_top: usize,
    margin_bottom: usize,
    destructive_scroll: bool,
    parse_state: ParseState,
    csi_params: Vec<u32>,
    csi_intermediate: Vec<u8>,
    /// Pending bytes of a multi-byte UTF-8 character.
    utf8: Vec<u8>,
    utf8_len: usize,
}

impl TerminalModel {
    /// Create a blank model. Zero dimensions are raised to 1.
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![Cell::default(); width * height],
            cursor_x: 0,
            cursor_y: 0,
            sgr: SgrState::default(),
            margin_top: 0,
            margin_bottom: height,
            destructive_scroll: false,
            parse_state: ParseState::Ground,
            csi_params: Vec::with_capacity(16),
            csi_intermediate: Vec::with_capacity(4),
            utf8: Vec::with_capacity(4),
            utf8_len: 0,
        }
    }

    /// Blank every row outside the margins whenever SU or SD runs with a
    /// partial region, as some console drivers do.
    #[must_use]
    pub fn with_destructive_scroll(mut self, destructive: bool) -> Self {
        self.destructive_scroll = destructive;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Cursor position as (x, y).
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_x, self.cursor_y)
    }

    pub fn sgr_state(&self) -> &SgrState {
        &self.sgr
    }

    /// Current scroll margins as a 0-indexed, bottom-exclusive row range.
    pub fn scroll_region(&self) -> (usize, usize) {
        (self.margin_top, self.margin_bottom)
    }

    /// Get the cell at (x, y). Returns None if out of bounds.
    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        if x < self.width && y < self.height {
            Some(&self.cells[y * self.width + x])
        } else {
            None
        }
    }

    fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        if x < self.width && y < self.height {
            Some(&mut self.cells[y * self.width + x])
        } else {
            None
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn row(&self, y: usize) -> Option<&[Cell]> {
        if y < self.height {
            let start = y * self.width;
            Some(&self.cells[start..start + self.width])
        } else {
            None
        }
    }

    /// Text content of a row, trailing spaces trimmed.
    pub fn row_text(&self, y: usize) -> Option<String> {
        self.row(y).map(|cells| {
            let s: String = cells.iter().map(|c| c.ch).collect();
            s.trim_end().to_string()
        })
    }

    /// Process a byte sequence, updating the terminal state.
    pub fn process(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.process_byte(b);
        }
    }

    fn process_byte(&mut self, b: u8) {
        match self.parse_state {
            ParseState::Ground => self.ground_state(b),
            ParseState::Escape => self.escape_state(b),
            ParseState::CsiEntry => self.csi_entry_state(b),
            ParseState::CsiParam => self.csi_param_state(b),
        }
    }

    fn ground_state(&mut self, b: u8) {
        if self.utf8_len > 0 {
            self.continue_utf8(b);
            return;
        }
        match b {
            0x1B => self.parse_state = ParseState::Escape,
            0x00..=0x1A | 0x1C..=0x1F => self.handle_c0(b),
            0x20..=0x7E => self.put_char(b as char),
            0xC0..=0xDF => self.begin_utf8(b, 2),
            0xE0..=0xEF => self.begin_utf8(b, 3),
            0xF0..=0xF7 => self.begin_utf8(b, 4),
            // DEL and stray continuation bytes
            _ => {}
        }
    }

    fn begin_utf8(&mut self, b: u8, len: usize) {
        self.utf8.clear();
        self.utf8.push(b);
        self.utf8_len = len;
    }

    fn continue_utf8(&mut self, b: u8) {
        if b & 0xC0 != 0x80 {
            // Truncated sequence: drop it and reprocess this byte.
            self.utf8_len = 0;
            self.utf8.clear();
            self.ground_state(b);
            return;
        }
        self.utf8.push(b);
        if self.utf8.len() == self.utf8_len {
            let ch = std::str::from_utf8(&self.utf8)
                .ok()
                .and_then(|s| s.chars().next())
                .unwrap_or(char::REPLACEMENT_CHARACTER);
            self.utf8_len = 0;
            self.utf8.clear();
            self.put_char(ch);
        }
    }

    fn escape_state(&mut self, b: u8) {
        match b {
            b'[' => {
                self.csi_params.clear();
                self.csi_intermediate.clear();
                self.parse_state = ParseState::CsiEntry;
            }
            0x1B => {
                // ESC ESC: stay in escape
            }
            _ => self.parse_state = ParseState::Ground,
        }
    }

    fn csi_entry_state(&mut self, b: u8) {
        match b {
            b'0'..=b'9' => {
                self.csi_params.push(u32::from(b - b'0'));
                self.parse_state = ParseState::CsiParam;
            }
            b';' => {
                // Empty first parameter, then the one after the separator.
                self.csi_params.push(0);
                self.csi_params.push(0);
                self.parse_state = ParseState::CsiParam;
            }
            b'?' | b'>' | b'!' => {
                self.csi_intermediate.push(b);
                self.parse_state = ParseState::CsiParam;
            }
            0x40..=0x7E => {
                self.execute_csi(b);
                self.parse_state = ParseState::Ground;
            }
            _ => self.parse_state = ParseState::Ground,
        }
    }

    fn csi_param_state(&mut self, b: u8) {
        match b {
            b'0'..=b'9' => {
                if self.csi_params.is_empty() {
                    self.csi_params.push(0);
                }
                if let Some(last) = self.csi_params.last_mut() {
                    *last = last.saturating_mul(10).saturating_add(u32::from(b - b'0'));
                }
            }
            b';' | b':' => self.csi_params.push(0),
            0x20..=0x2F => self.csi_intermediate.push(b),
            0x40..=0x7E => {
                self.execute_csi(b);
                self.parse_state = ParseState::Ground;
            }
            _ => self.parse_state = ParseState::Ground,
        }
    }

    fn handle_c0(&mut self, b: u8) {
        match b {
            0x08 => self.cursor_x = self.cursor_x.saturating_sub(1),
            0x0A => {
                if self.cursor_y + 1 == self.margin_bottom {
                    self.scroll_region_up(1);
                } else if self.cursor_y + 1 < self.height {
                    self.cursor_y += 1;
                }
            }
            0x0D => self.cursor_x = 0,
            _ => {}
        }
    }

    fn put_char(&mut self, ch: char) {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width == 0 {
            return;
        }
        let sgr = self.sgr;
        let (x, y) = (self.cursor_x, self.cursor_y);
        if let Some(cell) = self.cell_mut(x, y) {
            *cell = Cell {
                ch,
                fg: sgr.fg,
                bg: sgr.bg,
                flags: sgr.flags,
            };
        }
        if width == 2
            && let Some(next) = self.cell_mut(x + 1, y)
        {
            *next = Cell {
                ch: ' ',
                fg: sgr.fg,
                bg: sgr.bg,
                flags: StyleFlags::empty(),
            };
        }

        self.cursor_x += width;
        if self.cursor_x >= self.width {
            self.cursor_x = 0;
            if self.cursor_y + 1 < self.height {
                self.cursor_y += 1;
            }
        }
    }

    /// First parameter as a count: missing or zero means 1.
    fn count_param(&self) -> usize {
        self.csi_params.first().copied().unwrap_or(1).max(1) as usize
    }

    fn execute_csi(&mut self, final_byte: u8) {
        if !self.csi_intermediate.is_empty() {
            // Private modes are not modelled.
            return;
        }
        match final_byte {
            b'H' | b'f' => self.csi_cup(),
            b'J' => self.csi_ed(),
            b'K' => self.csi_el(),
            b'm' => self.csi_sgr(),
            b'r' => self.csi_decstbm(),
            b'S' => self.scroll_region_up(self.count_param()),
            b'T' => self.scroll_region_down(self.count_param()),
            b'L' => self.csi_il(),
            b'M' => self.csi_dl(),
            _ => {}
        }
    }

    fn csi_cup(&mut self) {
        let row = self.csi_params.first().copied().unwrap_or(1).max(1) as usize;
        let col = self.csi_params.get(1).copied().unwrap_or(1).max(1) as usize;
        self.cursor_y = (row - 1).min(self.height - 1);
        self.cursor_x = (col - 1).min(self.width - 1);
    }

    fn csi_decstbm(&mut self) {
        let top = self.csi_params.first().copied().unwrap_or(0).max(1) as usize;
        let bottom = match self.csi_params.get(1).copied().unwrap_or(0) {
            0 => self.height,
            b => b as usize,
        };
        // Invalid margins are ignored, like a real terminal.
        if top < bottom && bottom <= self.height {
            self.margin_top = top - 1;
            self.margin_bottom = bottom;
            self.cursor_x = 0;
            self.cursor_y = 0;
        }
    }

    fn csi_ed(&mut self) {
        let (x, y) = (self.cursor_x, self.cursor_y);
        match self.csi_params.first().copied().unwrap_or(0) {
            0 => {
                self.erase_span(y, x, self.width);
                self.erase_rows(y + 1, self.height);
            }
            1 => {
                self.erase_rows(0, y);
                self.erase_span(y, 0, x + 1);
            }
            2 | 3 => self.erase_rows(0, self.height),
            _ => {}
        }
    }

    fn csi_el(&mut self) {
        let (x, y) = (self.cursor_x, self.cursor_y);
        match self.csi_params.first().copied().unwrap_or(0) {
            0 => self.erase_span(y, x, self.width),
            1 => self.erase_span(y, 0, x + 1),
            2 => self.erase_span(y, 0, self.width),
            _ => {}
        }
    }

    /// Blank cell carrying the current background.
    fn blank(&self) -> Cell {
        Cell::default().with_bg(self.sgr.bg)
    }

    fn erase_span(&mut self, y: usize, from: usize, to: usize) {
        if y >= self.height {
            return;
        }
        let blank = self.blank();
        let start = y * self.width;
        let to = to.min(self.width);
        if from < to {
            self.cells[start + from..start + to].fill(blank);
        }
    }

    fn erase_rows(&mut self, from: usize, to: usize) {
        let to = to.min(self.height);
        if from < to {
            let blank = self.blank();
            self.cells[from * self.width..to * self.width].fill(blank);
        }
    }

    /// Move rows `[start + n, end)` to `start` and blank the last `n` rows.
    fn shift_up(&mut self, start: usize, end: usize, n: usize) {
        let n = n.min(end - start);
        let w = self.width;
        self.cells.copy_within((start + n) * w..end * w, start * w);
        self.erase_rows(end - n, end);
    }

    /// Move rows `[start, end - n)` to `start + n` and blank the first `n` rows.
    fn shift_down(&mut self, start: usize, end: usize, n: usize) {
        let n = n.min(end - start);
        let w = self.width;
        self.cells.copy_within(start * w..(end - n) * w, (start + n) * w);
        self.erase_rows(start, start + n);
    }

    fn blank_outside_margins(&mut self) {
        if self.destructive_scroll {
            let (top, bottom) = (self.margin_top, self.margin_bottom);
            self.erase_rows(0, top);
            self.erase_rows(bottom, self.height);
        }
    }

    fn scroll_region_up(&mut self, n: usize) {
        self.shift_up(self.margin_top, self.margin_bottom, n);
        self.blank_outside_margins();
    }

    fn scroll_region_down(&mut self, n: usize) {
        self.shift_down(self.margin_top, self.margin_bottom, n);
        self.blank_outside_margins();
    }

    fn cursor_in_margins(&self) -> bool {
        (self.margin_top..self.margin_bottom).contains(&self.cursor_y)
    }

    fn csi_il(&mut self) {
        if self.cursor_in_margins() {
            self.shift_down(self.cursor_y, self.margin_bottom, self.count_param());
            self.cursor_x = 0;
        }
    }

    fn csi_dl(&mut self) {
        if self.cursor_in_margins() {
            self.shift_up(self.cursor_y, self.margin_bottom, self.count_param());
            self.cursor_x = 0;
        }
    }

    fn csi_sgr(&mut self) {
        if self.csi_params.is_empty() {
            self.sgr.reset();
            return;
        }

        let mut i = 0;
        while i < self.csi_params.len() {
            let code = self.csi_params[i];
            match code {
                0 => self.sgr.reset(),
                1 => self.sgr.flags.insert(StyleFlags::BOLD),
                2 => self.sgr.flags.insert(StyleFlags::DIM),
                3 => self.sgr.flags.insert(StyleFlags::ITALIC),
                4 => self.sgr.flags.insert(StyleFlags::UNDERLINE),
                5 => self.sgr.flags.insert(StyleFlags::BLINK),
                7 => self.sgr.flags.insert(StyleFlags::REVERSE),
                8 => self.sgr.flags.insert(StyleFlags::HIDDEN),
                9 => self.sgr.flags.insert(StyleFlags::STRIKETHROUGH),
                21 | 22 => self.sgr.flags.remove(StyleFlags::BOLD | StyleFlags::DIM),
                23 => self.sgr.flags.remove(StyleFlags::ITALIC),
                24 => self.sgr.flags.remove(StyleFlags::UNDERLINE),
                25 => self.sgr.flags.remove(StyleFlags::BLINK),
                27 => self.sgr.flags.remove(StyleFlags::REVERSE),
                28 => self.sgr.flags.remove(StyleFlags::HIDDEN),
                29 => self.sgr.flags.remove(StyleFlags::STRIKETHROUGH),
                30..=37 => self.sgr.fg = Self::basic_color(code - 30),
                39 => self.sgr.fg = PackedRgba::WHITE,
                40..=47 => self.sgr.bg = Self::basic_color(code - 40),
                49 => self.sgr.bg = PackedRgba::TRANSPARENT,
                38 => {
                    if let Some(color) = self.parse_rgb(&mut i) {
                        self.sgr.fg = color;
                    }
                }
                48 => {
                    if let Some(color) = self.parse_rgb(&mut i) {
                        self.sgr.bg = color;
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// `38;2;r;g;b` / `48;2;r;g;b`. Other extended forms are skipped.
    fn parse_rgb(&self, i: &mut usize) -> Option<PackedRgba> {
        if *self.csi_params.get(*i + 1)? != 2 {
            return None;
        }
        let channel = |k: usize| self.csi_params.get(*i + k).map(|&v| v.min(255) as u8);
        let (r, g, b) = (channel(2)?, channel(3)?, channel(4)?);
        *i += 4;
        Some(PackedRgba::rgb(r, g, b))
    }

    fn basic_color(idx: u32) -> PackedRgba {
        match idx {
            0 => PackedRgba::rgb(0, 0, 0),
            1 => PackedRgba::rgb(128, 0, 0),
            2 => PackedRgba::rgb(0, 128, 0),
            3 => PackedRgba::rgb(128, 128, 0),
            4 => PackedRgba::rgb(0, 0, 128),
            5 => PackedRgba::rgb(128, 0, 128),
            6 => PackedRgba::rgb(0, 128, 128),
            7 => PackedRgba::rgb(192, 192, 192),
            _ => PackedRgba::WHITE,
        }
    }

    /// Paint every row of `view` at its own position, leaving SGR reset.
    pub fn paint<V: BufferView + ?Sized>(&mut self, view: &V) {
        let rows: Vec<u16> = (0..view.height()).collect();
        self.paint_rows(view, &rows);
    }

    /// Repaint the given rows of `view` the way a presenter would:
    /// cursor to column 1 of the row, then the row's rendered content.
    pub fn paint_rows<V: BufferView + ?Sized>(&mut self, view: &V, rows: &[u16]) {
        let mut bytes = Vec::new();
        for &y in rows {
            bytes.clear();
            bytes.extend_from_slice(format!("\x1b[{};1H", u32::from(y) + 1).as_bytes());
            view.line_content(y, &mut bytes);
            self.process(&bytes);
        }
    }

    /// Compare the grid with `expected` cell by cell.
    ///
    /// Returns a description of every differing cell, or `None` when equal.
    pub fn diff_view<V: BufferView + ?Sized>(&self, expected: &V) -> Option<String> {
        if usize::from(expected.width()) != self.width
            || usize::from(expected.height()) != self.height
        {
            return Some(format!(
                "size mismatch: model {}x{}, expected {}x{}",
                self.width,
                self.height,
                expected.width(),
                expected.height()
            ));
        }

        let mut diffs = Vec::new();
        for y in 0..expected.height() {
            for x in 0..expected.width() {
                let want = expected.cell(x, y);
                let got = self.cell(usize::from(x), usize::from(y)).copied();
                if got != want {
                    diffs.push(format!("  ({x}, {y}): got {got:?}, expected {want:?}"));
                }
            }
        }

        if diffs.is_empty() {
            None
        } else {
            Some(format!("grid differences:\n{}", diffs.join("\n")))
        }
    }

    /// Escape sequences in a human-readable form, for test failure messages.
    pub fn dump_sequences(bytes: &[u8]) -> String {
        let mut output = String::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == 0x1B && bytes.get(i + 1) == Some(&b'[') {
                output.push_str("\\e[");
                i += 2;
                while i < bytes.len() && !(0x40..=0x7E).contains(&bytes[i]) {
                    output.push(bytes[i] as char);
                    i += 1;
                }
                if i < bytes.len() {
                    output.push(bytes[i] as char);
                    i += 1;
                }
            } else if bytes[i] == 0x1B {
                output.push_str("\\e");
                i += 1;
            } else if bytes[i] < 0x20 {
                output.push_str(&format!("\\x{:02x}", bytes[i]));
                i += 1;
            } else {
                output.push(bytes[i] as char);
                i += 1;
            }
        }
        output
    }
}
