//! Hex/ASCII dump renderer with change highlighting
//!
//! Bytes arrive one at a time from a memory read. Every 16 bytes form a row:
//!
//! ```text
//! 0x1000: 41 41 41 41 41 41 41 41|41 41 41 41 41 41 41 41    AAAAAAAAAAAAAAAA
//!         |<----------- 48 hex columns ------------>|   |<---- ASCII ---->|
//! ```
//!
//! The renderer remembers the last value seen at every address. A byte that
//! differs from its remembered value paints its whole aligned word in the
//! changed style.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use thiserror::Error;
use tracing::{debug, warn};

use super::address::{format_address, parse_address, parse_hex_byte};
use super::source::ByteSink;
use crate::ui::{Style, StyledText};

/// Bytes per row
pub const ROW_BYTES: usize = 16;
/// Columns of a row after the address label
pub const LINE_WIDTH: usize = 67;
/// Divider between the two groups of eight hex bytes
const DIVIDER_COLUMN: usize = 23;
/// First ASCII column
const ASCII_COLUMN: usize = 51;
/// End of the hex area
const HEX_END: usize = ROW_BYTES * 3;

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),

    #[error("Invalid byte value: {0:?}")]
    InvalidByte(String),

    #[error("{0}")]
    Debugger(String),
}

/// Highlight granularity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WordSize {
    One = 1,
    Two = 2,
    #[default]
    Four = 4,
    Eight = 8,
}

impl WordSize {
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// Offsets of the aligned word containing `offset`, clipped to the row
    pub fn span(self, offset: usize) -> std::ops::Range<usize> {
        let size = self.bytes();
        let start = (offset / size) * size;
        start..(start + size).min(ROW_BYTES)
    }
}

impl TryFrom<u32> for WordSize {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(WordSize::One),
            2 => Ok(WordSize::Two),
            4 => Ok(WordSize::Four),
            8 => Ok(WordSize::Eight),
            other => Err(other),
        }
    }
}

/// Incremental dump renderer
pub struct DumpRenderer {
    /// Rendered rows
    view: StyledText,
    /// Last value seen per address; survives clear()
    previous: HashMap<u64, u8>,
    /// Columns of the row being filled
    line: [char; LINE_WIDTH],
    /// Changed flags for the row being filled
    changed: [bool; ROW_BYTES],
    /// Bytes consumed since the last clear()
    byte_counter: u64,
    /// Address of the row being filled
    row_address: u64,
    highlight: bool,
    word_size: WordSize,
}

impl Default for DumpRenderer {
    fn default() -> Self {
        Self::new(WordSize::default())
    }
}

impl DumpRenderer {
    pub fn new(word_size: WordSize) -> Self {
        Self {
            view: StyledText::new(),
            previous: HashMap::new(),
            line: [' '; LINE_WIDTH],
            changed: [false; ROW_BYTES],
            byte_counter: 0,
            row_address: 0,
            highlight: true,
            word_size,
        }
    }

    pub fn view(&self) -> &StyledText {
        &self.view
    }

    pub fn word_size(&self) -> WordSize {
        self.word_size
    }

    pub fn set_word_size(&mut self, word_size: WordSize) {
        self.word_size = word_size;
    }

    pub fn highlighting(&self) -> bool {
        self.highlight
    }

    /// Bytes fed since the last clear
    pub fn byte_count(&self) -> u64 {
        self.byte_counter
    }

    /// Address labelling the row currently being filled
    pub fn row_address(&self) -> u64 {
        self.row_address
    }

    /// Reset the view and row state. Change history is kept so the next
    /// capture still diffs against it; an unflushed partial row is dropped.
    pub fn clear(&mut self) {
        self.view.clear();
        self.row_address = 0;
        self.byte_counter = 0;
        self.line = [' '; LINE_WIDTH];
    }

    /// Start a batch of feeds. The view stays frozen until the returned
    /// guard is dropped.
    pub fn begin_capture(&mut self) -> Capture<'_> {
        self.view.freeze();
        self.highlight = true;
        self.changed = [false; ROW_BYTES];
        debug!("Memory capture started");
        Capture { renderer: self }
    }

    fn end_capture(&mut self) {
        self.view.thaw();
        debug!("Memory capture ended after {} bytes", self.byte_counter);
    }

    /// Stop showing changes until the next capture. Values are still tracked.
    pub fn disable_highlighting(&mut self) {
        self.highlight = false;
    }

    /// Append a line outside the row layout
    pub fn add_error(&mut self, message: &str) {
        self.view.append(Style::Default, message);
        self.view.append(Style::Default, "\n");
    }

    /// Consume one byte reported at `address`
    pub fn feed(&mut self, address: &str, hex_byte: &str) -> Result<(), DumpError> {
        let value = parse_hex_byte(hex_byte).map_err(|e| {
            warn!("Rejected byte {:?} at {}", hex_byte, address);
            e
        })?;
        let bcmod = (self.byte_counter % ROW_BYTES as u64) as usize;

        if bcmod == 0 {
            // First byte of a row labels it
            let row_address = parse_address(address).map_err(|e| {
                warn!("Rejected row address {:?}", address);
                e
            })?;
            self.changed = [false; ROW_BYTES];
            self.row_address = row_address;
        }

        let byte_address = self.row_address.wrapping_add(bcmod as u64);
        let changed = matches!(self.previous.insert(byte_address, value), Some(old) if old != value);

        if changed && self.highlight {
            for offset in self.word_size.span(bcmod) {
                self.changed[offset] = true;
            }
        }

        let hex = format!("{:02x}", value);
        let mut digits = hex.chars();
        self.line[bcmod * 3] = digits.next().unwrap_or('0');
        self.line[bcmod * 3 + 1] = digits.next().unwrap_or('0');
        self.line[ASCII_COLUMN + bcmod] = printable(value);

        self.byte_counter += 1;
        if self.byte_counter % ROW_BYTES as u64 == 0 {
            self.flush_row();
        }
        Ok(())
    }

    fn flush_row(&mut self) {
        if self.byte_counter != ROW_BYTES as u64 {
            self.view.append(Style::Default, "\n");
        }
        self.line[DIVIDER_COLUMN] = '|';

        let label = format!("{}: ", format_address(self.row_address));
        self.view.append(Style::Default, &label);

        let line = self.line;
        let mut buf = [0u8; 4];
        for (column, ch) in line.iter().enumerate() {
            let style = if self.highlight && self.column_changed(column) {
                Style::Changed
            } else {
                Style::Default
            };
            self.view.append(style, ch.encode_utf8(&mut buf));
        }

        self.line = [' '; LINE_WIDTH];
        self.row_address = self.row_address.wrapping_add(ROW_BYTES as u64);
    }

    /// Whether a row column belongs to a changed byte. Separators never do.
    fn column_changed(&self, column: usize) -> bool {
        if column < HEX_END {
            column % 3 != 2 && self.changed[column / 3]
        } else if column >= ASCII_COLUMN {
            self.changed[column - ASCII_COLUMN]
        } else {
            false
        }
    }
}

/// Open capture; dropping it unfreezes the view on every exit path
pub struct Capture<'a> {
    renderer: &'a mut DumpRenderer,
}

impl Deref for Capture<'_> {
    type Target = DumpRenderer;

    fn deref(&self) -> &DumpRenderer {
        &*self.renderer
    }
}

impl DerefMut for Capture<'_> {
    fn deref_mut(&mut self) -> &mut DumpRenderer {
        &mut *self.renderer
    }
}

impl Drop for Capture<'_> {
    fn drop(&mut self) {
        self.renderer.end_capture();
    }
}

impl ByteSink for Capture<'_> {
    fn feed(&mut self, address: &str, hex_byte: &str) -> Result<(), DumpError> {
        self.renderer.feed(address, hex_byte)
    }

    fn add_error(&mut self, message: &str) {
        self.renderer.add_error(message);
    }
}

fn printable(value: u8) -> char {
    if (0x20..0x7f).contains(&value) {
        value as char
    } else {
        '.'
    }
}
