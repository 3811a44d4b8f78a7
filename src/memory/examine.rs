//! Examine memory panel
//!
//! Holds the address field and byte count of the memory view, issues
//! requests to a [`MemorySource`] and routes the returned bytes into the
//! dump renderer.

use tracing::{info, warn};

use super::address::{format_address, split_freeze};
use super::dump::{Capture, DumpError, DumpRenderer};
use super::source::{ByteSink, MemorySource};
use crate::config::{ExamineMemoryConfig, BYTE_CHOICES};
use crate::ui::StyledText;

/// Memory examine panel state
pub struct ExamineMemoryPanel {
    renderer: DumpRenderer,
    /// Address expression field
    address: String,
    /// Bytes requested per capture
    bytes: usize,
    /// Replace the address field by the resolved address on the next capture
    freeze_address: bool,
    enabled: bool,
}

impl ExamineMemoryPanel {
    pub fn new(config: &ExamineMemoryConfig) -> Self {
        Self {
            renderer: DumpRenderer::new(config.word_size()),
            address: String::new(),
            bytes: config.bytes(),
            freeze_address: false,
            enabled: true,
        }
    }

    pub fn view(&self) -> &StyledText {
        self.renderer.view()
    }

    pub fn renderer_mut(&mut self) -> &mut DumpRenderer {
        &mut self.renderer
    }

    pub fn base_address(&self) -> &str {
        &self.address
    }

    /// Edit the address field without issuing a request
    pub fn set_address_text(&mut self, text: &str) {
        self.address = text.to_string();
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Select a byte count. Only the offered choices are accepted.
    pub fn set_bytes(&mut self, bytes: usize) -> bool {
        if BYTE_CHOICES.contains(&bytes) {
            self.bytes = bytes;
            true
        } else {
            false
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Go button / Enter in the address field.
    ///
    /// Remembers the byte count in `settings`, handles a `#` freeze prefix and
    /// requests a fresh dump.
    pub fn go(&mut self, source: &mut dyn MemorySource, settings: &mut ExamineMemoryConfig) {
        settings.size_to_show = self.bytes;

        let (expression, freeze) = split_freeze(&self.address);
        self.address = expression;
        self.freeze_address = freeze;

        self.request(source);
    }

    /// Set the address field and request a dump there
    pub fn set_base_address(&mut self, address: &str, source: &mut dyn MemorySource) {
        self.address = address.to_string();
        self.request(source);
    }

    /// The debugger resumed: stop showing changes until the next capture
    pub fn on_debugger_continued(&mut self) {
        self.renderer.disable_highlighting();
    }

    /// Re-read memory at the current address
    pub fn request(&mut self, source: &mut dyn MemorySource) {
        info!("Examining {} bytes at {}", self.bytes, self.address);
        let expression = self.address.clone();

        self.renderer.clear();
        let mut sink = PanelSink {
            capture: self.renderer.begin_capture(),
            address: &mut self.address,
            freeze_address: &mut self.freeze_address,
        };
        if let Err(e) = source.examine(&expression, self.bytes, &mut sink) {
            warn!("Memory request at {} failed: {}", expression, e);
            sink.add_error(&e.to_string());
        }
    }
}

/// Capture plus the panel fields a capture may update
struct PanelSink<'a> {
    capture: Capture<'a>,
    address: &'a mut String,
    freeze_address: &'a mut bool,
}

impl ByteSink for PanelSink<'_> {
    fn feed(&mut self, address: &str, hex_byte: &str) -> Result<(), DumpError> {
        let first = self.capture.byte_count() == 0;
        self.capture.feed(address, hex_byte)?;

        if first && *self.freeze_address {
            *self.address = format_address(self.capture.row_address());
            *self.freeze_address = false;
        }
        Ok(())
    }

    fn add_error(&mut self, message: &str) {
        self.capture.add_error(message);
    }
}
