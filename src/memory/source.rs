//! Memory sources
//!
//! A memory source plays the debugger's part: it evaluates an address
//! expression and reports the bytes found there, in increasing address
//! order, to a [`ByteSink`].

use super::address::{format_address, parse_address};
use super::dump::DumpError;

/// Receiver of a capture session's bytes
pub trait ByteSink {
    /// One byte at `address`, both as debugger text
    fn feed(&mut self, address: &str, hex_byte: &str) -> Result<(), DumpError>;

    /// A message line that is not part of the dump
    fn add_error(&mut self, message: &str);
}

/// Something that can read memory on request
pub trait MemorySource {
    /// Stream `count` bytes starting at `expression` into `sink`
    fn examine(
        &mut self,
        expression: &str,
        count: usize,
        sink: &mut dyn ByteSink,
    ) -> Result<(), DumpError>;
}

/// In-process memory image mapped at a base address
pub struct SnapshotMemory {
    base: u64,
    image: Vec<u8>,
}

impl SnapshotMemory {
    pub fn new(base: u64, image: Vec<u8>) -> Self {
        Self { base, image }
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    /// Replace the image contents (e.g. after the target ran)
    pub fn replace(&mut self, image: Vec<u8>) {
        self.image = image;
    }

    /// Mutable access to the image, for simulating writes
    pub fn image_mut(&mut self) -> &mut Vec<u8> {
        &mut self.image
    }
}

impl MemorySource for SnapshotMemory {
    fn examine(
        &mut self,
        expression: &str,
        count: usize,
        sink: &mut dyn ByteSink,
    ) -> Result<(), DumpError> {
        let address = parse_address(expression)
            .map_err(|_| DumpError::Debugger(format!("No symbol \"{}\" in current context.", expression)))?;

        let start = address
            .checked_sub(self.base)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|&offset| offset < self.image.len())
            .ok_or_else(|| {
                DumpError::Debugger(format!(
                    "Cannot access memory at address {}",
                    format_address(address)
                ))
            })?;
        let available = self.image.len() - start;
        // Stop at the top of the address space
        let addressable = usize::try_from(u64::MAX - address)
            .map_or(usize::MAX, |room| room.saturating_add(1));
        let count = count.min(available).min(addressable);

        for (value, at) in self.image[start..start + count].iter().zip(address..=u64::MAX) {
            sink.feed(&format_address(at), &format!("{:02x}", value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect {
        bytes: Vec<(String, String)>,
        errors: Vec<String>,
    }

    impl ByteSink for Collect {
        fn feed(&mut self, address: &str, hex_byte: &str) -> Result<(), DumpError> {
            self.bytes.push((address.to_string(), hex_byte.to_string()));
            Ok(())
        }

        fn add_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
    }

    #[test]
    fn test_streams_bytes_in_order() {
        let mut memory = SnapshotMemory::new(0x1000, vec![0xde, 0xad, 0xbe, 0xef]);
        let mut sink = Collect::default();
        memory.examine("0x1001", 2, &mut sink).unwrap();

        assert_eq!(
            sink.bytes,
            vec![
                ("0x1001".to_string(), "ad".to_string()),
                ("0x1002".to_string(), "be".to_string()),
            ]
        );
    }

    #[test]
    fn test_count_is_clamped_to_image() {
        let mut memory = SnapshotMemory::new(0, vec![1, 2, 3]);
        let mut sink = Collect::default();
        memory.examine("0x1", 32, &mut sink).unwrap();
        assert_eq!(sink.bytes.len(), 2);
    }

    #[test]
    fn test_out_of_range_address() {
        let mut memory = SnapshotMemory::new(0x1000, vec![0; 16]);
        let mut sink = Collect::default();
        let err = memory.examine("0x2000", 16, &mut sink).unwrap_err();
        assert_eq!(err.to_string(), "Cannot access memory at address 0x2000");
        assert!(sink.bytes.is_empty());
    }

    #[test]
    fn test_unknown_expression() {
        let mut memory = SnapshotMemory::new(0, vec![0; 16]);
        let mut sink = Collect::default();
        assert!(matches!(
            memory.examine("$rsp", 16, &mut sink),
            Err(DumpError::Debugger(_))
        ));
    }

    #[test]
    fn test_image_at_top_of_address_space() {
        let mut memory = SnapshotMemory::new(0xffff_ffff_ffff_fff8, vec![0x41; 16]);
        let mut sink = Collect::default();
        memory.examine("0xfffffffffffffff8", 16, &mut sink).unwrap();

        assert_eq!(sink.bytes.len(), 8);
        assert_eq!(sink.bytes[0].0, "0xfffffffffffffff8");
        assert_eq!(sink.bytes[7].0, "0xffffffffffffffff");

        let mut sink = Collect::default();
        memory.examine("0xffffffffffffffff", 4, &mut sink).unwrap();
        assert_eq!(sink.bytes, vec![("0xffffffffffffffff".to_string(), "41".to_string())]);
    }
}
