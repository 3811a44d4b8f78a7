//! Debugger memory view.
//!
//! - **address**: address / byte text parsing and the `#` freeze prefix
//! - **dump**: incremental hex+ASCII renderer with change highlighting
//! - **source**: the memory source seam and an in-process snapshot source
//! - **examine**: the examine memory panel tying the pieces together
//!
//! # Data flow
//!
//! ```text
//! ExamineMemoryPanel::go()
//! └── MemorySource::examine(expr, count)
//!     └── ByteSink::feed(address, hex)  (once per byte)
//!         └── DumpRenderer  → StyledText rows
//! ```

pub mod address;
pub mod dump;
pub mod examine;
pub mod source;

pub use dump::{DumpError, DumpRenderer, WordSize};
pub use examine::ExamineMemoryPanel;
pub use source::{ByteSink, MemorySource, SnapshotMemory};
