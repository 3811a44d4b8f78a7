//! Program terminal components.
//!
//! - **process**: child process host with non-blocking stream access
//! - **terminal**: terminal panel (transcript, input line, process lifecycle)
//! - **registry**: explicit slot through which the host reaches the terminal
//!
//! # Architecture
//!
//! ```text
//! Terminal
//! ├── ProcessHost → ChildHandle (stdin/stdout/stderr, exit)
//! ├── PollTimer (output polling)
//! └── StyledText transcript
//!     ├── history (read-only)
//!     └── input region (from input_start)
//! ```

pub mod process;
pub mod registry;
pub mod terminal;

pub use process::{join_command_line, LocalHost};
pub use registry::TerminalRegistry;
pub use terminal::{KeyOutcome, Terminal, TerminalPanel};
