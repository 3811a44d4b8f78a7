//! Text surfaces, key input and console painting.
//!
//! - **styled**: styled text buffer shared by the memory view and terminal
//! - **keys**: crossterm key events to line-editor keys
//! - **renderer**: crossterm painter for styled text

pub mod keys;
pub mod renderer;
pub mod styled;

pub use keys::{Key, KeyInput, Modifiers};
pub use renderer::Renderer;
pub use styled::{Style, StyledText};
