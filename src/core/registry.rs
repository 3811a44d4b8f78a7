//! Active terminal registry
//!
//! One part of the host registers the terminal panel, other parts look it up
//! to run programs in it. The registry is an explicit handle passed to
//! whoever needs it; clones share the same slot.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{info, warn};

use super::terminal::TerminalPanel;

/// Shared handle to a terminal panel
pub type SharedTerminal = Rc<RefCell<dyn TerminalPanel>>;

/// Single slot holding the active terminal, set once
#[derive(Clone, Default)]
pub struct TerminalRegistry {
    slot: Rc<RefCell<Option<SharedTerminal>>>,
}

impl TerminalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the active terminal. Later registrations are rejected.
    pub fn set(&self, terminal: SharedTerminal) -> bool {
        let mut slot = self.slot.borrow_mut();
        if slot.is_some() {
            warn!("Terminal already registered, ignoring new registration");
            return false;
        }
        info!("Terminal registered");
        *slot = Some(terminal);
        true
    }

    /// The registered terminal, if any
    pub fn get(&self) -> Option<SharedTerminal> {
        self.slot.borrow().clone()
    }
}
