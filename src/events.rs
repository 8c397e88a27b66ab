//! Event definitions for the application event loop.
//!
//! Terminal input and OS signals arrive on other tasks and threads; they are funnelled
//! through this enum into the single loop that owns all application state.

use crossterm::event::{KeyEvent, MouseEvent};

/// Represents an event in the application's main event loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// A keyboard event received from the user.
    Key(KeyEvent),
    /// A mouse event received from the user.
    Mouse(MouseEvent),
    /// The terminal window was resized.
    Resize { width: u16, height: u16 },
    /// scriptrack itself was asked to exit.
    Shutdown { signal: ShutdownSignal },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    SigInt,
    SigTerm,
}

impl ShutdownSignal {
    pub fn label(&self) -> &'static str {
        match self {
            ShutdownSignal::SigInt => "SIGINT",
            ShutdownSignal::SigTerm => "SIGTERM",
        }
    }
}
