//! Interactive UI adapter. Implements InputPort.

pub mod tui;

pub use tui::TuiInputPort;
