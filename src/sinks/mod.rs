//! Built-in sinks

pub mod console;
pub mod rotate;

pub use console::ConsoleWriter;
pub use rotate::{Clock, RotateMode, RotateWriter, DEFAULT_ROTATE_SIZE};
