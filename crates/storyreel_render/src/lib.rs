pub mod command;
pub mod compose;
pub mod durations;
pub mod encode;
pub mod error;
pub mod filter;
pub mod graph;
pub mod inputs;
pub mod layout;
pub mod probe;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use compose::{Collaborators, ComposeConfig, ComposeRequest, Composer};
pub use error::{ErrorKind, RenderError, Result};
