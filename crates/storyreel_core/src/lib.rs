pub mod artifact;
pub mod error;
pub mod fonts;
pub mod job;
pub mod layout;
pub mod settings;
pub mod text;
pub mod timing;
pub mod types;

pub use error::{CoreError, Result};
