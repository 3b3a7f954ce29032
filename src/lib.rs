pub mod commands;
pub mod error;
pub mod events;
pub mod framework;
pub mod manifest;
pub mod package;
pub mod pipeline;
pub mod project;
pub mod resolver;
pub mod runtime;
pub mod script;
pub mod source;
pub mod transform;

pub use error::{PackageError, Result};
