//! Request handlers.

pub mod generate;
pub mod health;
pub mod jobs;

pub use generate::*;
pub use health::*;
pub use jobs::*;
