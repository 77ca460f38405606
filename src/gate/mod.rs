// ABOUTME: Access gate for remote callables and remote file operations.
// ABOUTME: Ordered file rules, a persistent callable whitelist, and a rejection log for review.

pub mod engine;
pub mod error;
pub mod lines;
pub mod rejection;
pub mod rules;
pub mod types;
pub mod whitelist;

pub use engine::*;
pub use error::*;
pub use lines::*;
pub use rejection::*;
pub use rules::*;
pub use types::*;
pub use whitelist::*;
