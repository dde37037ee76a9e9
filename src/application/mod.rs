// Application layer - use cases and orchestration over the ledger store and
// the repository.

mod command;
mod conversation;
pub mod error;
mod service;

pub use command::*;
pub use conversation::*;
pub use error::*;
pub use service::*;
