// Application layer: the ledger service every front end talks to.

mod auth;
pub mod error;
mod service;

pub use auth::*;
pub use error::*;
pub use service::*;
