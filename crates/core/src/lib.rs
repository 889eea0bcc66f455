//! Core types, storage contract, and errors for the session engine.

pub mod error;
pub mod events;
pub mod limits;
pub mod request;
pub mod session;
pub mod store;
pub mod util;

pub use error::{DbErrorCode, Error, Result};
pub use events::*;
pub use request::*;
pub use session::*;
pub use store::*;
