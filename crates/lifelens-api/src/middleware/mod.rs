//! Request extractors shared by the handlers.

pub mod owner;

pub use owner::{Owner, OWNER_HEADER};
