//! Auth-domain identifiers and token-pair models.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{pair::*, secret::*};
