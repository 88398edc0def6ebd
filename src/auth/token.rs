//! Token pair lifecycle and secret wrappers.

pub mod pair;
pub mod secret;
