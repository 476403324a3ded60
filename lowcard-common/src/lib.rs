//! Common definitions (errors and result alias), relied upon by all
//! lowcard-* crates.

pub mod error;
pub mod result;

pub use result::Result;
