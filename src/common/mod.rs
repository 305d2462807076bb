//! Common types, traits, and error definitions for rust_navigation
//!
//! This module provides the foundational building blocks shared by the
//! environments, strategies and the commander.

pub mod types;
pub mod traits;
pub mod error;
pub mod observation;

pub use types::*;
pub use traits::*;
pub use error::*;
pub use observation::*;
