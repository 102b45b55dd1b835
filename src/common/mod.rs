//! Common types, traits, and error definitions for slam2d
//!
//! This module provides the foundational building blocks shared by the
//! registration, mapping and refinement code.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
