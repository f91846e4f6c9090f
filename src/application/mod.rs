//! # Application Layer
//!
//! Collaborator interfaces and use cases orchestrating the domain and
//! connector layers.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
