//! Core business logic for toggo polls.

pub mod services;

pub use services::*;
