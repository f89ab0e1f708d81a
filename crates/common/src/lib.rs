//! Common utilities and shared types for toggo.
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: UUID v7 identifiers via [`IdGenerator`]
//! - **Clock**: Injectable wall clock for deadline checks
//! - **Pagination**: Opaque `(created_at, id)` cursors and page envelopes

pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod pagination;

pub use clock::{Clock, ClockService, FixedClock, SystemClock, deadline_passed};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::{IdGenerator, parse_uuid};
pub use pagination::{Cursor, Page, clamp_limit, parse_cursor};
