//! Learnify Core - Shared Types
//!
//! Data structures shared by every Learnify crate: backend content entities,
//! the request/storage error taxonomy, circuit and request-class enums, and
//! the [`Clock`] abstraction. This crate contains no I/O.

pub mod clock;
pub mod entities;
pub mod error;
pub mod identity;
pub mod resilience;

pub use clock::{system_clock, to_time_delta, Clock, ManualClock, SystemClock};
pub use entities::*;
pub use error::{
    ApiError, LearnifyError, LearnifyResult, RequestError, StorageError, StorageResult,
};
pub use identity::{from_epoch_millis, to_epoch_millis, Timestamp};
pub use resilience::{CircuitState, RequestClass};
