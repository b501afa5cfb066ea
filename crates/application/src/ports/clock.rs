//! Clock port for time-related operations

use chrono::{DateTime, Utc};

/// Port for getting the current wall-clock time.
///
/// Used to stamp refreshed sessions with their advisory expiry.
pub trait Clock: Send + Sync {
    /// Returns the current UTC timestamp.
    fn now(&self) -> DateTime<Utc>;
}
