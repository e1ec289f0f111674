pub mod ticket;
pub mod user;
pub mod workspace;

pub use ticket::*;
pub use user::*;
pub use workspace::*;

use chrono::{SecondsFormat, Utc};

/// Current time as a fixed-width RFC 3339 string, so stored timestamps sort lexicographically.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
