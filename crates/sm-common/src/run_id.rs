//! Run identifiers. The process id tags every log line of a worker; each
//! rematch job gets its own id so its logs and summary can be correlated.

use once_cell::sync::Lazy;
use ulid::Ulid;

static PROCESS_RUN_ID: Lazy<String> = Lazy::new(|| Ulid::new().to_string());

/// Generated on first access, stable for the process lifetime.
#[inline]
pub fn process() -> &'static str {
    &PROCESS_RUN_ID
}

/// Fresh, time-ordered id for one rematch job.
#[inline]
pub fn generate() -> String {
    Ulid::new().to_string()
}
