//! Security utilities.
//!
//! Currently this is credential scrubbing for any error text that leaves
//! the process through logs, run summaries or notifications.

pub mod credential_scrubber;

pub use credential_scrubber::{safe_error_message, scrub_credentials};
