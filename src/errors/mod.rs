//! Failure classification.
//!
//! Every caught failure is mapped to a fixed [`ErrorKind`] with a severity
//! and a retry verdict. The verdicts drive two decisions elsewhere: whether
//! a retry loop keeps trying, and whether a stage may skip the failing item
//! ([`should_continue_operation`]) or must abort.

pub mod classifier;
pub mod history;
pub mod service;

pub use classifier::{
    classify, classify_kind, record, should_continue_operation, ClassifiedError, ErrorFacts, ErrorKind,
    Severity,
};
pub use history::ErrorHistory;
pub use service::ServiceError;
