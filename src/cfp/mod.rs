//! Call-for-papers domain operations: reviews, tags, role-gated views and the
//! admin and speaker workflows around them.

pub mod admin;
pub mod identity;
pub mod reviews;
pub mod stats;
pub mod submissions;
pub mod tags;
pub mod view;

pub use stats::{compute_stats, SubmissionStats};
pub use view::{submission_for_reviewer, SubmissionView};
