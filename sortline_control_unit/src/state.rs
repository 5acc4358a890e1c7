//! State machine module root.
//!
//! - [`machine`] - generic timed state engine (entry flag + dwell timer)
//! - [`sorting`] - the closed set of sorting line states

pub mod machine;
pub mod sorting;
