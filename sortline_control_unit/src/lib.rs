//! # Sortline Control Unit
//!
//! The sorting line's domain state machine and the loop that ticks it.
//!
//! # Module Structure
//!
//! - [`state`] - timed state engine and the sorting state set
//! - [`controller`] - `SortingController`, one handler per state
//! - [`cycle`] - `CycleRunner`, fixed-period tick loop publishing snapshots

#![warn(missing_docs)]

pub mod controller;
pub mod cycle;
pub mod state;

pub use crate::controller::SortingController;
pub use crate::cycle::{CycleRunner, CycleStats, StopHandle};
pub use crate::state::machine::TimedStateMachine;
pub use crate::state::sorting::SortState;
