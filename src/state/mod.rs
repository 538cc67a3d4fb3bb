//! State module for tracking scrape progress
//!
//! # Components
//!
//! - `RunState`: Tracks where a run is (idle, running a site, completed or failed)

mod run_state;

pub use run_state::RunState;
