/// Run state definitions for tracking scrape progress
///
/// A run moves from `Idle` through `Running` (one update per site and per
/// finished organization) and ends `Completed` or `Failed`.
use std::fmt;

/// Represents the current state of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    /// No run has started yet
    #[default]
    Idle,

    /// Scraping the site at `site_index`; `org_index` organizations of it are done
    Running { site_index: usize, org_index: usize },

    /// The run finished; `sites_processed` sites contributed results
    Completed { sites_processed: usize },

    /// The run stopped at `site_index` (persistence exhausted or cancelled)
    Failed { site_index: usize },
}

impl RunState {
    /// Returns true if this is a terminal state (a new run may start)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }

    /// Returns true while a run is in progress
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Returns the state name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running { .. } => "running",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Checks if a transition from this state to another is valid
    ///
    /// # Valid Transitions
    ///
    /// - Idle → Running
    /// - Running → Running (next organization or next site, never backwards)
    /// - Running → Completed, Failed
    /// - Completed, Failed → Running (a fresh run)
    pub fn can_transition_to(&self, target: RunState) -> bool {
        use RunState::*;

        match (self, target) {
            (Idle, Running { .. }) => true,

            (
                Running {
                    site_index: from_site,
                    org_index: from_org,
                },
                Running {
                    site_index: to_site,
                    org_index: to_org,
                },
            ) => to_site > *from_site || (to_site == *from_site && to_org >= *from_org),

            (Running { .. }, Completed { .. }) => true,
            (Running { .. }, Failed { .. }) => true,

            (Completed { .. } | Failed { .. }, Running { .. }) => true,

            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running {
                site_index,
                org_index,
            } => write!(f, "running(site {}, org {})", site_index, org_index),
            Self::Completed { sites_processed } => {
                write!(f, "completed({} sites)", sites_processed)
            }
            Self::Failed { site_index } => write!(f, "failed(site {})", site_index),
        }
    }
}
