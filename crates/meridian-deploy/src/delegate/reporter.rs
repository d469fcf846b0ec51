//! Progress reporting for delegates.

use tracing::info;

use crate::types::RegionCode;

/// Sink for progress messages emitted by a delegate during `invoke`.
pub trait Reporter: Send + Sync {
    /// Report a status change.
    fn update_status(&self, status: &str);
}

/// Reporter that forwards updates as `tracing` events tagged with a region.
#[derive(Debug, Clone)]
pub struct TracingReporter {
    region: RegionCode,
}

impl TracingReporter {
    /// Create a reporter for a region.
    #[must_use]
    pub fn new(region: RegionCode) -> Self {
        Self { region }
    }

    /// Region this reporter is tagged with.
    #[must_use]
    pub fn region(&self) -> &RegionCode {
        &self.region
    }
}

impl Reporter for TracingReporter {
    fn update_status(&self, status: &str) {
        info!(region = %self.region, status, "deploy progress");
    }
}
