//! Dashboard reporting.
//!
//! Statistics are best-effort: any failure is logged and replaced with an empty value, so a
//! dashboard always renders. The transport still emits its usual error notification, and a 401
//! still ends the session.

use std::sync::Arc;

use tracing::{instrument, warn};

use crate::api::models::dashboard::{GlobalStatistics, ProjectStatistics};
use crate::transport::Transport;
use crate::types::endpoints;

pub struct DashboardService {
    transport: Arc<Transport>,
}

impl DashboardService {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// Totals across all projects; all zeros when unavailable.
    #[instrument(skip_all)]
    pub async fn get_global_statistics(&self) -> GlobalStatistics {
        self.transport
            .get(endpoints::GLOBAL_STATISTICS)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to fetch global statistics");
                GlobalStatistics::default()
            })
    }

    /// Per-project breakdown; empty when unavailable.
    #[instrument(skip_all)]
    pub async fn get_project_statistics(&self) -> Vec<ProjectStatistics> {
        self.transport
            .get(endpoints::PROJECT_STATISTICS)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to fetch project statistics");
                Vec::new()
            })
    }
}
