//! Dashboard statistics models.

use crate::types::ProjectId;
use serde::{Deserialize, Serialize};

/// Inspection totals across all projects.
///
/// `Default` is the all-zero value substituted when the statistics endpoint is unavailable.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalStatistics {
    pub total_projects: u64,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub overall_success_rate: f64,
}

/// Inspection totals for one project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectStatistics {
    pub project_id: ProjectId,
    pub project_name: String,
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub success_rate: f64,
}

/// Grade of an overall success rate (percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessTier {
    Excellent,
    Fair,
    NeedsAttention,
}

impl SuccessTier {
    pub fn from_rate(rate: f64) -> Self {
        if rate >= 80.0 {
            SuccessTier::Excellent
        } else if rate >= 60.0 {
            SuccessTier::Fair
        } else {
            SuccessTier::NeedsAttention
        }
    }
}

/// Health of a single project, graded on its task success rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectHealth {
    NoTasks,
    Healthy,
    Fair,
    NeedsAttention,
}

impl ProjectStatistics {
    pub fn health(&self) -> ProjectHealth {
        if self.total_tasks == 0 {
            ProjectHealth::NoTasks
        } else if self.success_rate >= 90.0 {
            ProjectHealth::Healthy
        } else if self.success_rate >= 70.0 {
            ProjectHealth::Fair
        } else {
            ProjectHealth::NeedsAttention
        }
    }
}
