//! One-shot dashboard reads.

use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::model::DashboardSnapshot;

/// Dashboard overview endpoint.
pub const DASHBOARD_OVERVIEW_PATH: &str = "/api/customer/dashboard/overview";

/// Reads the authoritative dashboard once.
///
/// No retries and no caching. Any failure is logged and reported as `None`,
/// which callers must treat as "unknown", never as zero.
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    api: ApiClient,
}

impl SnapshotFetcher {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn fetch(&self) -> Option<DashboardSnapshot> {
        match self.api.get::<DashboardSnapshot>(DASHBOARD_OVERVIEW_PATH).await {
            Ok(snapshot) => {
                debug!(?snapshot, "Dashboard snapshot fetched");
                Some(snapshot)
            }
            Err(e) => {
                warn!(error = %e, auth = e.is_auth(), "Dashboard snapshot unavailable");
                None
            }
        }
    }
}
