// Website endpoints
//
// The fixed set of read-only calls the exporter needs: listing, summary
// stats, live visitors and per-dimension breakdowns.

use chrono::Utc;
use reqwest::Method;
use tracing::warn;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{
    ActiveVisitors, MetricEntry, MetricType, TimeWindow, Website, WebsitePage, WebsiteStats,
};

/// Page size requested when listing websites; large enough to mean "all".
pub const WEBSITE_PAGE_SIZE: u32 = 1000;

impl ApiClient {
    /// The trailing stats window ending now.
    fn window(&self) -> TimeWindow {
        TimeWindow::trailing(Utc::now(), self.stats_window())
    }

    /// List every website visible to the logged-in user.
    pub async fn list_websites(&self) -> Result<Vec<Website>, Error> {
        let query = [("pageSize", WEBSITE_PAGE_SIZE.to_string())];
        let page: WebsitePage = self
            .request(Method::GET, "api/websites", &query, None)
            .await?;

        if let Some(count) = page.count {
            let returned = u64::try_from(page.data.len()).unwrap_or(u64::MAX);
            if count > returned {
                warn!(
                    count,
                    returned,
                    page_size = page.page_size,
                    "website listing truncated by page size"
                );
            }
        }

        Ok(page.data)
    }

    /// Summary stats of one website over the trailing window.
    pub async fn website_stats(&self, website_id: &str) -> Result<WebsiteStats, Error> {
        let query = self.window().query();
        self.request(
            Method::GET,
            &format!("api/websites/{website_id}/stats"),
            &query,
            None,
        )
        .await
    }

    /// Visitors currently active on one website.
    pub async fn website_active(&self, website_id: &str) -> Result<ActiveVisitors, Error> {
        self.request(
            Method::GET,
            &format!("api/websites/{website_id}/active"),
            &[],
            None,
        )
        .await
    }

    /// Breakdown of one website by `metric_type` over the trailing window.
    ///
    /// `limit` caps the number of rows; `None` leaves the server default.
    pub async fn website_metrics(
        &self,
        website_id: &str,
        metric_type: MetricType,
        limit: Option<u32>,
    ) -> Result<Vec<MetricEntry>, Error> {
        let [start, end] = self.window().query();
        let mut query = vec![("type", metric_type.to_string()), start, end];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        self.request(
            Method::GET,
            &format!("api/websites/{website_id}/metrics"),
            &query,
            None,
        )
        .await
    }
}
