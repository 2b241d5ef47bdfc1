// ── Analytics source seam ──
//
// What the refresher needs from upstream, as a trait so cycles can be
// driven by the real `ApiClient` or by an in-process fake.

use async_trait::async_trait;
use umami_api::{ActiveVisitors, ApiClient, Error, MetricEntry, MetricType, Website, WebsiteStats};

#[async_trait]
pub trait AnalyticsSource: Send + Sync + 'static {
    async fn websites(&self) -> Result<Vec<Website>, Error>;

    async fn stats(&self, website_id: &str) -> Result<WebsiteStats, Error>;

    async fn active(&self, website_id: &str) -> Result<ActiveVisitors, Error>;

    async fn metrics(
        &self,
        website_id: &str,
        metric_type: MetricType,
        limit: Option<u32>,
    ) -> Result<Vec<MetricEntry>, Error>;
}

#[async_trait]
impl AnalyticsSource for ApiClient {
    async fn websites(&self) -> Result<Vec<Website>, Error> {
        self.list_websites().await
    }

    async fn stats(&self, website_id: &str) -> Result<WebsiteStats, Error> {
        self.website_stats(website_id).await
    }

    async fn active(&self, website_id: &str) -> Result<ActiveVisitors, Error> {
        self.website_active(website_id).await
    }

    async fn metrics(
        &self,
        website_id: &str,
        metric_type: MetricType,
        limit: Option<u32>,
    ) -> Result<Vec<MetricEntry>, Error> {
        self.website_metrics(website_id, metric_type, limit).await
    }
}
