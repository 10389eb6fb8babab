//! Per-property fetch pipeline: display name, page views, and batch fan-out.

use std::sync::Arc;

use futures::StreamExt;
use futures::future::join_all;
use futures::stream;

use crate::client::AnalyticsApi;
use crate::error::FetchError;
use crate::types::{DateRange, PropertyResult, placeholder_name};

/// Fetches page views for properties through an [`AnalyticsApi`].
///
/// Never fails: upstream errors are captured in the returned [`PropertyResult`].
#[derive(Clone)]
pub struct PageviewFetcher {
    api: Arc<dyn AnalyticsApi>,
    max_concurrency: Option<usize>,
}

impl PageviewFetcher {
    pub fn new(api: Arc<dyn AnalyticsApi>) -> Self {
        Self {
            api,
            max_concurrency: None,
        }
    }

    /// Cap the number of in-flight fetches per batch. `None` or `0` means unbounded.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit.filter(|&n| n > 0);
        self
    }

    /// Display name from the Admin API, or `"Property {id}"` on any failure.
    pub async fn resolve_name(&self, property_id: &str) -> String {
        match self.api.get_property(property_id).await {
            Ok(property) => property
                .display_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| placeholder_name(property_id)),
            Err(e) => {
                tracing::warn!("Error fetching property name for {}: {}", property_id, e);
                placeholder_name(property_id)
            }
        }
    }

    async fn try_fetch(
        &self,
        property_id: &str,
        range: DateRange,
    ) -> Result<(String, u64), FetchError> {
        let property_name = self.resolve_name(property_id).await;
        let report = self.api.run_report(property_id, range).await?;
        Ok((property_name, report.pageviews()?))
    }

    /// Page views for one property over yesterday..today.
    pub async fn fetch_one(&self, property_id: &str) -> PropertyResult {
        let range = DateRange::current();

        match self.try_fetch(property_id, range).await {
            Ok((property_name, pageviews)) => {
                PropertyResult::success(property_id.to_string(), property_name, pageviews)
            }
            Err(e) => {
                tracing::error!("Error fetching data for property {}: {}", property_id, e);
                // Second, independent attempt so the entry still carries a usable name
                let property_name = self.resolve_name(property_id).await;
                PropertyResult::failure(property_id.to_string(), property_name, e)
            }
        }
    }

    /// Fetch every property concurrently. Results keep the input order.
    pub async fn fetch_many(&self, property_ids: &[String]) -> Vec<PropertyResult> {
        match self.max_concurrency {
            None => join_all(property_ids.iter().map(|id| self.fetch_one(id))).await,
            Some(limit) => {
                let pending: Vec<_> = property_ids.iter().map(|id| self.fetch_one(id)).collect();
                stream::iter(pending)
                    .buffered(limit)
                    .collect::<Vec<_>>()
                    .await
            }
        }
    }
}
