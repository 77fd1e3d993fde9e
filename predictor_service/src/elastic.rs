//! Elasticsearch scroll search source

use async_trait::async_trait;
use forecast_core::error::{ForecastError, Result};
use forecast_core::{Document, RecordSource, SourceQuery};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const RANGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DEFAULT_PAGE_SIZE: usize = 1000;
const DEFAULT_SCROLL: &str = "5m";

#[derive(Debug, Deserialize)]
struct ScrollPage {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: HitList,
}

#[derive(Debug, Deserialize)]
struct HitList {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: Document,
}

/// Pages through every document of a range query with the scroll API
#[derive(Debug, Clone)]
pub struct ElasticSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    page_size: usize,
    scroll: String,
}

impl ElasticSource {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ForecastError::Source(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            page_size: DEFAULT_PAGE_SIZE,
            scroll: DEFAULT_SCROLL.to_string(),
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn post(&self, url: String, body: &Value) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(url).json(body))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(reqwest::header::AUTHORIZATION, format!("ApiKey {}", key)),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ScrollPage> {
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ForecastError::Source(format!("Elasticsearch request failed: {}", e)))?;

        response
            .json::<ScrollPage>()
            .await
            .map_err(|e| ForecastError::Source(format!("Unexpected Elasticsearch response: {}", e)))
    }

    async fn clear_scroll(&self, scroll_id: &str) {
        let request = self
            .authorize(self.client.delete(format!("{}/_search/scroll", self.base_url)))
            .json(&json!({ "scroll_id": scroll_id }));

        if let Err(err) = request.send().await.and_then(|r| r.error_for_status()) {
            tracing::warn!(error = %err, "failed to clear Elasticsearch scroll");
        }
    }
}

/// Body of the initial search: an inclusive range on the query's time field
/// returning only the requested fields.
pub fn search_body(query: &SourceQuery, page_size: usize) -> Value {
    let mut range = serde_json::Map::new();
    range.insert(
        query.time_field.clone(),
        json!({
            "gte": query.from_date.format(RANGE_FORMAT).to_string(),
            "lte": query.to_date.format(RANGE_FORMAT).to_string(),
        }),
    );

    json!({
        "size": page_size,
        "_source": query.fields,
        "sort": ["_doc"],
        "query": { "range": range },
    })
}

#[async_trait]
impl RecordSource for ElasticSource {
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<Document>> {
        let url = format!(
            "{}/{}/_search?scroll={}",
            self.base_url, query.index, self.scroll
        );
        let mut page = self
            .send(self.post(url, &search_body(query, self.page_size)))
            .await?;

        let mut documents = Vec::new();
        let mut scroll_id = page.scroll_id.take();

        loop {
            let received = page.hits.hits.len();
            documents.extend(page.hits.hits.into_iter().map(|hit| hit.source));
            tracing::debug!(received, total = documents.len(), "scrolled Elasticsearch page");

            let Some(id) = scroll_id.as_deref().filter(|_| received > 0) else {
                break;
            };

            let next = self
                .send(self.post(
                    format!("{}/_search/scroll", self.base_url),
                    &json!({ "scroll": self.scroll, "scroll_id": id }),
                ))
                .await;

            page = match next {
                Ok(page) => page,
                Err(err) => {
                    self.clear_scroll(id).await;
                    return Err(err);
                }
            };
            if let Some(next_id) = page.scroll_id.take() {
                scroll_id = Some(next_id);
            }
        }

        if let Some(id) = scroll_id {
            self.clear_scroll(&id).await;
        }

        Ok(documents)
    }
}
