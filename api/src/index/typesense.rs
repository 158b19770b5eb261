use super::{
    collection_schema, IndexClient, IndexSearchRequest, IndexSearchResponse, TaskDocument,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

/// Typesense HTTP client for the task collection.
pub struct TypesenseClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for TypesenseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypesenseClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    found: i64,
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    document: HitDocument,
}

#[derive(Debug, Deserialize)]
struct HitDocument {
    task_id: i64,
}

#[derive(Debug, Deserialize)]
struct ImportResult {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

impl TypesenseClient {
    /// Creates a new client from environment variables.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("TYPESENSE_URL").context("TYPESENSE_URL not set")?;
        let api_key = std::env::var("TYPESENSE_API_KEY").context("TYPESENSE_API_KEY not set")?;
        Ok(Self::new(&base_url, &api_key))
    }

    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base_url, collection)
    }

    async fn create_collection(&self, collection: &str) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/collections", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&collection_schema(collection))
            .send()
            .await
            .context("Failed to send create collection request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Typesense API error {}: {}", status, body);
        }
        tracing::info!("Created search index collection {}", collection);
        Ok(())
    }
}

#[async_trait]
impl IndexClient for TypesenseClient {
    async fn ensure_collection(&self, collection: &str) -> Result<()> {
        let resp = self
            .client
            .get(self.collection_url(collection))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .context("Failed to send get collection request")?;

        match resp.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => self.create_collection(collection).await,
            status => {
                let body = resp.text().await.unwrap_or_default();
                anyhow::bail!("Typesense API error {}: {}", status, body);
            }
        }
    }

    async fn recreate_collection(&self, collection: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.collection_url(collection))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .context("Failed to send delete collection request")?;

        let status = resp.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Typesense API error {}: {}", status, body);
        }
        self.create_collection(collection).await
    }

    async fn upsert_documents(&self, collection: &str, documents: &[TaskDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let mut body = String::new();
        for document in documents {
            body.push_str(
                &serde_json::to_string(document).context("Failed to serialize task document")?,
            );
            body.push('\n');
        }

        let resp = self
            .client
            .post(format!(
                "{}/documents/import",
                self.collection_url(collection)
            ))
            .query(&[("action", "upsert")])
            .header(API_KEY_HEADER, &self.api_key)
            .header("content-type", "text/plain")
            .body(body)
            .send()
            .await
            .context("Failed to send document import request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Typesense API error {}: {}", status, body);
        }

        // One JSON result per line; the request succeeds even if documents fail
        let text = resp.text().await.context("Failed to read import response")?;
        let failures: Vec<String> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<ImportResult>(line).ok())
            .filter(|result| !result.success)
            .map(|result| result.error.unwrap_or_default())
            .collect();
        if !failures.is_empty() {
            anyhow::bail!(
                "Typesense rejected {} of {} documents: {}",
                failures.len(),
                documents.len(),
                failures.join("; ")
            );
        }
        Ok(())
    }

    async fn delete_documents(&self, collection: &str, task_ids: &[i64]) -> Result<()> {
        if task_ids.is_empty() {
            return Ok(());
        }

        let ids = task_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let resp = self
            .client
            .delete(format!("{}/documents", self.collection_url(collection)))
            .query(&[("filter_by", format!("task_id:=[{}]", ids))])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .context("Failed to send delete documents request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Typesense API error {}: {}", status, body);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        request: &IndexSearchRequest,
    ) -> Result<IndexSearchResponse> {
        let mut params = vec![
            ("q", request.q.clone()),
            ("query_by", request.query_by.join(",")),
            ("page", request.page.to_string()),
            ("per_page", request.per_page.to_string()),
        ];
        if !request.filter_by.is_empty() {
            params.push(("filter_by", request.filter_by.clone()));
        }
        if !request.sort_by.is_empty() {
            params.push(("sort_by", request.sort_by.clone()));
        }

        let resp = self
            .client
            .get(format!("{}/documents/search", self.collection_url(collection)))
            .query(&params)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .context("Failed to send search request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Typesense API error {}: {}", status, body);
        }

        let data: SearchResponse = resp
            .json()
            .await
            .context("Failed to parse search response")?;
        Ok(IndexSearchResponse {
            ids: data.hits.into_iter().map(|h| h.document.task_id).collect(),
            found: data.found,
        })
    }
}
