// src/supabase/rest.rs

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::store::{Query, Store, StoreError};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Error body returned by the REST layer.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// [`Store`] backed by the hosted PostgREST endpoint (`/rest/v1`).
#[derive(Clone)]
pub struct RestStore {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        Url::parse(&format!("{}/rest/v1/{}", self.base_url, table))
            .map_err(|e| StoreError::Network(format!("invalid store url: {e}")))
    }

    /// Renders a [`Query`] as a REST url: `select`, `col=eq.value`, `order`, `limit`.
    pub(crate) fn query_url(&self, query: &Query) -> Result<Url, StoreError> {
        let mut url = self.table_url(&query.table)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", &query.columns);
            for (column, value) in &query.filters {
                pairs.append_pair(column, &format!("eq.{value}"));
            }
            if let Some((column, direction)) = &query.order {
                pairs.append_pair("order", &format!("{column}.{}", direction.as_str()));
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed.message.unwrap_or(body);

        Err(StoreError::classify(
            status,
            parsed.code.as_deref().unwrap_or_default(),
            &message,
            parsed.details.as_deref().unwrap_or_default(),
        ))
    }

    async fn rows(response: Response) -> Result<Vec<Value>, StoreError> {
        match response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?
        {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }
}

#[async_trait]
impl Store for RestStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, StoreError> {
        let url = self.query_url(query)?;
        tracing::debug!(table = %query.table, %url, "store select");
        let response = self.send(self.request(Method::GET, url)).await?;
        Self::rows(response).await
    }

    async fn select_single(&self, query: &Query) -> Result<Value, StoreError> {
        let url = self.query_url(query)?;
        tracing::debug!(table = %query.table, %url, "store select single");
        let response = self
            .send(
                self.request(Method::GET, url)
                    .header(reqwest::header::ACCEPT, SINGLE_OBJECT),
            )
            .await?;

        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn insert(
        &self,
        table: &str,
        rows: Value,
        returning: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("select", returning);
        tracing::debug!(table, "store insert");

        let response = self
            .send(
                self.request(Method::POST, url)
                    .header("Prefer", "return=representation")
                    .json(&rows),
            )
            .await?;
        Self::rows(response).await
    }

    async fn delete(&self, query: &Query) -> Result<usize, StoreError> {
        if query.filters.is_empty() {
            return Err(StoreError::Api {
                status: 0,
                code: String::new(),
                message: format!("refusing to delete from {} without a filter", query.table),
            });
        }

        let url = self.query_url(query)?;
        tracing::debug!(table = %query.table, %url, "store delete");
        let response = self
            .send(
                self.request(Method::DELETE, url)
                    .header("Prefer", "return=representation"),
            )
            .await?;
        Ok(Self::rows(response).await?.len())
    }
}
