use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::errors::TableError;

/// One position-addressed cell write. Rows and columns are zero-based and
/// include the header row (row 0).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellUpdate {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

/// Raw access to the remote flat table. Row 0 is the header; every other row
/// is one case. Implementations report failures as `TableError` so the retry
/// policy can tell transient from permanent; they do no retrying themselves.
#[async_trait]
pub trait RemoteTable: Send + Sync {
    /// Fetch the entire grid, header row included.
    async fn fetch_all(&self) -> Result<Vec<Vec<String>>, TableError>;

    /// Apply a batch of cell writes in one backend call. The grid grows as
    /// needed to cover the addressed positions.
    async fn batch_update(&self, updates: &[CellUpdate]) -> Result<(), TableError>;

    /// Append one row below the current last row.
    async fn append_row(&self, row: &[String]) -> Result<(), TableError>;
}

/// Remote values-API table backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTable {
    client: reqwest::Client,
    base_url: String,
    table_id: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ValuesPayload {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct BatchUpdateBody<'a> {
    updates: &'a [CellUpdate],
}

#[derive(Debug, Serialize)]
struct AppendBody<'a> {
    values: Vec<&'a [String]>,
}

impl HttpTable {
    pub fn new(base_url: &str, table_id: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            table_id: table_id.to_string(),
            token,
        }
    }

    fn values_url(&self, suffix: &str) -> String {
        format!("{}/tables/{}/values{}", self.base_url, self.table_id, suffix)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TableError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TableError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl RemoteTable for HttpTable {
    async fn fetch_all(&self) -> Result<Vec<Vec<String>>, TableError> {
        let request = self.apply_auth(self.client.get(self.values_url("")));
        let response = Self::check(request.send().await?).await?;
        let payload: ValuesPayload = response
            .json()
            .await
            .map_err(|e| TableError::Malformed(e.to_string()))?;

        // Cells may come back as JSON numbers; the store works in text.
        let grid = payload
            .values
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect::<Vec<Vec<String>>>();
        debug!(rows = grid.len(), table = %self.table_id, "fetched table grid");
        Ok(grid)
    }

    async fn batch_update(&self, updates: &[CellUpdate]) -> Result<(), TableError> {
        let request = self
            .apply_auth(self.client.post(self.values_url(":batchUpdate")))
            .json(&BatchUpdateBody { updates });
        Self::check(request.send().await?).await?;
        debug!(cells = updates.len(), table = %self.table_id, "applied batch update");
        Ok(())
    }

    async fn append_row(&self, row: &[String]) -> Result<(), TableError> {
        let request = self
            .apply_auth(self.client.post(self.values_url(":append")))
            .json(&AppendBody { values: vec![row] });
        Self::check(request.send().await?).await?;
        debug!(width = row.len(), table = %self.table_id, "appended row");
        Ok(())
    }
}
