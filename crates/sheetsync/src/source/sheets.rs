//! Google Sheets values API source.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;

use sheetsync_core::schedule::{GridFetcher, RawGrid, Result, ScheduleError};

/// Reads one worksheet through `GET /v4/spreadsheets/{id}/values/{range}`.
#[derive(Debug, Clone)]
pub struct SheetsFetcher {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    range: String,
    api_key: Option<String>,
}

/// Body of a values response. `values` is absent for an empty worksheet.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsFetcher {
    pub fn new(
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        range: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
            api_key,
        }
    }

    fn values_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ScheduleError::SourceUnavailable(format!("invalid Sheets base URL: {e}"))
        })?;

        url.path_segments_mut()
            .map_err(|_| {
                ScheduleError::SourceUnavailable("Sheets base URL cannot be a base".to_string())
            })?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                self.range.as_str(),
            ]);

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("majorDimension", "ROWS");
            if let Some(key) = &self.api_key {
                query.append_pair("key", key);
            }
        }

        Ok(url)
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl GridFetcher for SheetsFetcher {
    async fn fetch(&self) -> Result<RawGrid> {
        let url = self.values_url()?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScheduleError::SourceUnavailable(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScheduleError::SourceUnavailable(format!(
                "Sheets API returned {status}: {}",
                body.trim()
            )));
        }

        let body: ValueRange = response.json().await.map_err(|e| {
            ScheduleError::MalformedSource(format!("unexpected Sheets response: {}", e.without_url()))
        })?;

        tracing::debug!(rows = body.values.len(), range = %self.range, "Fetched worksheet");

        Ok(RawGrid::new(
            body.values
                .into_iter()
                .map(|row| row.into_iter().map(cell_text).collect())
                .collect(),
        ))
    }
}
