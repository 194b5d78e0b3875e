//! Sheets values API client with a cached bearer token.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Error, LedgerSource, UnitEconomicsTable};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::auth::{ServiceAccountAuth, SHEETS_READONLY_SCOPE};
use crate::ledger::parse_ledger;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// Refresh this long before the token actually expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Render a cell the way the sheet displays it.
fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Reads one worksheet of one spreadsheet.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    auth: ServiceAccountAuth,
    spreadsheet_id: String,
    sheet_name: String,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl SheetsClient {
    pub fn new(
        auth: ServiceAccountAuth,
        spreadsheet_id: &str,
        sheet_name: &str,
    ) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::http(&e))?;

        Ok(Self {
            client,
            auth,
            spreadsheet_id: spreadsheet_id.trim().to_string(),
            sheet_name: sheet_name.to_string(),
            token: Arc::new(Mutex::new(None)),
        })
    }

    /// Values endpoint for the whole worksheet; the sheet name is the range.
    fn values_url(&self) -> Result<reqwest::Url, Error> {
        let mut url = reqwest::Url::parse(SHEETS_BASE_URL)
            .map_err(|e| Error::Other(format!("bad Sheets base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::Other("Sheets base URL cannot have a path".into()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                self.sheet_name.as_str(),
            ]);
        Ok(url)
    }

    async fn access_token(&self) -> Result<String, Error> {
        let mut guard = self.token.lock().await;
        let now = Utc::now();
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        debug!("Requesting Google access token for {}", self.auth.client_email);
        let assertion = self.auth.assertion(SHEETS_READONLY_SCOPE, now);
        let resp = self
            .client
            .post(&self.auth.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::http(&e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "token exchange failed with status {status}: {}",
                body.chars().take(300).collect::<String>()
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::http(&e))?;

        let cached = CachedToken {
            access_token: token.access_token,
            expires_at: now + chrono::Duration::seconds(token.expires_in),
        };
        let access_token = cached.access_token.clone();
        *guard = Some(cached);
        Ok(access_token)
    }

    /// Fetch every non-empty row of the worksheet as display strings.
    pub async fn fetch_rows(&self) -> Result<Vec<Vec<String>>, Error> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .get(self.values_url()?)
            .bearer_auth(token)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await
            .map_err(|e| Error::http(&e))?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::SheetsApi {
                status,
                message: body.chars().take(500).collect(),
            });
        }

        let range: ValueRange = resp
            .json()
            .await
            .map_err(|e| Error::http(&e))?;

        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

#[async_trait]
impl LedgerSource for SheetsClient {
    async fn load_ledger(&self) -> Result<UnitEconomicsTable, Error> {
        let rows = self.fetch_rows().await?;
        let table = parse_ledger(&rows);
        info!(
            "Loaded unit-economics ledger: {} rows, {} products",
            rows.len(),
            table.len()
        );
        Ok(table)
    }
}
