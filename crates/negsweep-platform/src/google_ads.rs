//! Google Ads REST backend
//!
//! Implements [`AdAccountService`] against the Google Ads REST interface:
//! GAQL reads go through `googleAds:search` (page-token paging), list and
//! criteria creation go through `sharedSets:mutate` and
//! `sharedCriteria:mutate`. Access tokens come from an OAuth refresh token
//! and are cached until shortly before they expire.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::account_service::*;
use crate::error::PlatformError;

const DEFAULT_ENDPOINT: &str = "https://googleads.googleapis.com";
const DEFAULT_API_VERSION: &str = "v17";
const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Credentials and endpoints for the Google Ads API.
#[derive(Debug, Clone)]
pub struct GoogleAdsConfig {
    pub developer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Manager account the calls are made through, if any.
    pub login_customer_id: Option<String>,
    pub endpoint: String,
    pub api_version: String,
    pub token_endpoint: String,
    pub request_timeout: Duration,
}

impl GoogleAdsConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - GOOGLE_ADS_DEVELOPER_TOKEN (required)
    /// - GOOGLE_ADS_CLIENT_ID (required)
    /// - GOOGLE_ADS_CLIENT_SECRET (required)
    /// - GOOGLE_ADS_REFRESH_TOKEN (required)
    /// - GOOGLE_ADS_LOGIN_CUSTOMER_ID (optional)
    /// - GOOGLE_ADS_API_VERSION (optional, default: "v17")
    pub fn from_env() -> PlatformResult<Self> {
        fn required(key: &str) -> PlatformResult<String> {
            std::env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PlatformError::Config(format!("{key} not set")))
        }

        Ok(Self {
            developer_token: required("GOOGLE_ADS_DEVELOPER_TOKEN")?,
            client_id: required("GOOGLE_ADS_CLIENT_ID")?,
            client_secret: required("GOOGLE_ADS_CLIENT_SECRET")?,
            refresh_token: required("GOOGLE_ADS_REFRESH_TOKEN")?,
            login_customer_id: std::env::var("GOOGLE_ADS_LOGIN_CUSTOMER_ID")
                .ok()
                .map(|v| v.trim().replace('-', ""))
                .filter(|v| !v.is_empty()),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_version: std::env::var("GOOGLE_ADS_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(60),
        })
    }

    /// Point the client at a different API host (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CampaignRow {
    campaign: CampaignField,
}

#[derive(Debug, Deserialize)]
struct CampaignField {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchTermRow {
    search_term_view: SearchTermField,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchTermField {
    #[serde(default)]
    search_term: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharedSetRow {
    shared_set: SharedSetField,
}

#[derive(Debug, Deserialize)]
struct SharedSetField {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharedCriterionRow {
    shared_criterion: SharedCriterionField,
}

#[derive(Debug, Deserialize)]
struct SharedCriterionField {
    keyword: Option<KeywordField>,
}

#[derive(Debug, Deserialize)]
struct KeywordField {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutateResponse {
    #[serde(default)]
    results: Vec<MutateResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutateResult {
    resource_name: String,
}

/// Google Ads API client.
pub struct GoogleAdsClient {
    config: GoogleAdsConfig,
    http: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleAdsClient {
    pub fn new(config: GoogleAdsConfig) -> PlatformResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("negsweep-platform/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> PlatformResult<Self> {
        Self::new(GoogleAdsConfig::from_env()?)
    }

    async fn access_token(&self) -> PlatformResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let body = json!({
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret,
            "refresh_token": self.config.refresh_token,
            "grant_type": "refresh_token",
        });
        let response = self
            .http
            .post(&self.config.token_endpoint)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "OAuth token refresh rejected");
            return Err(PlatformError::Auth(format!("token refresh returned {status}: {text}")));
        }

        let token: TokenResponse = response.json().await.map_err(|e| PlatformError::Decode {
            operation: "token_refresh".to_string(),
            detail: e.to_string(),
        })?;
        let ttl = token.expires_in.unwrap_or(3600).saturating_sub(60);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });
        debug!(ttl_secs = ttl, "refreshed Google Ads access token");
        Ok(token.access_token)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        operation: &str,
        account: &AccountId,
        method: &str,
        body: &Value,
    ) -> PlatformResult<T> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/{}/customers/{}/{}",
            self.config.endpoint, self.config.api_version, account, method
        );

        let mut request = self
            .http
            .post(&url)
            .bearer_auth(token)
            .header("developer-token", &self.config.developer_token)
            .json(body);
        if let Some(login) = &self.config.login_customer_id {
            request = request.header("login-customer-id", login);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(operation, account = %account, status = %status, "Google Ads call failed");
            return Err(status_error(operation, status, text));
        }

        response.json::<T>().await.map_err(|e| PlatformError::Decode {
            operation: operation.to_string(),
            detail: e.to_string(),
        })
    }

    async fn search<T: DeserializeOwned>(
        &self,
        operation: &str,
        account: &AccountId,
        query: &str,
    ) -> PlatformResult<Vec<T>> {
        let mut rows = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut body = json!({ "query": query });
            if let Some(token) = &page_token {
                body["pageToken"] = json!(token);
            }
            let page: SearchPage<T> = self
                .post(operation, account, "googleAds:search", &body)
                .await?;
            rows.extend(page.results);
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl AdAccountService for GoogleAdsClient {
    async fn list_enabled_search_campaigns(
        &self,
        account: &AccountId,
    ) -> PlatformResult<Vec<CampaignSummary>> {
        let query = "SELECT campaign.id, campaign.name FROM campaign \
                     WHERE campaign.status = 'ENABLED' \
                     AND campaign.advertising_channel_type = 'SEARCH'";
        let rows: Vec<CampaignRow> = self.search("list_campaigns", account, query).await?;
        Ok(rows
            .into_iter()
            .map(|row| CampaignSummary {
                campaign_id: row.campaign.id,
                name: row.campaign.name,
            })
            .collect())
    }

    async fn query_search_terms(
        &self,
        account: &AccountId,
        campaign_id: &str,
        range: &DateRange,
    ) -> PlatformResult<Vec<String>> {
        let campaign_id = numeric_id("query_search_terms", campaign_id)?;
        let query = format!(
            "SELECT search_term_view.search_term FROM search_term_view \
             WHERE segments.date BETWEEN '{}' AND '{}' \
             AND campaign.id = {}",
            range.start.format("%Y-%m-%d"),
            range.end.format("%Y-%m-%d"),
            campaign_id
        );
        let rows: Vec<SearchTermRow> = self.search("query_search_terms", account, &query).await?;
        Ok(rows
            .into_iter()
            .map(|row| row.search_term_view.search_term)
            .filter(|term| !term.is_empty())
            .collect())
    }

    async fn find_shared_list(
        &self,
        account: &AccountId,
        name: &str,
        list_type: SharedListType,
    ) -> PlatformResult<Option<SharedListId>> {
        let query = format!(
            "SELECT shared_set.id FROM shared_set \
             WHERE shared_set.name = {} \
             AND shared_set.type = '{}' \
             AND shared_set.status = 'ENABLED' LIMIT 1",
            gaql_string(name),
            list_type.as_api_str()
        );
        let rows: Vec<SharedSetRow> = self.search("find_shared_list", account, &query).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|row| SharedListId(row.shared_set.id)))
    }

    async fn create_shared_list(
        &self,
        account: &AccountId,
        name: &str,
        list_type: SharedListType,
    ) -> PlatformResult<SharedListId> {
        let body = json!({
            "operations": [{
                "create": { "name": name, "type": list_type.as_api_str() }
            }]
        });
        let response: MutateResponse = self
            .post("create_shared_list", account, "sharedSets:mutate", &body)
            .await?;
        let resource = response
            .results
            .into_iter()
            .next()
            .map(|r| r.resource_name)
            .ok_or_else(|| PlatformError::Decode {
                operation: "create_shared_list".to_string(),
                detail: "mutate response had no results".to_string(),
            })?;
        resource_id(&resource)
            .map(SharedListId)
            .ok_or_else(|| PlatformError::Decode {
                operation: "create_shared_list".to_string(),
                detail: format!("unexpected resource name {resource}"),
            })
    }

    async fn list_criteria_text(
        &self,
        account: &AccountId,
        list: &SharedListId,
    ) -> PlatformResult<Vec<String>> {
        let list_id = numeric_id("list_criteria_text", &list.0)?;
        let query = format!(
            "SELECT shared_criterion.keyword.text FROM shared_criterion \
             WHERE shared_set.id = {list_id}"
        );
        let rows: Vec<SharedCriterionRow> =
            self.search("list_criteria_text", account, &query).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.shared_criterion.keyword)
            .map(|k| k.text)
            .collect())
    }

    async fn create_criteria(
        &self,
        account: &AccountId,
        list: &SharedListId,
        criteria: &[CriterionDraft],
    ) -> PlatformResult<()> {
        if criteria.is_empty() {
            return Ok(());
        }
        let shared_set = format!("customers/{}/sharedSets/{}", account, list);
        let operations: Vec<Value> = criteria
            .iter()
            .map(|c| {
                json!({
                    "create": {
                        "sharedSet": shared_set,
                        "keyword": { "text": c.text, "matchType": c.match_type.as_api_str() }
                    }
                })
            })
            .collect();
        let body = json!({ "operations": operations });
        let _: MutateResponse = self
            .post("create_criteria", account, "sharedCriteria:mutate", &body)
            .await?;
        Ok(())
    }
}

/// Quote a value as a GAQL string literal.
pub fn gaql_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

fn numeric_id<'a>(operation: &str, id: &'a str) -> PlatformResult<&'a str> {
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        Ok(id)
    } else {
        Err(PlatformError::request(
            operation,
            format!("id {id:?} is not numeric"),
        ))
    }
}

/// Trailing id of a resource name like `customers/1/sharedSets/2`.
fn resource_id(resource_name: &str) -> Option<String> {
    resource_name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

fn status_error(operation: &str, status: StatusCode, body: String) -> PlatformError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PlatformError::Auth(format!("{operation} returned {status}: {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS => PlatformError::Quota {
            operation: operation.to_string(),
            detail: body,
        },
        _ => PlatformError::request(operation, format!("{status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaql_string_escapes_quotes() {
        assert_eq!(gaql_string("Competitor Terms"), "'Competitor Terms'");
        assert_eq!(gaql_string("Bob's list"), r"'Bob\'s list'");
        assert_eq!(gaql_string(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_resource_id_takes_trailing_segment() {
        assert_eq!(
            resource_id("customers/123/sharedSets/456").as_deref(),
            Some("456")
        );
        assert_eq!(resource_id("customers/123/sharedSets/"), None);
        assert_eq!(resource_id("garbage"), None);
    }

    #[test]
    fn test_numeric_id_rejects_injection() {
        assert!(numeric_id("op", "12345").is_ok());
        assert!(numeric_id("op", "1 OR 1=1").is_err());
        assert!(numeric_id("op", "").is_err());
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error("search", StatusCode::UNAUTHORIZED, String::new()),
            PlatformError::Auth(_)
        ));
        assert!(matches!(
            status_error("search", StatusCode::TOO_MANY_REQUESTS, String::new()),
            PlatformError::Quota { .. }
        ));
        assert!(matches!(
            status_error("search", StatusCode::BAD_REQUEST, String::new()),
            PlatformError::Request { .. }
        ));
    }

    #[test]
    fn test_search_page_decodes_rows() {
        let raw = r#"{
            "results": [
                {"searchTermView": {"searchTerm": "cheap flights"}},
                {"searchTermView": {"searchTerm": "widget"}}
            ],
            "nextPageToken": "abc"
        }"#;
        let page: SearchPage<SearchTermRow> = serde_json::from_str(raw).unwrap();
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].search_term_view.search_term, "cheap flights");
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_empty_search_page_has_no_results_field() {
        let page: SearchPage<SharedSetRow> = serde_json::from_str("{}").unwrap();
        assert!(page.results.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_criterion_row_without_keyword() {
        let raw = r#"{"sharedCriterion": {}}"#;
        let row: SharedCriterionRow = serde_json::from_str(raw).unwrap();
        assert!(row.shared_criterion.keyword.is_none());
    }
}
