use datakit_config::shared::CrmConfig;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Session minted by the OAuth2 password grant.
#[derive(Debug, Clone, Deserialize)]
struct Session {
    access_token: String,
    instance_url: String,
}

/// One page of query results.
///
/// Records come back as raw JSON objects since every SOQL query has its own
/// shape; callers deserialize the fields they asked for.
#[derive(Debug, Deserialize)]
pub struct QueryResponse {
    #[serde(rename = "totalSize")]
    pub total_size: i64,
    pub done: bool,
    pub records: Vec<serde_json::Value>,
}

/// CRM REST client authenticating with the OAuth2 password grant.
///
/// The session is fetched lazily on the first query and reused afterwards;
/// [`CrmClient::authenticate`] forces a refresh when a token expires.
#[derive(Debug)]
pub struct CrmClient {
    client: Client,
    config: CrmConfig,
    session: RwLock<Option<Session>>,
}

impl CrmClient {
    pub fn new(config: &CrmConfig) -> CrmClient {
        CrmClient {
            client: Client::new(),
            config: config.clone(),
            session: RwLock::new(None),
        }
    }

    /// Exchanges the configured credentials for a fresh session.
    pub async fn authenticate(&self) -> Result<(), CrmError> {
        let url = format!("{}/services/oauth2/token", self.config.base_url);

        let params = [
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("username", self.config.username.as_str()),
            ("password", self.config.password.expose_secret()),
        ];

        let response = self.client.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(CrmError::AuthenticationFailed(error_text));
        }

        let session: Session = response.json().await?;

        info!(instance_url = %session.instance_url, "crm session established");

        *self.session.write().await = Some(session);

        Ok(())
    }

    /// Runs a SOQL query and returns the first page of results.
    pub async fn query(&self, soql: &str) -> Result<QueryResponse, CrmError> {
        let session = self.current_session().await?;

        let url = format!(
            "{}/services/data/{}/query",
            session.instance_url, self.config.api_version
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.access_token)
            .query(&[("q", soql)])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(CrmError::QueryFailed(error_text));
        }

        Ok(response.json().await?)
    }

    async fn current_session(&self) -> Result<Session, CrmError> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.clone());
        }

        self.authenticate().await?;

        self.session
            .read()
            .await
            .clone()
            .ok_or_else(|| CrmError::AuthenticationFailed("no session after login".to_owned()))
    }
}
