//! An HTTP client against a GitHub-shaped repository API: `GET
//! {base_url}/repos/{owner}/{name}` resolves iff the repo exists and the
//! caller's token (if any) is authorized to see it.

use std::time::Duration;

use anyhow::{Context, Result};
use peasant_types::{Credentials, SourceHostClient};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("peasant/", env!("CARGO_PKG_VERSION"));

pub struct HttpSourceHostClient {
    base_url: String,
    account: String,
    credentials: Credentials,
    http: reqwest::Client,
}

impl HttpSourceHostClient {
    pub fn new(base_url: impl Into<String>, account: impl Into<String>, credentials: Credentials) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("reqwest client builder with static config cannot fail");

        Self {
            base_url: base_url.into(),
            account: account.into(),
            credentials,
            http,
        }
    }
}

#[async_trait::async_trait]
impl SourceHostClient for HttpSourceHostClient {
    async fn repo_accessible(&self, owner: &str, name: &str) -> Result<bool> {
        let url = format!("{}/repos/{owner}/{name}", self.base_url.trim_end_matches('/'));

        let mut request = self.http.get(&url);
        if let Some(token) = self.credentials.token() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("failed to reach source host at {url}"))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::UNAUTHORIZED => Ok(false),
            status => Err(anyhow::anyhow!("unexpected status {status} from {url}")),
        }
    }

    fn own_account(&self) -> &str {
        &self.account
    }

    fn credentials(&self) -> Credentials {
        self.credentials.clone()
    }
}
