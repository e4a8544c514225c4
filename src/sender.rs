//! Create-space request: POST `{name, owner}` to `<base_url>/spaces` and dispatch on the status.
//!
//! 2xx logs the created space, 401 navigates to the login page, anything else (and transport
//! failures) is logged as an error. Nothing is returned to the caller.

use crate::client::build_request;
use crate::config::ApiConfig;
use crate::effects::{Console, Navigator};
use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

/// Body of `POST /spaces`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateSpaceRequest {
    pub name: String,
    pub owner: String,
}

/// Fields of the created space the client reads back. Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSpace {
    pub name: String,
    pub uri: String,
}

pub struct RequestSender {
    client: Client,
    api: ApiConfig,
    console: Arc<dyn Console>,
    navigator: Arc<dyn Navigator>,
}

impl RequestSender {
    pub fn new(
        client: Client,
        api: ApiConfig,
        console: Arc<dyn Console>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            client,
            api,
            console,
            navigator,
        }
    }

    /// The request that [`create_space`](Self::create_space) would send.
    pub fn prepare(&self, name: &str, owner: &str) -> anyhow::Result<reqwest::Request> {
        let body = CreateSpaceRequest {
            name: name.to_string(),
            owner: owner.to_string(),
        };
        build_request(&self.client, &self.api, &self.api.spaces_url(), &body)
    }

    /// Send one create-space request. Outcomes go to the console or the navigator.
    #[instrument(skip(self))]
    pub async fn create_space(&self, name: &str, owner: &str) {
        match self.send(name, owner).await {
            Ok(Some(space)) => {
                tracing::info!(name = %space.name, uri = %space.uri, "space created");
                self.console
                    .log(&format!("Created space: {} {}", space.name, space.uri));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "create space failed");
                self.console.error(&format!("Error: {:#}", e));
            }
        }
    }

    /// `Ok(None)` when the page was sent to the login page.
    async fn send(&self, name: &str, owner: &str) -> anyhow::Result<Option<CreatedSpace>> {
        let req = self.prepare(name, owner)?;
        let url = req.url().to_string();
        tracing::debug!(%url, "sending create space request");
        let response = self
            .client
            .execute(req)
            .await
            .context("create space request")?;
        let status = response.status();
        if status.is_success() {
            let space = response
                .json::<CreatedSpace>()
                .await
                .context("parse create space response")?;
            return Ok(Some(space));
        }
        if status == StatusCode::UNAUTHORIZED {
            tracing::info!(%url, login_page = %self.api.login_page, "401 Unauthorized, redirecting to login");
            self.navigator.replace(&self.api.login_page);
            return Ok(None);
        }
        // 4xx and 5xx share one path; the class is only recorded on the event.
        tracing::debug!(
            %url,
            status = status.as_u16(),
            server_error = status.is_server_error(),
            "create space rejected"
        );
        let wire_reason = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .and_then(|r| std::str::from_utf8(r.as_bytes()).ok())
            .map(str::to_string);
        anyhow::bail!("{}", status_text(status, wire_reason.as_deref()))
    }
}

/// Status text as sent by the server; else the canonical reason, else the bare code.
fn status_text(status: StatusCode, wire_reason: Option<&str>) -> String {
    wire_reason
        .filter(|r| !r.trim().is_empty())
        .or_else(|| status.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}
