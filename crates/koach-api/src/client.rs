//! HTTP client for the coach backend

use serde::de::DeserializeOwned;

use crate::{
    decode::decode_reply,
    error::{Error, Result},
    profile::ProfileSnapshot,
    types::{AgentInfo, BrandElement, ChatRequest, ResolveResponse, UserNameResponse},
    ReplyEventStream,
};

/// Client for the coach backend: the streaming `/coach` call plus the
/// auxiliary REST reads. Bearer auth, JSON bodies, no retry, no timeout.
pub struct CoachClient {
    http: reqwest::Client,
    host: String,
    api_token: String,
}

impl CoachClient {
    /// Create a new client for a backend host
    pub fn new(host: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: host.into(),
            api_token: api_token.into(),
        }
    }

    /// POST the transcript to `/coach` and decode the streamed reply.
    ///
    /// A non-2xx status is inspected before any stream decoding: the full
    /// error body is read, a JSON `detail` field extracted when present
    /// (raw text otherwise), and an [`Error::Api`] returned. No fragments
    /// are produced in that case.
    pub async fn stream_chat(&self, request: &ChatRequest) -> Result<ReplyEventStream> {
        let url = format!("{}/coach", self.host);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), error_detail(&body)));
        }

        Ok(decode_reply(response.bytes_stream()))
    }

    /// Fetch the agent catalog
    pub async fn list_agents(&self) -> Result<Vec<AgentInfo>> {
        self.get_json("/v1/agents").await
    }

    /// Fetch the brand-element catalog
    pub async fn list_brand_elements(&self) -> Result<Vec<BrandElement>> {
        self.get_json("/v1/brand-elements").await
    }

    /// Fetch a user's current brand profile
    pub async fn fetch_profile(&self, user_id: &str) -> Result<ProfileSnapshot> {
        self.get_json(&format!("/v1/user/{user_id}/profile")).await
    }

    /// Fetch a user's display name, if one has been set
    pub async fn get_user_name(&self, user_id: &str) -> Result<Option<String>> {
        let response: UserNameResponse = self.get_json(&format!("/v1/user/{user_id}/name")).await?;
        Ok(response.name)
    }

    /// Set a user's display name
    pub async fn set_user_name(&self, user_id: &str, name: &str) -> Result<()> {
        let url = format!("{}/v1/user/{user_id}/name", self.host);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), error_detail(&body)));
        }
        Ok(())
    }

    /// Resolve a legacy user id to its canonical id
    pub async fn resolve_user_id(&self, legacy_id: &str) -> Result<String> {
        let response: ResolveResponse = self
            .get_json(&format!("/v1/user/resolve/{legacy_id}"))
            .await?;
        if response.user_id.is_empty() {
            return Err(Error::UnexpectedResponse(format!(
                "no canonical id for legacy user {legacy_id}"
            )));
        }
        Ok(response.user_id)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.host, path);
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), error_detail(&body)));
        }

        Ok(response.json().await?)
    }
}

/// Extract a human-readable message from an error body: the JSON `detail`
/// field when the body is JSON and carries one, the raw text otherwise.
pub fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .and_then(|detail| detail.as_str())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
