// HTTP adapter for the platform gateway sidecar. The gateway keeps the
// realtime connection to the chat platform and exposes roster, role and
// message operations as plain REST.
use crate::config::PlatformConfig;
use crate::platform::adapter::PlatformAdapter;
use crate::platform::types::{Guild, PlatformError, RosterMember};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

pub struct GatewayAdapter {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl GatewayAdapter {
    pub fn new(config: &PlatformConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_s.max(1)))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config
                .token
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| value.to_string()),
        }
    }

    async fn request(&self, method: Method, path: &str) -> Result<Response, PlatformError> {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self.http.request(method, &url);
        if let Some(token) = self.token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| PlatformError::Transient(err.to_string()))?;
        classify_status(response)
    }

    async fn request_json(&self, method: Method, path: &str) -> Result<Value, PlatformError> {
        let response = self.request(method, path).await?;
        response
            .json::<Value>()
            .await
            .map_err(|err| PlatformError::Other(format!("invalid gateway payload: {err}")))
    }
}

fn classify_status(response: Response) -> Result<Response, PlatformError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = format!("{} {}", status.as_u16(), response.url().path());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PlatformError::Permission(detail)),
        StatusCode::NOT_FOUND => Err(PlatformError::NotFound(detail)),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            Err(PlatformError::Transient(detail))
        }
        _ if status.is_server_error() => Err(PlatformError::Transient(detail)),
        _ => Err(PlatformError::Other(detail)),
    }
}

/// Accepts both a bare JSON array and an object wrapping one, so the gateway
/// is free to add envelope fields later.
fn extract_array(payload: Value, key: &str) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[async_trait]
impl PlatformAdapter for GatewayAdapter {
    async fn list_guilds(&self) -> Result<Vec<Guild>, PlatformError> {
        let payload = self.request_json(Method::GET, "/api/guilds").await?;
        let guilds = extract_array(payload, "guilds")
            .into_iter()
            .filter_map(|item| serde_json::from_value::<Guild>(item).ok())
            .filter(|guild| !guild.id.trim().is_empty())
            .collect();
        Ok(guilds)
    }

    async fn list_members(&self, guild_id: &str) -> Result<Vec<RosterMember>, PlatformError> {
        let payload = self
            .request_json(Method::GET, &format!("/api/guilds/{guild_id}/members"))
            .await?;
        let members = extract_array(payload, "members")
            .into_iter()
            .filter_map(|item| serde_json::from_value::<RosterMember>(item).ok())
            .filter(|member| !member.id.trim().is_empty())
            .collect();
        Ok(members)
    }

    async fn grant_role(
        &self,
        guild_id: &str,
        member_id: &str,
        role: &str,
    ) -> Result<(), PlatformError> {
        self.request(
            Method::PUT,
            &format!("/api/guilds/{guild_id}/members/{member_id}/roles/{role}"),
        )
        .await?;
        Ok(())
    }

    async fn revoke_role(
        &self,
        guild_id: &str,
        member_id: &str,
        role: &str,
    ) -> Result<(), PlatformError> {
        self.request(
            Method::DELETE,
            &format!("/api/guilds/{guild_id}/members/{member_id}/roles/{role}"),
        )
        .await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), PlatformError> {
        self.request(
            Method::DELETE,
            &format!("/api/channels/{channel_id}/messages/{message_id}"),
        )
        .await?;
        Ok(())
    }
}
