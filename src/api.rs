use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid token")]
    InvalidToken,
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
}

/// A message addressed by channel and id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub premium_type: Option<u8>,
}

/// Request/response calls for editing and deleting single messages.
#[derive(Clone)]
pub struct MessageApi {
    client: Client,
    base_url: String,
    token: String,
}

impl MessageApi {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(AUTHORIZATION, &self.token)
    }

    fn message_url(&self, msg: &MessageRef) -> String {
        format!(
            "{}/channels/{}/messages/{}",
            self.base_url, msg.channel_id, msg.id
        )
    }

    /// Fetches the account behind the token; rejects invalid tokens.
    pub async fn current_user(&self) -> Result<CurrentUser, ApiError> {
        let url = format!("{}/users/@me", self.base_url);
        let resp = self.authorized(self.client.get(&url)).send().await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(ApiError::InvalidToken);
        }
        Ok(check(resp).await?.json().await?)
    }

    pub async fn edit(&self, msg: &MessageRef, content: &str) -> Result<(), ApiError> {
        let builder = self
            .client
            .patch(self.message_url(msg))
            .json(&json!({ "content": content }));
        check(self.authorized(builder).send().await?).await?;
        Ok(())
    }

    pub async fn delete(&self, msg: &MessageRef) -> Result<(), ApiError> {
        let builder = self.client.delete(self.message_url(msg));
        check(self.authorized(builder).send().await?).await?;
        Ok(())
    }
}

async fn check(resp: Response) -> Result<Response, ApiError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(ApiError::Server { status, body })
}
