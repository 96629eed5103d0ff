//! Thin HTTP adapter for the platform ports.
//!
//! Pure plumbing: build the request, map the status code, deserialize the
//! payload. No retry or backoff here — failures are classified by the
//! caller through [`crate::ratelimit`].

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::pipeline::types::Message;
use crate::platform::{ApiError, Fetcher, MicroblogApi, RateLimitStatus};

/// Default platform endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.micro.blog/1";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire shape of a status in the platform's JSON feeds.
#[derive(Debug, Deserialize)]
struct WireStatus {
    id: u64,
    text: String,
    user: WireUser,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    screen_name: String,
}

impl From<WireStatus> for Message {
    fn from(w: WireStatus) -> Self {
        Message::new(w.id, w.user.screen_name, w.text)
    }
}

#[derive(Debug, Deserialize)]
struct WireFollowerPage {
    users: Vec<WireUser>,
}

/// REST adapter for [`MicroblogApi`] and [`Fetcher`].
pub struct HttpApi {
    client: reqwest::Client,
    base: String,
    key: SecretString,
    secret: SecretString,
}

impl HttpApi {
    pub fn new(base: impl Into<String>, key: SecretString, secret: SecretString) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base: base.into(),
            key,
            secret,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base.trim_end_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let resp = self
            .client
            .get(self.url(path))
            .query(query)
            .basic_auth(
                self.key.expose_secret(),
                Some(self.secret.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16()));
        }
        resp.json::<T>()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.url(path))
            .form(form)
            .basic_auth(
                self.key.expose_secret(),
                Some(self.secret.expose_secret()),
            )
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16()));
        }
        Ok(())
    }

    async fn statuses(
        &self,
        path: &str,
        since_id: u64,
    ) -> Result<Vec<Message>, ApiError> {
        let wire: Vec<WireStatus> = self
            .get_json(path, &[("since_id", since_id.to_string())])
            .await?;
        Ok(wire.into_iter().map(Message::from).collect())
    }
}

#[async_trait]
impl MicroblogApi for HttpApi {
    async fn mentions_since(&self, since_id: u64) -> Result<Vec<Message>, ApiError> {
        self.statuses("statuses/mentions.json", since_id).await
    }

    async fn timeline_since(&self, since_id: u64) -> Result<Vec<Message>, ApiError> {
        self.statuses("statuses/home_timeline.json", since_id).await
    }

    async fn post_update(&self, text: &str, in_reply_to: Option<u64>) -> Result<(), ApiError> {
        let mut form = vec![("status", text.to_string())];
        if let Some(id) = in_reply_to {
            form.push(("in_reply_to_status_id", id.to_string()));
        }
        self.post_form("statuses/update.json", &form).await
    }

    async fn follow(&self, user: &str) -> Result<(), ApiError> {
        self.post_form(
            "friendships/create.json",
            &[("screen_name", user.to_string())],
        )
        .await
    }

    async fn unfollow(&self, user: &str) -> Result<(), ApiError> {
        self.post_form(
            "friendships/destroy.json",
            &[("screen_name", user.to_string())],
        )
        .await
    }

    async fn followers_page(
        &self,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<String>, ApiError> {
        let wire: WireFollowerPage = self
            .get_json(
                "followers/list.json",
                &[
                    ("page", page.to_string()),
                    ("count", per_page.to_string()),
                ],
            )
            .await?;
        Ok(wire.users.into_iter().map(|u| u.screen_name).collect())
    }

    async fn rate_limit_status(&self) -> Result<RateLimitStatus, ApiError> {
        self.get_json("account/rate_limit_status.json", &[]).await
    }

    async fn own_last_status_id(&self) -> Result<Option<u64>, ApiError> {
        let wire: Vec<WireStatus> = self
            .get_json("statuses/user_timeline.json", &[("count", "1".to_string())])
            .await?;
        Ok(wire.first().map(|w| w.id))
    }
}

#[async_trait]
impl Fetcher for HttpApi {
    async fn fetch(&self, url: &str) -> Result<String, ApiError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::from_status(status.as_u16()));
        }
        resp.text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_status_deserializes_into_message() {
        let wire: WireStatus = serde_json::from_str(
            r#"{"id": 42, "text": "hello there", "user": {"screen_name": "alice"}}"#,
        )
        .unwrap();
        let msg = Message::from(wire);
        assert_eq!(msg.id, 42);
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.text, "hello there");
    }

    #[test]
    fn url_joins_without_double_slash() {
        let api = HttpApi::new(
            "https://api.example.net/1/",
            SecretString::from("k".to_string()),
            SecretString::from("s".to_string()),
        );
        assert_eq!(
            api.url("statuses/update.json"),
            "https://api.example.net/1/statuses/update.json"
        );
    }
}
