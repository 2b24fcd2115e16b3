use reqwest::{Method, RequestBuilder, Response, StatusCode, multipart};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, SESSION_EXPIRED_MESSAGE};
use crate::storage::TokenStore;

/// Raised by the HTTP layer, consumed by whoever owns the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A request carrying a token came back 401. The token is already gone.
    Expired { message: String },
}

pub fn session_events() -> broadcast::Sender<SessionEvent> {
    broadcast::channel(16).0
}

/// REST client for the portal API.
///
/// Attaches the stored bearer token to every request. A 401 wipes the token
/// and cached user and, when a token had been sent, announces
/// [`SessionEvent::Expired`].
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
    events: broadcast::Sender<SessionEvent>,
}

impl HttpClient {
    pub fn new(
        config: &ClientConfig,
        tokens: TokenStore,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
            events,
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.send(Method::GET, path, |b| b).await?;
        decode(resp).await
    }

    pub async fn get_json_with_query<Q, T>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.send(Method::GET, path, |b| b.query(query)).await?;
        decode(resp).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.send(Method::POST, path, |b| b.json(body)).await?;
        decode(resp).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.send(Method::PUT, path, |b| b.json(body)).await?;
        decode(resp).await
    }

    /// `application/x-www-form-urlencoded` POST.
    pub async fn post_form<B, T>(&self, path: &str, form: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.send(Method::POST, path, |b| b.form(form)).await?;
        decode(resp).await
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: multipart::Form,
    ) -> Result<T, ClientError> {
        let resp = self.send(Method::POST, path, move |b| b.multipart(form)).await?;
        decode(resp).await
    }

    /// PATCH with no body; any 2xx is success.
    pub async fn patch(&self, path: &str) -> Result<(), ClientError> {
        self.send(Method::PATCH, path, |b| b).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(Method::DELETE, path, |b| b).await?;
        Ok(())
    }

    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let resp = self.send(Method::GET, path, |b| b).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn send<F>(&self, method: Method, path: &str, build: F) -> Result<Response, ClientError>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let url = format!("{}{}", self.base_url, path);
        let token = self.tokens.get();

        let mut builder = self.http.request(method.clone(), &url);
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }

        let resp = build(builder).send().await.map_err(|e| {
            warn!("{} {} failed: {}", method, path, e);
            ClientError::Http(e)
        })?;

        let status = resp.status();
        if status.is_success() {
            debug!("{} {} -> {}", method, path, status);
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = server_message(&body);
        warn!("{} {} -> {}: {}", method, path, status, message);

        if status == StatusCode::UNAUTHORIZED {
            self.tokens.clear();
            if token.is_some() {
                let _ = self.events.send(SessionEvent::Expired {
                    message: SESSION_EXPIRED_MESSAGE.to_string(),
                });
                return Err(ClientError::Unauthorized(SESSION_EXPIRED_MESSAGE.to_string()));
            }
            let message = if message.is_empty() {
                "Invalid credentials".to_string()
            } else {
                message
            };
            return Err(ClientError::Unauthorized(message));
        }

        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// Empty bodies decode as `{}`, so message-only endpoints may answer with
/// nothing at all.
async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
    let bytes = resp.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_str("{}")?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Pull a human-readable message out of an error body: the JSON `message`
/// (or `error`) field when present, else the raw text.
fn server_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    body.trim().chars().take(200).collect()
}

/// Percent-encode one URL path segment.
pub fn path_segment(segment: &str) -> String {
    let mut url = reqwest::Url::parse("http://localhost/").expect("static URL parses");
    url.path_segments_mut()
        .expect("http URLs have a path")
        .push(segment);
    url.path()[1..].to_string()
}
