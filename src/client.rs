use crate::types::{AuthStatus, CreatePlaylistRequest, PlaylistResult};
use serde::de::DeserializeOwned;
use tracing::debug;

#[derive(Debug)]
pub enum ClientError {
    Network(String),
    Decode(String),
    #[cfg_attr(target_arch = "wasm32", allow(dead_code))]
    Other(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Network(msg) => write!(f, "Network error: {}", msg),
            ClientError::Decode(msg) => write!(f, "Invalid response: {}", msg),
            ClientError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

/// The three endpoints the page talks to.
///
/// HTTP status codes are not errors here: the server answers failures with a
/// JSON body, and the body decides what the page shows.
#[allow(async_fn_in_trait)]
pub trait Backend: 'static {
    async fn is_authenticated(&self) -> Result<AuthStatus, ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;
    async fn create_playlist(
        &self,
        request: &CreatePlaylistRequest,
    ) -> Result<PlaylistResult, ClientError>;
}

pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Sends `session` as the login cookie on every request. Browsers attach
    /// cookies themselves; this is for native callers.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn with_session_cookie(
        base_url: impl Into<String>,
        session: &str,
    ) -> Result<Self, ClientError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let cookie = format!("{}={}", crate::session::SESSION_COOKIE_NAME, session);
        let value = reqwest::header::HeaderValue::from_str(&cookie)
            .map_err(|e| ClientError::Other(format!("Invalid session cookie: {}", e)))?;
        headers.insert(reqwest::header::COOKIE, value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Other(format!("Client setup failed: {}", e)))?;
        Ok(Self::with_client(base_url, client))
    }

    fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(format!("Read failed: {}", e)))?;
        debug!("Response {}: {}", status, text);
        serde_json::from_str(&text).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

impl Backend for HttpBackend {
    async fn is_authenticated(&self) -> Result<AuthStatus, ClientError> {
        let response = self
            .client
            .get(self.url("/is_authenticated"))
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;
        Self::read_json(response).await
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.client
            .get(self.url("/logout"))
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;
        Ok(())
    }

    async fn create_playlist(
        &self,
        request: &CreatePlaylistRequest,
    ) -> Result<PlaylistResult, ClientError> {
        let response = self
            .client
            .post(self.url("/create_playlist"))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(format!("Request failed: {}", e)))?;
        Self::read_json(response).await
    }
}
