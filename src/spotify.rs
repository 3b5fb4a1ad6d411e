use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
pub const PLAYLIST_SCOPE: &str = "playlist-modify-private";
pub const PLAYLIST_DESCRIPTION: &str = "Created with Spotify Playlist Maker";
/// Spotify accepts at most this many URIs per add-items request.
const MAX_URIS_PER_REQUEST: usize = 100;

/// Tokens for one logged-in user.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Instant,
}

impl TokenInfo {
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_token_info(self, previous_refresh_token: Option<&str>) -> TokenInfo {
        // Expire 60 seconds early so a token is never used right at the edge.
        let expires_at = Instant::now() + Duration::from_secs(self.expires_in.saturating_sub(60));
        TokenInfo {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous_refresh_token.map(str::to_string)),
            expires_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

impl SpotifyUser {
    /// Display name, or the user id for accounts without one.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Serialize)]
struct CreatePlaylistBody<'a> {
    name: &'a str,
    description: &'a str,
    public: bool,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
}

#[derive(Debug, Serialize)]
struct AddTracksRequest<'a> {
    uris: &'a [String],
}

#[derive(Debug)]
pub enum SpotifyError {
    Network(String),
    Auth(String),
    Api(u16, String),
}

impl std::fmt::Display for SpotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpotifyError::Network(msg) => write!(f, "Network error: {}", msg),
            SpotifyError::Auth(msg) => write!(f, "Auth error: {}", msg),
            SpotifyError::Api(status, msg) => write!(f, "API error ({}): {}", status, msg),
        }
    }
}

impl std::error::Error for SpotifyError {}

impl SpotifyError {
    /// Status to answer the browser with when this error ends a request.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SpotifyError::Network(_) => StatusCode::BAD_GATEWAY,
            SpotifyError::Auth(_) => StatusCode::UNAUTHORIZED,
            SpotifyError::Api(status, _) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
        }
    }
}

pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    accounts_url: String,
    api_url: String,
    client: reqwest::Client,
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self::with_base_urls(
            client_id,
            client_secret,
            redirect_uri,
            SPOTIFY_ACCOUNTS_URL.to_string(),
            SPOTIFY_API_URL.to_string(),
        )
    }

    pub fn with_base_urls(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        accounts_url: String,
        api_url: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            accounts_url,
            api_url,
            client: reqwest::Client::new(),
        }
    }

    /// Where the browser goes to grant access.
    pub fn authorize_url(&self) -> String {
        format!(
            "{}/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}",
            self.accounts_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(PLAYLIST_SCOPE)
        )
    }

    async fn request_token(
        &self,
        params: &[(&str, &str)],
        previous_refresh_token: Option<&str>,
    ) -> Result<TokenInfo, SpotifyError> {
        let auth = BASE64_STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let url = format!("{}/api/token", self.accounts_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {}", auth))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(params)
            .send()
            .await
            .map_err(|e| SpotifyError::Network(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SpotifyError::Auth(format!(
                "Token request failed: {} - {}",
                status, text
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| SpotifyError::Network(format!("Parse failed: {}", e)))?;

        Ok(token_response.into_token_info(previous_refresh_token))
    }

    /// Trades an authorization code from the callback for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenInfo, SpotifyError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        self.request_token(&params, None).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenInfo, SpotifyError> {
        info!("Refreshing Spotify access token");
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.request_token(&params, Some(refresh_token)).await
    }

    async fn api_error(operation: &str, response: reqwest::Response) -> SpotifyError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        warn!("Spotify {} failed: {} {}", operation, status, text);
        SpotifyError::Api(status.as_u16(), format!("{} failed: {}", operation, text))
    }

    pub async fn current_user(&self, access_token: &str) -> Result<SpotifyUser, SpotifyError> {
        let response = self
            .client
            .get(format!("{}/me", self.api_url))
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await
            .map_err(|e| SpotifyError::Network(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::api_error("Fetch user", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| SpotifyError::Network(format!("Parse failed: {}", e)))
    }

    /// Creates an empty private playlist and returns its id.
    pub async fn create_playlist(
        &self,
        access_token: &str,
        user_id: &str,
        name: &str,
    ) -> Result<String, SpotifyError> {
        let body = CreatePlaylistBody {
            name,
            description: PLAYLIST_DESCRIPTION,
            public: false,
        };

        let response = self
            .client
            .post(format!(
                "{}/users/{}/playlists",
                self.api_url,
                urlencoding::encode(user_id)
            ))
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| SpotifyError::Network(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::api_error("Create playlist", response).await);
        }

        let created: CreatedPlaylist = response
            .json()
            .await
            .map_err(|e| SpotifyError::Network(format!("Parse failed: {}", e)))?;
        info!("Created playlist {} for user {}", created.id, user_id);
        Ok(created.id)
    }

    /// Best match track URI for `song`, narrowed by `artist` when non-empty.
    pub async fn search_track(
        &self,
        access_token: &str,
        song: &str,
        artist: &str,
    ) -> Result<Option<String>, SpotifyError> {
        let mut query = format!("track:{}", song);
        if !artist.is_empty() {
            query.push_str(&format!(" artist:{}", artist));
        }

        let response = self
            .client
            .get(format!("{}/search", self.api_url))
            .header("Authorization", format!("Bearer {}", access_token))
            .query(&[("q", query.as_str()), ("type", "track"), ("limit", "1")])
            .send()
            .await
            .map_err(|e| SpotifyError::Network(format!("Search failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::api_error("Search", response).await);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SpotifyError::Network(format!("Parse failed: {}", e)))?;

        let uri = json
            .get("tracks")
            .and_then(|t| t.get("items"))
            .and_then(|i| i.as_array())
            .and_then(|a| a.first())
            .and_then(|t| t.get("uri"))
            .and_then(|uri| uri.as_str())
            .map(|s| s.to_string());

        match &uri {
            Some(uri) => debug!("Spotify search {:?} -> {}", query, uri),
            None => debug!("Spotify search {:?} found nothing", query),
        }
        Ok(uri)
    }

    pub async fn add_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError> {
        for chunk in uris.chunks(MAX_URIS_PER_REQUEST) {
            let response = self
                .client
                .post(format!(
                    "{}/playlists/{}/tracks",
                    self.api_url,
                    urlencoding::encode(playlist_id)
                ))
                .header("Authorization", format!("Bearer {}", access_token))
                .header("Content-Type", "application/json")
                .json(&AddTracksRequest { uris: chunk })
                .send()
                .await
                .map_err(|e| SpotifyError::Network(format!("Request failed: {}", e)))?;

            if !response.status().is_success() {
                return Err(Self::api_error("Add tracks", response).await);
            }
        }
        info!("Added {} track(s) to playlist {}", uris.len(), playlist_id);
        Ok(())
    }
}

pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://open.spotify.com/playlist/{}", playlist_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client(server: &mockito::ServerGuard) -> SpotifyClient {
        SpotifyClient::with_base_urls(
            "id".to_string(),
            "secret".to_string(),
            "http://127.0.0.1:3000/callback/".to_string(),
            server.url(),
            format!("{}/v1", server.url()),
        )
    }

    #[tokio::test]
    async fn authorize_url_carries_client_and_scope() {
        let server = mockito::Server::new_async().await;
        let url = client(&server).authorize_url();
        assert!(url.starts_with(&format!("{}/authorize?response_type=code", server.url())));
        assert!(url.contains("client_id=id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A3000%2Fcallback%2F"));
        assert!(url.contains("scope=playlist-modify-private"));
    }

    #[tokio::test]
    async fn exchange_code_uses_basic_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/token")
            .match_header("authorization", "Basic aWQ6c2VjcmV0")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                Matcher::UrlEncoded("code".into(), "abc".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"at","expires_in":3600,"refresh_token":"rt"}"#)
            .create_async()
            .await;

        let token = client(&server).exchange_code("abc").await.unwrap();
        assert_eq!(token.access_token, "at");
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
        assert!(!token.is_expired());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn refresh_keeps_previous_refresh_token() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/api/token")
            .match_body(Matcher::UrlEncoded(
                "grant_type".into(),
                "refresh_token".into(),
            ))
            .with_status(200)
            .with_body(r#"{"access_token":"fresh","expires_in":3600}"#)
            .create_async()
            .await;

        let token = client(&server).refresh("rt").await.unwrap();
        assert_eq!(token.access_token, "fresh");
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
    }

    #[tokio::test]
    async fn rejected_code_is_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/api/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let err = client(&server).exchange_code("bad").await.unwrap_err();
        assert!(matches!(err, SpotifyError::Auth(_)));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn search_builds_track_and_artist_query() {
        let mut server = mockito::Server::new_async().await;
        let _found = server
            .mock("GET", "/v1/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "track:Imagine artist:John Lennon".into()),
                Matcher::UrlEncoded("type".into(), "track".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"tracks":{"items":[{"uri":"spotify:track:7pKfPomDEeI4TPT6EOYjn9"}]}}"#)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/v1/search")
            .match_query(Matcher::UrlEncoded("q".into(), "track:Nothing".into()))
            .with_status(200)
            .with_body(r#"{"tracks":{"items":[]}}"#)
            .create_async()
            .await;

        let spotify = client(&server);
        assert_eq!(
            spotify
                .search_track("at", "Imagine", "John Lennon")
                .await
                .unwrap()
                .as_deref(),
            Some("spotify:track:7pKfPomDEeI4TPT6EOYjn9")
        );
        assert_eq!(spotify.search_track("at", "Nothing", "").await.unwrap(), None);
    }

    #[tokio::test]
    async fn create_playlist_failure_keeps_upstream_status() {
        let mut server = mockito::Server::new_async().await;
        let _create = server
            .mock("POST", "/v1/users/alex/playlists")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "name": "Mix",
                "description": PLAYLIST_DESCRIPTION,
                "public": false
            })))
            .with_status(403)
            .with_body(r#"{"error":{"status":403,"message":"Insufficient client scope"}}"#)
            .create_async()
            .await;

        let err = client(&server)
            .create_playlist("at", "alex", "Mix")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn add_tracks_splits_into_chunks() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/playlists/abc/tracks")
            .with_status(201)
            .with_body(r#"{"snapshot_id":"s"}"#)
            .expect(3)
            .create_async()
            .await;

        let uris: Vec<String> = (0..250).map(|i| format!("spotify:track:{}", i)).collect();
        client(&server).add_tracks("at", "abc", &uris).await.unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn user_name_falls_back_to_id() {
        let user = SpotifyUser {
            id: "alex123".to_string(),
            display_name: None,
        };
        assert_eq!(user.name(), "alex123");
    }
}
