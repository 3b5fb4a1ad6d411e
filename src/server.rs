//! HTTP endpoints behind the playlist form.

use crate::session::{clear_cookie, session_cookie, set_cookie, SessionStore};
use crate::spotify::{playlist_url, SpotifyClient, SpotifyError};
use crate::types::{AuthStatus, CreatePlaylistRequest, PlaylistResult};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

pub const DEFAULT_PLAYLIST_NAME: &str = "New Playlist";
pub const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub spotify: Arc<SpotifyClient>,
    pub sessions: Arc<SessionStore>,
}

pub fn router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/", get(login_handler))
        .route("/callback/", get(callback_handler))
        .route("/index", get(index_handler))
        .route("/is_authenticated", get(is_authenticated_handler))
        .route("/create_playlist", post(create_playlist_handler))
        .route("/logout", get(logout_handler))
        .route("/health", get(health_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Access token for the request's session, refreshed if it has expired.
/// `Ok(None)` means there is no usable session.
async fn session_token(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<String>, SpotifyError> {
    let Some(cookie) = session_cookie(headers) else {
        return Ok(None);
    };
    let Some(token) = state.sessions.get(&cookie) else {
        return Ok(None);
    };
    if !token.is_expired() {
        return Ok(Some(token.access_token));
    }

    let Some(refresh_token) = token.refresh_token.as_deref() else {
        info!("Session token expired without refresh token, dropping session");
        state.sessions.remove(&cookie);
        return Ok(None);
    };
    let refreshed = state.spotify.refresh(refresh_token).await?;
    let access_token = refreshed.access_token.clone();
    state.sessions.update(&cookie, refreshed);
    Ok(Some(access_token))
}

fn forget_session(state: &AppState, headers: &HeaderMap) {
    if let Some(cookie) = session_cookie(headers) {
        state.sessions.remove(&cookie);
    }
}

async fn login_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    forget_session(&state, &headers);
    let auth_url = state.spotify.authorize_url();
    info!("Redirecting to Spotify authorization");
    (
        [(header::SET_COOKIE, clear_cookie())],
        Redirect::to(&auth_url),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
}

fn error_page(status: StatusCode, title: &str, detail: &str) -> Response {
    let body = format!(
        r#"
        <html>
            <body>
                <h1>{}</h1>
                <p>{}</p>
                <p><a href="/">Try again</a></p>
            </body>
        </html>
        "#,
        escape_html(title),
        escape_html(detail)
    );
    (status, Html(body)).into_response()
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn callback_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    forget_session(&state, &headers);

    if let Some(error) = params.error {
        warn!("Spotify authorization denied: {}", error);
        return error_page(StatusCode::BAD_REQUEST, "Authorization Error", &error);
    }
    let Some(code) = params.code else {
        return error_page(
            StatusCode::BAD_REQUEST,
            "No code received",
            "Please try again.",
        );
    };

    let token = match state.spotify.exchange_code(&code).await {
        Ok(token) => token,
        Err(e) => {
            error!("Failed to exchange authorization code: {}", e);
            return error_page(StatusCode::BAD_GATEWAY, "Login failed", &e.to_string());
        }
    };

    match state.spotify.current_user(&token.access_token).await {
        Ok(user) => info!("Logged in user ID: {}", user.id),
        Err(e) => {
            error!("Failed to fetch user info: {}", e);
            return error_page(StatusCode::BAD_GATEWAY, "Login failed", &e.to_string());
        }
    }

    let cookie = state.sessions.create(token);
    (
        [(header::SET_COOKIE, set_cookie(&cookie))],
        Redirect::to("/index"),
    )
        .into_response()
}

fn auth_failure(e: SpotifyError) -> (StatusCode, Json<AuthStatus>) {
    error!("Error in /is_authenticated: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AuthStatus {
            authenticated: false,
            user_name: None,
            error: Some(e.to_string()),
        }),
    )
}

async fn is_authenticated_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> (StatusCode, Json<AuthStatus>) {
    let access_token = match session_token(&state, &headers).await {
        Ok(Some(token)) => token,
        Ok(None) => return (StatusCode::OK, Json(AuthStatus::default())),
        Err(e) => return auth_failure(e),
    };

    match state.spotify.current_user(&access_token).await {
        Ok(user) => {
            debug!("Authenticated user ID: {}", user.id);
            (
                StatusCode::OK,
                Json(AuthStatus {
                    authenticated: true,
                    user_name: Some(user.name().to_string()),
                    error: None,
                }),
            )
        }
        Err(e) => auth_failure(e),
    }
}

fn playlist_failure(status: StatusCode, message: &str) -> (StatusCode, Json<PlaylistResult>) {
    (status, Json(PlaylistResult::failed(message)))
}

async fn create_playlist_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreatePlaylistRequest>, JsonRejection>,
) -> (StatusCode, Json<PlaylistResult>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected playlist request: {}", rejection);
            return playlist_failure(rejection.status(), &rejection.body_text());
        }
    };

    let access_token = match session_token(&state, &headers).await {
        Ok(Some(token)) => token,
        Ok(None) => return playlist_failure(StatusCode::UNAUTHORIZED, "User not authenticated"),
        Err(e) => {
            warn!("Session refresh failed: {}", e);
            return playlist_failure(StatusCode::UNAUTHORIZED, "User not authenticated");
        }
    };

    let user = match state.spotify.current_user(&access_token).await {
        Ok(user) => user,
        Err(e) => {
            error!("Failed to fetch user info: {}", e);
            return playlist_failure(e.status_code(), "Failed to fetch Spotify user");
        }
    };

    let name = request
        .playlist_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_PLAYLIST_NAME);

    let playlist_id = match state
        .spotify
        .create_playlist(&access_token, &user.id, name)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            error!("Failed to create playlist: {}", e);
            return playlist_failure(e.status_code(), "Failed to create playlist");
        }
    };

    let mut track_uris = Vec::new();
    for entry in &request.songs {
        match state
            .spotify
            .search_track(&access_token, &entry.song, &entry.artist)
            .await
        {
            Ok(Some(uri)) => track_uris.push(uri),
            Ok(None) => debug!("No match for {:?} / {:?}", entry.song, entry.artist),
            Err(e) => warn!("Search for {:?} failed: {}", entry.song, e),
        }
    }
    info!(
        "Matched {} of {} song(s) for playlist {}",
        track_uris.len(),
        request.songs.len(),
        playlist_id
    );

    if !track_uris.is_empty() {
        if let Err(e) = state
            .spotify
            .add_tracks(&access_token, &playlist_id, &track_uris)
            .await
        {
            error!("Failed to add tracks to playlist: {}", e);
            return playlist_failure(e.status_code(), "Failed to add tracks to playlist");
        }
    }

    (
        StatusCode::CREATED,
        Json(PlaylistResult::created(playlist_url(&playlist_id))),
    )
}

async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    forget_session(&state, &headers);
    info!("Logged out");
    (
        [(header::SET_COOKIE, clear_cookie())],
        Json(json!({ "message": "Logged out successfully" })),
    )
        .into_response()
}
