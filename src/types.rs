use serde::{Deserialize, Serialize};

/// One song to look up, optionally narrowed by artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongEntry {
    pub song: String,
    #[serde(default)]
    pub artist: String,
}

impl SongEntry {
    /// Trims both fields. Returns `None` when the song is blank.
    pub fn new(song: &str, artist: &str) -> Option<Self> {
        let song = song.trim();
        if song.is_empty() {
            return None;
        }
        Some(Self {
            song: song.to_string(),
            artist: artist.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistResult {
    #[serde(
        rename = "playlistUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub playlist_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlaylistResult {
    pub fn created(url: String) -> Self {
        Self {
            playlist_url: Some(url),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            playlist_url: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePlaylistRequest {
    #[serde(default)]
    pub songs: Vec<SongEntry>,
    #[serde(rename = "playlistName", default)]
    pub playlist_name: Option<String>,
}
