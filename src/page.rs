//! The DOM contract the controller binds to.
//!
//! The page template owns these elements; the controller only toggles the
//! `hidden` class, reads input values, and writes text and link targets.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub const HIDDEN_CLASS: &str = "hidden";
pub const SONG_INPUT_CLASS: &str = "song-input";
pub const ARTIST_INPUT_CLASS: &str = "artist-input";
pub const SONG_INPUT_PLACEHOLDER: &str = "Enter song name";
pub const ARTIST_INPUT_PLACEHOLDER: &str = "Enter artist name (optional)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementId {
    LoginButton,
    LogoutButton,
    PlaylistForm,
    UserName,
    UserInfo,
    AddSong,
    InputFields,
    SubmitPlaylist,
    BulkSongs,
    PlaylistName,
    Loader,
    Link,
    PlaylistLink,
    AlertContainer,
}

impl ElementId {
    pub const ALL: [ElementId; 14] = [
        ElementId::LoginButton,
        ElementId::LogoutButton,
        ElementId::PlaylistForm,
        ElementId::UserName,
        ElementId::UserInfo,
        ElementId::AddSong,
        ElementId::InputFields,
        ElementId::SubmitPlaylist,
        ElementId::BulkSongs,
        ElementId::PlaylistName,
        ElementId::Loader,
        ElementId::Link,
        ElementId::PlaylistLink,
        ElementId::AlertContainer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementId::LoginButton => "login-button",
            ElementId::LogoutButton => "logout-button",
            ElementId::PlaylistForm => "playlist-form",
            ElementId::UserName => "user-name",
            ElementId::UserInfo => "user-info",
            ElementId::AddSong => "add-song",
            ElementId::InputFields => "input-fields",
            ElementId::SubmitPlaylist => "submit-playlist",
            ElementId::BulkSongs => "bulk-songs",
            ElementId::PlaylistName => "playlist-name",
            ElementId::Loader => "loader",
            ElementId::Link => "link",
            ElementId::PlaylistLink => "playlist-link",
            ElementId::AlertContainer => "alert-container",
        }
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the controller performs on the page.
///
/// Methods take `&self`: pages are handles onto shared document state, and
/// deferred callbacks hold clones of them.
pub trait Page: Clone + 'static {
    /// A window opened by [`Page::open_popup`].
    type Popup: 'static;

    fn set_hidden(&self, id: ElementId, hidden: bool);
    fn is_hidden(&self, id: ElementId) -> bool;
    fn set_text(&self, id: ElementId, text: &str);
    fn text(&self, id: ElementId) -> String;
    /// Current value of an input or textarea.
    fn value(&self, id: ElementId) -> String;
    fn set_href(&self, id: ElementId, url: &str);

    /// Appends one song input and one artist input to `input-fields`.
    fn append_song_fields(&self);
    /// `(song, artist)` values of every input pair, in document order.
    fn song_fields(&self) -> Vec<(String, String)>;

    fn navigate(&self, url: &str);
    fn open_popup(&self, url: &str, name: &str, features: &str) -> Option<Self::Popup>;
    fn close_popup(&self, popup: Self::Popup);

    fn show(&self, id: ElementId) {
        self.set_hidden(id, false);
    }

    fn hide(&self, id: ElementId) {
        self.set_hidden(id, true);
    }
}

#[derive(Debug, Default)]
struct PageState {
    hidden: HashSet<ElementId>,
    text: HashMap<ElementId, String>,
    values: HashMap<ElementId, String>,
    hrefs: HashMap<ElementId, String>,
    song_fields: Vec<(String, String)>,
    navigations: Vec<String>,
    popups: Vec<PopupRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupRecord {
    pub url: String,
    pub name: String,
    pub features: String,
    pub closed: bool,
}

/// In-memory page, laid out like the served template: the form, logout
/// control, user info, loader, link and alert start hidden.
#[derive(Debug, Clone)]
pub struct MemoryPage {
    state: Rc<RefCell<PageState>>,
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPage {
    pub fn new() -> Self {
        let hidden = [
            ElementId::LogoutButton,
            ElementId::PlaylistForm,
            ElementId::UserInfo,
            ElementId::Loader,
            ElementId::PlaylistLink,
            ElementId::AlertContainer,
        ]
        .into_iter()
        .collect();

        Self {
            state: Rc::new(RefCell::new(PageState {
                hidden,
                ..PageState::default()
            })),
        }
    }

    /// Types into an input or textarea.
    pub fn set_value(&self, id: ElementId, value: &str) {
        self.state
            .borrow_mut()
            .values
            .insert(id, value.to_string());
    }

    /// Types into the song/artist pair at `index`. Returns false when the
    /// pair does not exist.
    pub fn fill_song_fields(&self, index: usize, song: &str, artist: &str) -> bool {
        let mut state = self.state.borrow_mut();
        match state.song_fields.get_mut(index) {
            Some(pair) => {
                *pair = (song.to_string(), artist.to_string());
                true
            }
            None => false,
        }
    }

    pub fn href(&self, id: ElementId) -> Option<String> {
        self.state.borrow().hrefs.get(&id).cloned()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.borrow().navigations.clone()
    }

    pub fn popups(&self) -> Vec<PopupRecord> {
        self.state.borrow().popups.clone()
    }
}

impl Page for MemoryPage {
    /// Index into the popup log.
    type Popup = usize;

    fn set_hidden(&self, id: ElementId, hidden: bool) {
        let mut state = self.state.borrow_mut();
        if hidden {
            state.hidden.insert(id);
        } else {
            state.hidden.remove(&id);
        }
    }

    fn is_hidden(&self, id: ElementId) -> bool {
        self.state.borrow().hidden.contains(&id)
    }

    fn set_text(&self, id: ElementId, text: &str) {
        self.state.borrow_mut().text.insert(id, text.to_string());
    }

    fn text(&self, id: ElementId) -> String {
        self.state
            .borrow()
            .text
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    fn value(&self, id: ElementId) -> String {
        self.state
            .borrow()
            .values
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    fn set_href(&self, id: ElementId, url: &str) {
        self.state.borrow_mut().hrefs.insert(id, url.to_string());
    }

    fn append_song_fields(&self) {
        self.state
            .borrow_mut()
            .song_fields
            .push((String::new(), String::new()));
    }

    fn song_fields(&self) -> Vec<(String, String)> {
        self.state.borrow().song_fields.clone()
    }

    fn navigate(&self, url: &str) {
        self.state.borrow_mut().navigations.push(url.to_string());
    }

    fn open_popup(&self, url: &str, name: &str, features: &str) -> Option<usize> {
        let mut state = self.state.borrow_mut();
        state.popups.push(PopupRecord {
            url: url.to_string(),
            name: name.to_string(),
            features: features.to_string(),
            closed: false,
        });
        Some(state.popups.len() - 1)
    }

    fn close_popup(&self, popup: usize) {
        if let Some(record) = self.state.borrow_mut().popups.get_mut(popup) {
            record.closed = true;
        }
    }
}
