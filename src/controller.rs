//! Event handlers for the playlist form page.

use crate::bulk::parse_bulk;
use crate::client::Backend;
use crate::page::{ElementId, Page};
use crate::runtime::{schedule, Runtime, TimerHandle};
use crate::types::{CreatePlaylistRequest, PlaylistResult, SongEntry};
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const SPOTIFY_LOGOUT_URL: &str = "https://accounts.spotify.com/en/logout";
pub const LOGOUT_POPUP_NAME: &str = "Spotify Logout";
pub const LOGOUT_POPUP_FEATURES: &str = "width=700,height=500,top=40,left=40";
/// How long the provider logout page stays open. Not a guarantee that the
/// provider finished logging out.
pub const LOGOUT_POPUP_DELAY: Duration = Duration::from_secs(1);
pub const ALERT_DURATION: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    /// Auth status not known yet.
    Idle,
    LoggedOut,
    LoggedIn,
    Submitting,
    /// The playlist link is showing.
    Published,
}

pub struct PlaylistFormController<P, B, R> {
    page: P,
    backend: B,
    runtime: R,
    state: Cell<FormState>,
    alert_timer: RefCell<Option<TimerHandle>>,
}

/// Shows the loader; hides it again when dropped.
struct LoaderGuard<'a, P: Page> {
    page: &'a P,
}

impl<'a, P: Page> LoaderGuard<'a, P> {
    fn show(page: &'a P) -> Self {
        page.show(ElementId::Loader);
        Self { page }
    }
}

impl<P: Page> Drop for LoaderGuard<'_, P> {
    fn drop(&mut self) {
        self.page.hide(ElementId::Loader);
    }
}

impl<P, B, R> PlaylistFormController<P, B, R>
where
    P: Page,
    B: Backend,
    R: Runtime,
{
    pub fn new(page: P, backend: B, runtime: R) -> Self {
        Self {
            page,
            backend,
            runtime,
            state: Cell::new(FormState::Idle),
            alert_timer: RefCell::new(None),
        }
    }

    pub fn state(&self) -> FormState {
        self.state.get()
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Page-ready handler: asks the server who is logged in and shows the
    /// matching controls. Leaves the page alone if the check fails.
    pub async fn sync_auth_view(&self) {
        info!("Checking authentication status");
        let status = match self.backend.is_authenticated().await {
            Ok(status) => status,
            Err(e) => {
                error!("Auth status check failed: {}", e);
                self.show_alert(&format!("Error fetching /is_authenticated: {}", e));
                return;
            }
        };
        debug!("Auth status: {:?}", status);

        if status.authenticated {
            let user_name = status.user_name.unwrap_or_default();
            info!("User {} is authenticated, revealing form", user_name);
            self.page.show(ElementId::PlaylistForm);
            self.page.show(ElementId::LogoutButton);
            self.page.hide(ElementId::LoginButton);
            self.page.set_text(ElementId::UserName, &user_name);
            self.page.show(ElementId::UserInfo);
            self.state.set(FormState::LoggedIn);
        } else {
            info!("User is not authenticated");
            self.page.hide(ElementId::LogoutButton);
            self.page.show(ElementId::LoginButton);
            self.state.set(FormState::LoggedOut);
        }
    }

    /// The server root starts the OAuth flow.
    pub fn login(&self) {
        info!("Redirecting to login");
        self.page.navigate("/");
    }

    pub async fn logout(&self) {
        if let Err(e) = self.backend.logout().await {
            error!("Logout failed: {}", e);
            self.show_alert(&format!("Error logging out: {}", e));
            return;
        }
        info!("Logged out successfully");

        // The server session is gone; the provider's own session is ended by
        // loading its logout page, then we return to the root.
        let popup = self
            .page
            .open_popup(SPOTIFY_LOGOUT_URL, LOGOUT_POPUP_NAME, LOGOUT_POPUP_FEATURES);
        if popup.is_none() {
            warn!("Logout popup was blocked");
        }
        let page = self.page.clone();
        schedule(&self.runtime, LOGOUT_POPUP_DELAY, move || {
            if let Some(popup) = popup {
                page.close_popup(popup);
            }
            page.navigate("/");
        });

        self.page.hide(ElementId::LogoutButton);
        self.page.show(ElementId::LoginButton);
        self.page.hide(ElementId::PlaylistForm);
        self.page.hide(ElementId::UserInfo);
        self.state.set(FormState::LoggedOut);
    }

    pub fn add_song_fields(&self) {
        self.page.append_song_fields();
        debug!("Added song input pair");
    }

    /// Songs from the input pairs followed by songs from the bulk text.
    pub fn collect_songs(&self) -> Vec<SongEntry> {
        let mut songs: Vec<SongEntry> = self
            .page
            .song_fields()
            .iter()
            .filter_map(|(song, artist)| SongEntry::new(song, artist))
            .collect();

        let bulk = self.page.value(ElementId::BulkSongs);
        if !bulk.trim().is_empty() {
            songs.extend(parse_bulk(&bulk));
        }
        songs
    }

    pub async fn submit(&self) {
        let _loader = LoaderGuard::show(&self.page);
        self.state.set(FormState::Submitting);

        let request = CreatePlaylistRequest {
            songs: self.collect_songs(),
            playlist_name: Some(self.page.value(ElementId::PlaylistName)),
        };
        info!(
            "Submitting {} song(s) for playlist {:?}",
            request.songs.len(),
            request.playlist_name.as_deref().unwrap_or_default()
        );

        match self.backend.create_playlist(&request).await {
            Ok(PlaylistResult {
                playlist_url: Some(url),
                ..
            }) => {
                info!("Playlist created: {}", url);
                self.page.set_href(ElementId::Link, &url);
                self.page.show(ElementId::PlaylistLink);
                self.page.hide(ElementId::PlaylistForm);
                self.state.set(FormState::Published);
            }
            Ok(PlaylistResult {
                error: Some(message),
                ..
            }) => {
                warn!("Server rejected playlist: {}", message);
                self.show_alert(&message);
                self.state.set(FormState::LoggedIn);
            }
            Ok(_) => {
                warn!("Playlist response had neither playlistUrl nor error");
                self.show_alert("Error creating playlist: empty response from server");
                self.state.set(FormState::LoggedIn);
            }
            Err(e) => {
                error!("Playlist creation failed: {}", e);
                self.show_alert(&format!("Error creating playlist: {}", e));
                self.state.set(FormState::LoggedIn);
            }
        }
    }

    /// Shows `message` in the alert area for [`ALERT_DURATION`]. A newer
    /// alert replaces the text and restarts the countdown.
    pub fn show_alert(&self, message: &str) {
        if let Some(previous) = self.alert_timer.borrow_mut().take() {
            previous.cancel();
        }

        self.page.set_text(ElementId::AlertContainer, message);
        self.page.show(ElementId::AlertContainer);

        let page = self.page.clone();
        let timer = schedule(&self.runtime, ALERT_DURATION, move || {
            page.hide(ElementId::AlertContainer);
        });
        *self.alert_timer.borrow_mut() = Some(timer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::page::MemoryPage;
    use crate::runtime::TokioRuntime;
    use crate::types::AuthStatus;
    use std::future::Future;
    use tokio::task::LocalSet;

    /// Canned responses; records what the controller sent and whether the
    /// loader was visible while the request was in flight.
    struct MockBackend {
        page: MemoryPage,
        auth: RefCell<Option<Result<AuthStatus, ClientError>>>,
        logout_error: RefCell<Option<ClientError>>,
        playlist: RefCell<Option<Result<PlaylistResult, ClientError>>>,
        requests: RefCell<Vec<CreatePlaylistRequest>>,
        loader_visible_during_request: Cell<bool>,
    }

    impl MockBackend {
        fn new(page: &MemoryPage) -> Self {
            Self {
                page: page.clone(),
                auth: RefCell::new(None),
                logout_error: RefCell::new(None),
                playlist: RefCell::new(None),
                requests: RefCell::new(Vec::new()),
                loader_visible_during_request: Cell::new(false),
            }
        }

        fn with_auth(self, auth: Result<AuthStatus, ClientError>) -> Self {
            *self.auth.borrow_mut() = Some(auth);
            self
        }

        fn with_logout_error(self, error: ClientError) -> Self {
            *self.logout_error.borrow_mut() = Some(error);
            self
        }

        fn with_playlist(self, result: Result<PlaylistResult, ClientError>) -> Self {
            *self.playlist.borrow_mut() = Some(result);
            self
        }
    }

    impl Backend for MockBackend {
        async fn is_authenticated(&self) -> Result<AuthStatus, ClientError> {
            self.auth
                .borrow_mut()
                .take()
                .unwrap_or_else(|| Ok(AuthStatus::default()))
        }

        async fn logout(&self) -> Result<(), ClientError> {
            match self.logout_error.borrow_mut().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn create_playlist(
            &self,
            request: &CreatePlaylistRequest,
        ) -> Result<PlaylistResult, ClientError> {
            self.loader_visible_during_request
                .set(!self.page.is_hidden(ElementId::Loader));
            self.requests.borrow_mut().push(request.clone());
            self.playlist
                .borrow_mut()
                .take()
                .unwrap_or_else(|| Ok(PlaylistResult::default()))
        }
    }

    type TestController = PlaylistFormController<MemoryPage, MockBackend, TokioRuntime>;

    fn controller(page: &MemoryPage, backend: MockBackend) -> TestController {
        PlaylistFormController::new(page.clone(), backend, TokioRuntime)
    }

    async fn local<F: Future>(future: F) -> F::Output {
        LocalSet::new().run_until(future).await
    }

    fn alex() -> AuthStatus {
        AuthStatus {
            authenticated: true,
            user_name: Some("Alex".to_string()),
            error: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn authenticated_user_sees_form() {
        local(async {
            let page = MemoryPage::new();
            let c = controller(&page, MockBackend::new(&page).with_auth(Ok(alex())));
            c.sync_auth_view().await;

            assert_eq!(page.text(ElementId::UserName), "Alex");
            assert!(page.is_hidden(ElementId::LoginButton));
            assert!(!page.is_hidden(ElementId::LogoutButton));
            assert!(!page.is_hidden(ElementId::PlaylistForm));
            assert!(!page.is_hidden(ElementId::UserInfo));
            assert_eq!(c.state(), FormState::LoggedIn);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_user_sees_login() {
        local(async {
            let page = MemoryPage::new();
            page.show(ElementId::LogoutButton);
            page.hide(ElementId::LoginButton);
            let status = AuthStatus {
                authenticated: false,
                ..AuthStatus::default()
            };
            let c = controller(&page, MockBackend::new(&page).with_auth(Ok(status)));
            c.sync_auth_view().await;

            assert!(page.is_hidden(ElementId::LogoutButton));
            assert!(!page.is_hidden(ElementId::LoginButton));
            assert_eq!(c.state(), FormState::LoggedOut);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_auth_check_alerts_and_keeps_visibility() {
        local(async {
            let page = MemoryPage::new();
            let backend = MockBackend::new(&page)
                .with_auth(Err(ClientError::Decode("expected value".to_string())));
            let c = controller(&page, backend);
            c.sync_auth_view().await;

            assert_eq!(
                page.text(ElementId::AlertContainer),
                "Error fetching /is_authenticated: Invalid response: expected value"
            );
            assert!(!page.is_hidden(ElementId::AlertContainer));
            assert!(!page.is_hidden(ElementId::LoginButton));
            assert!(page.is_hidden(ElementId::LogoutButton));
            assert!(page.is_hidden(ElementId::PlaylistForm));
            assert_eq!(c.state(), FormState::Idle);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn login_navigates_to_root() {
        local(async {
            let page = MemoryPage::new();
            let c = controller(&page, MockBackend::new(&page));
            c.login();
            assert_eq!(page.navigations(), vec!["/".to_string()]);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn logout_resets_view_and_closes_provider_popup() {
        local(async {
            let page = MemoryPage::new();
            let c = controller(&page, MockBackend::new(&page).with_auth(Ok(alex())));
            c.sync_auth_view().await;
            c.logout().await;

            assert!(page.is_hidden(ElementId::LogoutButton));
            assert!(!page.is_hidden(ElementId::LoginButton));
            assert!(page.is_hidden(ElementId::PlaylistForm));
            assert!(page.is_hidden(ElementId::UserInfo));
            assert_eq!(c.state(), FormState::LoggedOut);

            let popups = page.popups();
            assert_eq!(popups.len(), 1);
            assert_eq!(popups[0].url, SPOTIFY_LOGOUT_URL);
            assert_eq!(popups[0].name, LOGOUT_POPUP_NAME);
            assert_eq!(popups[0].features, LOGOUT_POPUP_FEATURES);
            assert!(!popups[0].closed);
            assert!(page.navigations().is_empty());

            tokio::time::sleep(LOGOUT_POPUP_DELAY + Duration::from_millis(1)).await;
            assert!(page.popups()[0].closed);
            assert_eq!(page.navigations(), vec!["/".to_string()]);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_logout_schedules_independent_closes() {
        local(async {
            let page = MemoryPage::new();
            let c = controller(&page, MockBackend::new(&page));
            c.logout().await;
            c.logout().await;

            tokio::time::sleep(Duration::from_secs(2)).await;
            assert!(page.popups().iter().all(|p| p.closed));
            assert_eq!(page.navigations().len(), 2);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_logout_alerts_and_keeps_view() {
        local(async {
            let page = MemoryPage::new();
            let backend = MockBackend::new(&page)
                .with_auth(Ok(alex()))
                .with_logout_error(ClientError::Network("connection refused".to_string()));
            let c = controller(&page, backend);
            c.sync_auth_view().await;
            c.logout().await;

            assert_eq!(
                page.text(ElementId::AlertContainer),
                "Error logging out: Network error: connection refused"
            );
            assert!(!page.is_hidden(ElementId::LogoutButton));
            assert!(!page.is_hidden(ElementId::PlaylistForm));
            assert!(page.popups().is_empty());
            assert_eq!(c.state(), FormState::LoggedIn);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn add_song_creates_exactly_n_pairs() {
        local(async {
            let page = MemoryPage::new();
            page.set_value(ElementId::BulkSongs, "Imagine by John Lennon\nHurt");
            let c = controller(&page, MockBackend::new(&page));
            for _ in 0..4 {
                c.add_song_fields();
            }
            assert_eq!(page.song_fields().len(), 4);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn successful_submit_shows_link() {
        local(async {
            let page = MemoryPage::new();
            let url = "https://open.spotify.com/playlist/abc";
            let backend = MockBackend::new(&page)
                .with_auth(Ok(alex()))
                .with_playlist(Ok(PlaylistResult::created(url.to_string())));
            let c = controller(&page, backend);
            c.sync_auth_view().await;

            c.add_song_fields();
            c.add_song_fields();
            page.fill_song_fields(0, " Jolene ", "Dolly Parton");
            page.fill_song_fields(1, "   ", "ignored");
            page.set_value(ElementId::BulkSongs, "Imagine by John Lennon, Yesterday - The Beatles");
            page.set_value(ElementId::PlaylistName, "Road trip");

            c.submit().await;

            assert_eq!(page.href(ElementId::Link).as_deref(), Some(url));
            assert!(!page.is_hidden(ElementId::PlaylistLink));
            assert!(page.is_hidden(ElementId::PlaylistForm));
            assert!(page.is_hidden(ElementId::Loader));
            assert!(c.backend().loader_visible_during_request.get());
            assert_eq!(c.state(), FormState::Published);

            let requests = c.backend().requests.borrow();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].playlist_name.as_deref(), Some("Road trip"));
            assert_eq!(
                requests[0].songs,
                vec![
                    SongEntry::new("Jolene", "Dolly Parton").unwrap(),
                    SongEntry::new("Imagine", "John Lennon").unwrap(),
                    SongEntry::new("Yesterday", "The Beatles").unwrap(),
                ]
            );
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_is_alerted_then_hidden() {
        local(async {
            let page = MemoryPage::new();
            let backend = MockBackend::new(&page)
                .with_auth(Ok(alex()))
                .with_playlist(Ok(PlaylistResult::failed("Invalid song")));
            let c = controller(&page, backend);
            c.sync_auth_view().await;
            c.submit().await;

            assert_eq!(page.text(ElementId::AlertContainer), "Invalid song");
            assert!(!page.is_hidden(ElementId::AlertContainer));
            assert!(page.is_hidden(ElementId::Loader));
            assert!(!page.is_hidden(ElementId::PlaylistForm));
            assert_eq!(c.state(), FormState::LoggedIn);

            tokio::time::sleep(ALERT_DURATION - Duration::from_millis(1)).await;
            assert!(!page.is_hidden(ElementId::AlertContainer));
            tokio::time::sleep(Duration::from_millis(2)).await;
            assert!(page.is_hidden(ElementId::AlertContainer));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn transport_failure_is_alerted_with_prefix() {
        local(async {
            let page = MemoryPage::new();
            let backend = MockBackend::new(&page)
                .with_playlist(Err(ClientError::Network("Request failed: timeout".to_string())));
            let c = controller(&page, backend);
            c.submit().await;

            assert_eq!(
                page.text(ElementId::AlertContainer),
                "Error creating playlist: Network error: Request failed: timeout"
            );
            assert!(page.is_hidden(ElementId::Loader));
            assert!(c.backend().loader_visible_during_request.get());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn empty_response_is_treated_as_malformed() {
        local(async {
            let page = MemoryPage::new();
            let c = controller(
                &page,
                MockBackend::new(&page).with_playlist(Ok(PlaylistResult::default())),
            );
            c.submit().await;

            assert!(page
                .text(ElementId::AlertContainer)
                .starts_with("Error creating playlist:"));
            assert!(page.is_hidden(ElementId::PlaylistLink));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn newer_alert_restarts_countdown() {
        local(async {
            let page = MemoryPage::new();
            let c = controller(&page, MockBackend::new(&page));

            c.show_alert("first");
            tokio::time::sleep(Duration::from_secs(3)).await;
            c.show_alert("second");

            // The first alert's timer would have fired at 5s.
            tokio::time::sleep(Duration::from_secs(3)).await;
            assert_eq!(page.text(ElementId::AlertContainer), "second");
            assert!(!page.is_hidden(ElementId::AlertContainer));

            tokio::time::sleep(Duration::from_millis(2_001)).await;
            assert!(page.is_hidden(ElementId::AlertContainer));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn blank_bulk_text_adds_nothing() {
        local(async {
            let page = MemoryPage::new();
            page.set_value(ElementId::BulkSongs, " \n , ");
            let c = controller(&page, MockBackend::new(&page));
            assert!(c.collect_songs().is_empty());
        })
        .await;
    }
}
