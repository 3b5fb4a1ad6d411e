// Headless run of the playlist form against a running server.
// Run: cargo run --bin playlist_submit -- "Road trip" < songs.txt
//
// PLAYLIST_MAKER_SESSION is the value of the spotify-login-session cookie
// from a browser that completed the login.

use playlist_maker::client::HttpBackend;
use playlist_maker::controller::{FormState, PlaylistFormController};
use playlist_maker::page::{ElementId, MemoryPage, Page};
use playlist_maker::runtime::TokioRuntime;
use std::io::Read;
use tokio::task::LocalSet;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playlist_maker=warn".into()),
        )
        .init();

    let base_url = std::env::var("PLAYLIST_MAKER_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
    let session = std::env::var("PLAYLIST_MAKER_SESSION").expect("PLAYLIST_MAKER_SESSION");
    let playlist_name = std::env::args().nth(1).unwrap_or_default();

    let mut bulk = String::new();
    std::io::stdin()
        .read_to_string(&mut bulk)
        .expect("failed to read songs from stdin");

    let backend =
        HttpBackend::with_session_cookie(base_url.as_str(), &session).expect("invalid session");
    let page = MemoryPage::new();
    page.set_value(ElementId::BulkSongs, &bulk);
    page.set_value(ElementId::PlaylistName, &playlist_name);
    let controller = PlaylistFormController::new(page.clone(), backend, TokioRuntime);

    LocalSet::new()
        .run_until(async {
            println!("1. Checking session at {}...", base_url);
            controller.sync_auth_view().await;
            match controller.state() {
                FormState::LoggedIn => {
                    println!("   OK. Logged in as {}", page.text(ElementId::UserName))
                }
                FormState::LoggedOut => {
                    println!("   FAIL: session is not logged in. Log in through the browser first.");
                    return;
                }
                _ => {
                    println!("   FAIL: {}", page.text(ElementId::AlertContainer));
                    return;
                }
            }

            let songs = controller.collect_songs();
            println!("\n2. Submitting {} song(s)...", songs.len());
            for entry in &songs {
                if entry.artist.is_empty() {
                    println!("   - {}", entry.song);
                } else {
                    println!("   - {} ({})", entry.song, entry.artist);
                }
            }

            controller.submit().await;
            if controller.state() == FormState::Published {
                println!(
                    "\n   SUCCESS: {}",
                    page.href(ElementId::Link).unwrap_or_default()
                );
            } else {
                println!("\n   FAILED: {}", page.text(ElementId::AlertContainer));
            }
        })
        .await;
}
