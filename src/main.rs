use playlist_maker::config::Config;
use playlist_maker::server::{self, AppState};
use playlist_maker::session::{SessionStore, SESSION_IDLE_TIMEOUT};
use playlist_maker::spotify::SpotifyClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playlist_maker=info,tower_http=info".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ {}", e);
            eprintln!("\nRequired settings:");
            eprintln!("   SECRET_KEY=<random string used to sign session cookies>");
            eprintln!("   SPOTIFY_CLIENT_ID=your_client_id");
            eprintln!("   SPOTIFY_CLIENT_SECRET=your_client_secret");
            eprintln!("   SPOTIFY_REDIRECT_URI=http://127.0.0.1:3000/callback/");
            eprintln!("   Get credentials from: https://developer.spotify.com/dashboard\n");
            std::process::exit(1);
        }
    };

    let sessions = match SessionStore::new(&config.secret_key) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let spotify = Arc::new(SpotifyClient::new(
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
        config.spotify_redirect_uri.clone(),
    ));

    // Drop idle sessions periodically
    let session_cleanup = sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300)); // Every 5 minutes
        loop {
            interval.tick().await;
            let evicted = session_cleanup.evict_idle(SESSION_IDLE_TIMEOUT);
            if evicted > 0 {
                debug!("Evicted {} idle session(s)", evicted);
            }
        }
    });

    let app = server::router(AppState { spotify, sessions }, &config.static_dir);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting server on {}", addr);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
