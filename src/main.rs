use std::sync::Arc;

use tracing::info;

use video_reels::config::Config;
use video_reels::handlers;
use video_reels::models::AppState;
use video_reels::store::VideoStore;
use video_reels::system_info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter("video_reels=debug,tower_http=debug")
        .init();

    // Load configuration
    let config = Config::from_env();

    // Ensure the upload directory exists
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    // Print system info at startup
    system_info::print_startup_info(&config);

    // Create app state
    let app_state = Arc::new(AppState {
        store: VideoStore::new(&config),
        config: config.clone(),
    });

    let app = handlers::build_router(app_state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    info!("🚀 Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("{}", "=".repeat(60));
    println!("✅ Server running on http://0.0.0.0:{}", config.port);
    println!("✅ Server accessible at http://localhost:{}", config.port);
    println!("{}", "=".repeat(60));

    info!("✅ Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
