use sidekick::{
    server::{router, AppState},
    SidekickConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sidekick=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SidekickConfig::from_env()?;
    let judge = config.build_judge()?;
    tracing::info!(
        model = %config.model,
        prizes = judge.catalog().len(),
        "judge ready"
    );

    let app = router(AppState::new(judge));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
