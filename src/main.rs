#[tokio::main]
async fn main() -> anyhow::Result<()> {
    page_publisher::telemetry::init();
    let cfg = page_publisher::config::Config::load()?;

    let (app, port) = page_publisher::build_app(cfg).await;

    use tracing::info;
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "upload server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
