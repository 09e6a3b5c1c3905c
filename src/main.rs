use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use videohq::api::{self, AppState};
use videohq::pro::Enhancer;
use videohq::{MediaStore, ServerConfig, VideoService};

fn main() -> anyhow::Result<()> {
    videohq::init_tracing();
    let config = ServerConfig::from_env().context("invalid configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.effective_worker_threads())
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let store = MediaStore::new(&config.download_dir);
    store
        .ensure_dir()
        .await
        .with_context(|| format!("cannot create {}", config.download_dir.display()))?;

    let service = Arc::new(VideoService::new(&config.scraper, store)?);
    let state = AppState::new(service, Enhancer::new(config.enhance_time_scale));
    let app = api::router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;

    info!("🚀 videohq listening on {}", addr);
    info!(
        "   Workers: {}, downloads in {}",
        config.effective_worker_threads(),
        config.download_dir.display()
    );

    axum::serve(listener, app).await?;
    Ok(())
}
