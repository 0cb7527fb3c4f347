mod api_doc;
mod error;
mod handlers;
mod services;
mod setup;
mod state;

use std::process::ExitCode;

use parallax_core::Config;

// Use mimalloc as the global allocator for better performance and lower
// fragmentation, especially when running inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    // Exit code 2: the process cannot start with this environment.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::from(2);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal runtime error");
            ExitCode::from(1)
        }
    }
}

async fn run(config: Config) -> Result<(), anyhow::Error> {
    let (state, router) = setup::initialize_app(config.clone()).await?;

    // Boot reconciliation against the inference service; warns, never fails.
    state.models.sync_with_service().await;

    if config.auto_start_worker {
        state.worker.start();
    }

    setup::server::start_server(&config, router).await
}
