use clap::Parser;
use clawdash::cli::Cli;
use clawdash::paths::Paths;
use clawdash::service::ControlService;
use clawdash::{browser, server};
use color_eyre::eyre::WrapErr;
use owo_colors::OwoColorize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_tracing();
    let cli = Cli::parse();

    let paths = Paths::new(cli.binary, cli.config)?;
    let service = Arc::new(ControlService::new(&paths).await);

    let listener = TcpListener::bind(("0.0.0.0", cli.port))
        .await
        .wrap_err_with(|| format!("failed to bind port {}", cli.port))?;
    service.announce(cli.port).await;

    let url = format!("http://localhost:{}", cli.port);
    if !cli.no_open {
        browser::open_later(url.clone());
    }
    println!("{} {}", "PicoClaw Dashboard:".green().bold(), url.cyan());
    println!("{}", "Press Ctrl+C to stop".dimmed());

    server::serve(listener, Arc::clone(&service), async {
        server::shutdown_signal().await;
        println!("\n{}", "Shutting down...".yellow());
    })
    .await?;

    // The listener is closed, so nothing can start a new gateway from here.
    service.shutdown().await;

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}
