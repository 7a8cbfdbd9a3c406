use std::io::{self, IsTerminal};
use std::sync::Arc;

use convo::app::{App, Controller, Renderer, clipboard};
use convo::backend::new_backend;
use convo::cli::Command;
use convo::config::constants::ISSUE_URL;
use convo::config::{Configuration, init_logger, verbose};
use convo::models::Event;
use eyre::{Context, Result};
use tokio::{sync::mpsc, task};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Command::new();
    if cmd.version() {
        cmd.print_version();
        return Ok(());
    }

    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let config = cmd.get_config()?;
    Configuration::init(config.clone()).wrap_err("initializing configuration")?;
    init_logger(&config.log)?;
    verbose!("[+] Logger initialized");

    verbose!("[+] Initializing backend...");
    let backend = new_backend(&config.server)?;
    verbose!("[+] Backend {} initialized", backend.name());

    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
    let controller = Controller::new(backend, Arc::new(event_tx.clone()))
        .with_max_input_length(config.general.max_input_length)
        .with_swipe_delay(config.server.swipe_delay());

    let token = CancellationToken::new();
    let mut task_set = task::JoinSet::new();

    let token_clone = token.clone();
    task_set.spawn(async move {
        if let Err(err) = clipboard::start(token_clone).await {
            log::warn!("Clipboard service is not available: {err}");
        }
    });

    let stdout = io::stdout();
    let renderer = Renderer::new(stdout.lock()).with_color(stdout.is_terminal());
    let mut app = App::new(
        Arc::new(controller),
        event_tx,
        event_rx,
        renderer,
        token.clone(),
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    if let Err(err) = app.run(stdin).await {
        log::error!("App error: {:#}", err);
        eprintln!("Error: {:#}", err);
        eprintln!("If this looks like a bug, please report it at {}", ISSUE_URL);
    }

    token.cancel();
    while let Some(res) = task_set.join_next().await {
        if let Err(err) = res {
            log::error!("Task error: {}", err);
        }
    }

    Ok(())
}
