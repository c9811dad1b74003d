use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{error, info};

mod controller;
mod domain;
mod http;
mod inputter;
mod lifecycle;
mod logging;
mod model;
mod orchestrator;
mod pagination;
mod query;
mod service;
mod state;
mod ui;
mod upload;
mod worker;

use controller::Controller;
use domain::{Message, ViewerConfig, ViewerError};
use http::HttpDataService;
use logging::{LogConfig, init_logging};
use model::Model;
use ui::TableUI;
use worker::Executor;

/// Browse a CSV dataset held by a csv viewer server, one page at a time.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Base url of the server.
    #[arg(long, env = "CSVVIEW_SERVER", default_value = "http://localhost:8080")]
    server: String,

    /// Upload this CSV file right after start-up.
    #[arg(long, value_name = "FILE")]
    upload: Option<PathBuf>,

    /// Per request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Number of concurrent requests.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Wait this long after the last keystroke before searching. 0 searches on every key.
    #[arg(long, default_value_t = 250)]
    debounce_ms: u64,

    /// Write logs to this file.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// More verbose logs (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn viewer_config(&self) -> ViewerConfig {
        ViewerConfig::default()
            .with_server_url(self.server.clone())
            .with_request_timeout(Duration::from_secs(self.timeout))
            .with_workers(self.workers)
            .with_search_debounce(Duration::from_millis(self.debounce_ms))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(args: &Args) -> Result<(), ViewerError> {
    init_logging(&LogConfig::from_verbosity(args.verbose, args.log_file.clone()))?;
    let cfg = args.viewer_config();
    info!("Starting csvview against {}", cfg.server_url);

    let service = HttpDataService::new(&cfg.server_url, cfg.request_timeout)?;
    let executor = Executor::new(Arc::new(service), cfg.workers)?;
    let mut model = Model::init(&cfg);
    let controller = Controller::new(&cfg);
    let mut ui = TableUI::new();

    if let Some(path) = &args.upload {
        for command in model.update(Message::Upload(path.clone())) {
            executor.execute(command);
        }
    }

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut model, &controller, &mut ui, &executor);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut ratatui::DefaultTerminal,
    model: &mut Model,
    controller: &Controller,
    ui: &mut TableUI,
    executor: &Executor,
) -> Result<(), ViewerError> {
    while !model.quitting() {
        terminal.draw(|f| ui.draw(model, f))?;

        let mut messages = Vec::new();
        if let Some(message) = controller.handle_event(model)? {
            messages.push(message);
        }
        while let Some(message) = executor.try_next() {
            messages.push(message);
        }
        messages.push(Message::Tick(Instant::now()));

        for message in messages {
            for command in model.update(message) {
                executor.execute(command);
            }
        }
    }
    Ok(())
}
