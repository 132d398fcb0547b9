mod app;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use textcomposer_session::{Config, FileStorage, Session, Storage};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use app::App;

/// Place styled text over an image, with undo/redo that survives restarts
#[derive(Parser, Debug)]
#[command(name = "textcomposer")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory for saved state (default: $XDG_DATA_HOME/textcomposer)
    #[arg(long, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Undo history depth, including the initial state
    #[arg(long, value_name = "N")]
    history: Option<usize>,

    /// Idle time before text and slider edits are recorded
    #[arg(long, value_name = "MS")]
    debounce_ms: Option<u64>,

    /// Start with an empty document instead of the saved one
    #[arg(long)]
    fresh: bool,

    /// Background image to open
    #[arg(value_name = "IMAGE")]
    image: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.storage_dir {
            config.storage_dir = Some(dir.clone());
        }
        if let Some(history) = self.history {
            config.history_capacity = history;
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce_window_ms = ms;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("textcomposer=info")),
        )
        .with_writer(io::stderr)
        .init();

    let mut config = Config::load();
    args.apply(&mut config);

    let storage_dir = config.storage_dir();
    info!(path = %storage_dir.display(), "using storage directory");
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(storage_dir));

    let session = if args.fresh {
        Session::new(storage.clone(), config)
    } else {
        Session::open(storage.clone(), config)
    }
    .context("Failed to start editing session")?;

    let mut app = App::new(session, storage);
    if !args.fresh {
        app.restore_background();
    }
    if let Some(path) = &args.image {
        app.open_image(path);
    } else if !app.session.elements().is_empty() {
        app.set_status(format!(
            "Loaded previous session ({} elements)",
            app.session.elements().len()
        ));
    }

    let lines = spawn_stdin_reader()?;
    run_app(&mut app, &lines)?;

    app.session.flush();
    Ok(())
}

/// Read stdin on its own thread so the main loop can wake for debounced commits
fn spawn_stdin_reader() -> Result<mpsc::Receiver<String>> {
    let (line_tx, line_rx) = mpsc::channel();
    thread::Builder::new()
        .name("textcomposer-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn stdin reader")?;
    Ok(line_rx)
}

fn run_app(app: &mut App, lines: &mpsc::Receiver<String>) -> Result<()> {
    let mut stdout = io::stdout();

    while app.running {
        if let Some(status) = app.take_status() {
            writeln!(stdout, "{}", status)?;
        }
        write!(stdout, "> ")?;
        stdout.flush()?;

        // Sleep until input arrives or the next debounced commit is due
        let received = loop {
            let result = match app.session.next_deadline() {
                Some(deadline) => {
                    lines.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                }
                None => lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match result {
                Err(RecvTimeoutError::Timeout) => {
                    let recorded = app.session.poll(Instant::now());
                    debug!(recorded, "debounced edits recorded");
                }
                other => break other,
            }
        };

        match received {
            Ok(line) => {
                let now = Instant::now();
                app.session.poll(now);
                app.execute(&line, now);
            }
            Err(_) => break,
        }
    }

    if let Some(status) = app.take_status() {
        writeln!(stdout, "{}", status)?;
    }
    Ok(())
}
