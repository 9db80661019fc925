use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::Parser;
use research_core::{update, AppState, ConnectionId, ConnectionState, Msg, OverallStatus};
use research_engine::EngineHandle;
use research_logging::{research_error, research_info};

use super::config::{ClientConfig, DEFAULT_CONFIG_FILE};
use super::effects::EffectRunner;
use super::render::{OutputFormat, Printer};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Submit a research job and follow its progress.
#[derive(Debug, Parser)]
#[command(name = "research", version)]
pub struct Cli {
    /// Research query. Words are joined with spaces.
    pub query: Vec<String>,
    /// Read queries from stdin, one per line. Each line replaces the running job.
    #[arg(short, long)]
    pub interactive: bool,
    /// Use the synchronous job endpoint and print only the final report.
    #[arg(long, conflicts_with = "interactive")]
    pub sync: bool,
    /// Print state snapshots as JSON lines instead of progress text.
    #[arg(long)]
    pub json: bool,
    /// Configuration file (RON). Defaults to ./research.ron when present.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[arg(long, value_name = "URL")]
    pub ws_url: Option<String>,
    #[arg(long, value_name = "URL")]
    pub report_url: Option<String>,
    /// off, error, warn, info, debug or trace.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl Cli {
    fn load_config(&self) -> Result<ClientConfig, super::config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path, true)?,
            None => ClientConfig::load(&PathBuf::from(DEFAULT_CONFIG_FILE), false)?,
        };
        if let Some(url) = &self.ws_url {
            config.ws_url = url.clone();
        }
        if let Some(url) = &self.report_url {
            config.report_url = url.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok(config)
    }

    fn query_text(&self) -> String {
        self.query.join(" ").trim().to_string()
    }
}

pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.load_config()?;
    research_logging::initialize(config.log_destination, config.level_filter()?);

    let query = cli.query_text();
    if query.is_empty() && !cli.interactive {
        bail!("a query is required unless --interactive is given");
    }

    let engine = EngineHandle::new(config.engine_settings()).context("starting engine")?;
    let runner = EffectRunner::new(engine);
    if cli.sync {
        return Ok(run_sync(&runner, &query));
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let mut session = Session::new(runner, format);
    if cli.interactive {
        if !query.is_empty() {
            session.dispatch(Msg::QuerySubmitted(query));
        }
        run_interactive(&mut session);
    } else {
        session.dispatch(Msg::QuerySubmitted(query));
        run_once(&mut session, config.linger());
    }
    Ok(session.finish())
}

struct Session {
    state: AppState,
    runner: EffectRunner,
    printer: Printer,
}

impl Session {
    fn new(runner: EffectRunner, format: OutputFormat) -> Self {
        Self {
            state: AppState::new(),
            runner,
            printer: Printer::new(format),
        }
    }

    fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        self.runner.enqueue(effects);
        if state.consume_dirty() {
            self.printer.show(&state.view());
        }
        self.state = state;
    }

    /// Feeds every pending engine event through `update`. Returns whether
    /// anything arrived.
    fn pump(&mut self) -> bool {
        let mut any = false;
        while let Some(msg) = self.runner.poll() {
            self.dispatch(msg);
            any = true;
        }
        any
    }

    fn status(&self) -> OverallStatus {
        self.state
            .job()
            .map(|job| job.progress().status())
            .unwrap_or_default()
    }

    fn connection_closed(&self) -> bool {
        self.state
            .job()
            .is_none_or(|job| job.connection() == ConnectionState::Closed)
    }

    fn finish(mut self) -> ExitCode {
        let open = self.state.live_connection();
        self.dispatch(Msg::Shutdown);
        if let Some(conn) = open {
            self.await_close(conn);
        }
        match self.status() {
            OverallStatus::Error => ExitCode::FAILURE,
            _ => ExitCode::SUCCESS,
        }
    }

    /// Gives the engine a moment to finish the close handshake for `conn`.
    fn await_close(&mut self, conn: ConnectionId) {
        let deadline = Instant::now() + CLOSE_GRACE;
        while Instant::now() < deadline {
            match self.runner.poll() {
                Some(Msg::ConnectionClosed { conn: closed, .. }) if closed == conn => return,
                Some(msg) => self.dispatch(msg),
                None => thread::sleep(POLL_INTERVAL),
            }
        }
    }
}

/// Follows one job until it settles and its connection is gone, or until
/// `linger` has passed since it settled.
fn run_once(session: &mut Session, linger: Duration) {
    let mut settled_at: Option<Instant> = None;
    loop {
        if !session.pump() {
            thread::sleep(POLL_INTERVAL);
        }
        if !session.status().is_terminal() {
            continue;
        }
        if session.connection_closed() {
            break;
        }
        if settled_at.get_or_insert_with(Instant::now).elapsed() >= linger {
            research_info!("Job settled, closing connection after {:?}", linger);
            break;
        }
    }
}

fn run_interactive(session: &mut Session) {
    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut input_done = false;
    loop {
        let mut idle = !session.pump();
        if !input_done {
            match line_rx.try_recv() {
                Ok(line) => {
                    session.dispatch(Msg::QuerySubmitted(line));
                    idle = false;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => input_done = true,
            }
        }
        // After end of input, let the last job run to its end.
        if input_done && session.status() != OverallStatus::Running {
            break;
        }
        if idle {
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn run_sync(runner: &EffectRunner, query: &str) -> ExitCode {
    runner.fetch_report(query);
    loop {
        match runner.wait_report(Duration::from_millis(250)) {
            Some(Ok(report)) => {
                println!("{report}");
                return ExitCode::SUCCESS;
            }
            Some(Err(err)) => {
                research_error!("Report request failed: {}", err);
                eprintln!("research: {err}");
                return ExitCode::FAILURE;
            }
            None => {}
        }
    }
}
