mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use itertools::Itertools;
use mathsprint::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    countdown::Countdown,
    runtime::{CrosstermEventSource, EventSource, FixedTicker, GameEvent, Runner, Ticker},
    scores::{LoadSource, DEFAULT_ROUND_SIZES},
    util::format_secs,
    BestScoreEntry, EquationGenerator, FileStorage, GameResult, GameSession, Phase,
    RoundConfig, RoundResult, ScoreStore, SessionObserver,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use rand::rngs::StdRng;
use std::{
    error::Error,
    fs::{self, OpenOptions},
    io::{self, stdin},
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// quick-fire true/false multiplication rounds against the clock
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Judge a rapid sequence of multiplication equations as right or wrong. Every mistake adds a time penalty; your best time per round size is kept."
)]
pub struct Cli {
    /// number of questions to preselect (any positive number)
    #[clap(short = 'q', long)]
    question_count: Option<usize>,

    /// seconds of countdown before a round starts
    #[clap(short = 'c', long)]
    countdown: Option<u32>,

    /// seed equation generation for reproducible rounds
    #[clap(long)]
    seed: Option<u64>,

    /// directory holding best scores (defaults to the platform data directory)
    #[clap(long)]
    data_dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// print the best time for each round size
    Scores {
        /// forget all best times
        #[clap(long)]
        reset: bool,
    },
}

impl Cli {
    fn settings(&self, mut config: Config) -> Config {
        if let Some(question_count) = self.question_count {
            config.question_count = question_count;
        }
        if let Some(countdown) = self.countdown {
            config.countdown_secs = countdown;
        }
        config
    }

    fn storage(&self) -> FileStorage {
        match &self.data_dir {
            Some(dir) => FileStorage::with_dir(dir),
            None => FileStorage::new(),
        }
    }
}

/// Logs session signals; the terminal itself is the visible presenter.
struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_phase_change(&mut self, phase: Phase) {
        tracing::debug!(%phase, "phase changed");
    }

    fn on_answer_recorded(&mut self, index: usize, correct: bool) {
        tracing::trace!(index, correct, "answer recorded");
    }

    fn on_round_complete(&mut self, result: &RoundResult) {
        tracing::info!(
            questions = result.question_count,
            elapsed = result.elapsed_secs,
            penalty = result.penalty_secs,
            final_time = result.final_time_secs,
            new_best = result.is_new_best,
            "round complete"
        );
    }
}

/// Answer feedback shown briefly before the next equation takes focus
#[derive(Debug, Clone, Copy)]
pub struct Feedback {
    pub index: usize,
    pub correct: bool,
    pub remaining: Duration,
}

#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct App {
    pub session: GameSession<StdRng, FileStorage>,
    pub config: Config,
    pub round_sizes: Vec<usize>,
    pub selected: usize,
    pub best_scores: Vec<BestScoreEntry>,
    pub countdown: Countdown,
    pub feedback: Option<Feedback>,
    pub status: Option<String>,
}

impl App {
    pub fn new(
        config: Config,
        generator: EquationGenerator<StdRng>,
        mut scores: ScoreStore<FileStorage>,
    ) -> GameResult<Self> {
        let report = scores.load_report()?;
        if let LoadSource::Recovered(reason) = &report.source {
            tracing::warn!(%reason, "best scores were corrupt and have been reset");
        }

        let mut round_sizes = DEFAULT_ROUND_SIZES.to_vec();
        if !round_sizes.contains(&config.question_count) {
            round_sizes.push(config.question_count);
            round_sizes.sort_unstable();
        }
        let selected = round_sizes
            .iter()
            .position(|&size| size == config.question_count)
            .unwrap_or(0);

        let mut session = GameSession::new(generator, scores);
        session.subscribe(Box::new(TracingObserver));

        Ok(Self {
            session,
            countdown: Countdown::new(config.countdown_secs),
            config,
            round_sizes,
            selected,
            best_scores: report.entries,
            feedback: None,
            status: None,
        })
    }

    pub fn selected_size(&self) -> usize {
        self.round_sizes[self.selected]
    }

    pub fn best_for(&self, question_count: usize) -> Option<f64> {
        self.best_scores
            .iter()
            .find(|entry| entry.question_count == question_count)
            .map(|entry| entry.best_time_secs)
    }

    fn select_next(&mut self) {
        self.selected = (self.selected + 1) % self.round_sizes.len();
    }

    fn select_prev(&mut self) {
        self.selected = (self.selected + self.round_sizes.len() - 1) % self.round_sizes.len();
    }

    fn start_round(&mut self) -> GameResult<()> {
        self.session.start(RoundConfig::new(self.selected_size())?)?;
        self.countdown = Countdown::new(self.config.countdown_secs);
        self.feedback = None;
        self.status = None;
        Ok(())
    }

    /// Feeds wall-clock time into whichever phase is running.
    fn advance(&mut self, delta: Duration) -> GameResult<()> {
        match self.session.phase() {
            Phase::Countdown => {
                if self.countdown.tick(delta) {
                    self.session.countdown_elapsed()?;
                }
            }
            Phase::Active => self.session.tick(delta.as_secs_f64())?,
            Phase::Idle | Phase::Complete => {}
        }

        if let Some(feedback) = self.feedback.as_mut() {
            feedback.remaining = feedback.remaining.saturating_sub(delta);
            if feedback.remaining.is_zero() {
                self.feedback = None;
            }
        }
        Ok(())
    }

    fn answer(&mut self, guessed_true: bool) -> GameResult<()> {
        let index = self.session.answers().len();
        let record = self.session.answer(guessed_true)?;
        self.feedback = Some(Feedback {
            index,
            correct: record.correct,
            remaining: Duration::from_millis(self.config.answer_delay_ms),
        });

        if let Some(e) = self.session.result().and_then(|r| r.save_error.as_deref()) {
            tracing::error!(error = %e, "could not save best score");
            self.status = Some(format!("best score not saved: {e}"));
        }
        Ok(())
    }

    fn play_again(&mut self) -> GameResult<()> {
        self.session.reset();
        self.feedback = None;
        self.best_scores = self.session.load_best_scores()?;
        Ok(())
    }

    fn abandon_round(&mut self) {
        self.session.reset();
        self.feedback = None;
    }

    fn handle_key(&mut self, key: KeyEvent) -> GameResult<Flow> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Ok(Flow::Quit);
        }

        match self.session.phase() {
            Phase::Idle => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => return Ok(Flow::Quit),
                KeyCode::Up | KeyCode::Left | KeyCode::Char('k') => self.select_prev(),
                KeyCode::Down | KeyCode::Right | KeyCode::Char('j') => self.select_next(),
                KeyCode::Char(c @ '1'..='9') => {
                    let idx = c as usize - '1' as usize;
                    if idx < self.round_sizes.len() {
                        self.selected = idx;
                    }
                }
                KeyCode::Enter | KeyCode::Char(' ') => self.start_round()?,
                _ => {}
            },
            Phase::Countdown => {
                if key.code == KeyCode::Esc {
                    self.abandon_round();
                }
            }
            Phase::Active => match key.code {
                KeyCode::Left | KeyCode::Char('f') => self.answer(false)?,
                KeyCode::Right | KeyCode::Char('t') => self.answer(true)?,
                KeyCode::Esc => self.abandon_round(),
                _ => {}
            },
            Phase::Complete => match key.code {
                KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('r') => self.play_again()?,
                KeyCode::Esc | KeyCode::Char('q') => return Ok(Flow::Quit),
                _ => {}
            },
        }
        Ok(Flow::Continue)
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_file = AppDirs::log_path().and_then(|path| {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok()?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok()?;
        Some((path, file))
    });

    match log_file {
        Some((path, file)) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            tracing::debug!(path = %path.display(), "logging initialized");
        }
        // never write logs to the terminal the game is drawn on
        None => tracing_subscriber::registry().with(env_filter).init(),
    }
}

fn print_scores(cli: &Cli, reset: bool) -> Result<(), Box<dyn Error>> {
    let mut store = ScoreStore::new(cli.storage());
    let entries = if reset {
        store.clear()?
    } else {
        store.load()?
    };

    let rows = entries
        .iter()
        .sorted_by_key(|entry| entry.question_count)
        .map(|entry| {
            let best = if entry.is_unset() {
                "--".to_string()
            } else {
                format!("{}s", format_secs(entry.best_time_secs))
            };
            format!("{:>9}  {}", entry.question_count, best)
        })
        .join("\n");

    println!("questions  best");
    println!("{rows}");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    if let Some(Command::Scores { reset }) = &cli.command {
        return print_scores(&cli, *reset);
    }

    let config = cli.settings(FileConfigStore::new().load());
    if let Err(e) = RoundConfig::new(config.question_count) {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::ValueValidation, e.to_string()).exit();
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let generator = match cli.seed {
        Some(seed) => EquationGenerator::from_seed(seed),
        None => EquationGenerator::from_entropy(),
    };
    let mut app = App::new(config, generator, ScoreStore::new(cli.storage()))?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::from_millis(app.config.tick_rate_ms),
    );
    let outcome = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn start_tui<B: Backend, E: EventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        // time passes for every event, so fast answering cannot starve the clock
        let (event, elapsed) = runner.step_timed();
        app.advance(elapsed)?;

        match event {
            GameEvent::Tick | GameEvent::Resize => {}
            GameEvent::Key(key) => {
                if app.handle_key(key)? == Flow::Quit {
                    break;
                }
            }
        }
    }

    Ok(())
}
