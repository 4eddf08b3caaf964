//! Round lifecycle: countdown, timed play, completion.
//!
//! The session has no clock of its own. The presenter reports elapsed time
//! through [`GameSession::tick`] and answers through [`GameSession::answer`];
//! everything else is derived from those calls, so a round replays exactly
//! given the same random seed and inputs.

use rand::rngs::StdRng;
use rand::Rng;

use crate::equation::{Equation, EquationGenerator};
use crate::error::{GameError, GameResult};
use crate::scores::{BestScoreEntry, ScoreStore, Storage};
use crate::util::is_valid_secs;

/// Seconds added to the final time for each incorrect answer.
pub const PENALTY_SECS: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Idle,
    Countdown,
    Active,
    Complete,
}

/// Operations that are only valid in some phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Operation {
    #[strum(serialize = "start a round")]
    Start,
    #[strum(serialize = "finish the countdown")]
    CountdownElapsed,
    #[strum(serialize = "advance the timer")]
    Tick,
    #[strum(serialize = "answer")]
    Answer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundConfig {
    pub question_count: usize,
}

impl RoundConfig {
    pub fn new(question_count: usize) -> GameResult<Self> {
        let config = Self { question_count };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GameResult<()> {
        if self.question_count == 0 {
            return Err(GameError::InvalidConfig(
                "question count must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerRecord {
    pub guessed_true: bool,
    /// The guess matched the equation's truth value.
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub equations: Vec<Equation>,
    pub answers: Vec<AnswerRecord>,
    pub elapsed_secs: f64,
    pub penalty_secs: f64,
    pub phase: Phase,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            equations: Vec::new(),
            answers: Vec::new(),
            elapsed_secs: 0.0,
            penalty_secs: 0.0,
            phase: Phase::Idle,
        }
    }
}

impl SessionState {
    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|answer| answer.correct).count()
    }

    pub fn is_finished(&self) -> bool {
        self.answers.len() == self.equations.len()
    }
}

/// Summary of a completed round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    pub question_count: usize,
    pub elapsed_secs: f64,
    pub penalty_secs: f64,
    pub final_time_secs: f64,
    pub correct_count: usize,
    /// Stored best for this round size after reconciliation.
    pub best_time_secs: Option<f64>,
    pub is_new_best: bool,
    /// Set when the best score could not be saved.
    pub save_error: Option<String>,
}

/// Signals emitted to the presenter. All methods default to no-ops.
pub trait SessionObserver {
    fn on_phase_change(&mut self, _phase: Phase) {}
    fn on_answer_recorded(&mut self, _index: usize, _correct: bool) {}
    fn on_round_complete(&mut self, _result: &RoundResult) {}
}

/// A single game session, exclusively owned by its presenter.
pub struct GameSession<R: Rng, S: Storage> {
    generator: EquationGenerator<R>,
    scores: ScoreStore<S>,
    config: Option<RoundConfig>,
    state: SessionState,
    result: Option<RoundResult>,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl<S: Storage> GameSession<StdRng, S> {
    pub fn with_seed(seed: u64, scores: ScoreStore<S>) -> Self {
        Self::new(EquationGenerator::from_seed(seed), scores)
    }
}

impl<R: Rng, S: Storage> GameSession<R, S> {
    pub fn new(generator: EquationGenerator<R>, scores: ScoreStore<S>) -> Self {
        Self {
            generator,
            scores,
            config: None,
            state: SessionState::default(),
            result: None,
            observers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> Option<RoundConfig> {
        self.config
    }

    pub fn equations(&self) -> &[Equation] {
        &self.state.equations
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.state.answers
    }

    /// The equation awaiting an answer, if the round is still running.
    pub fn current_equation(&self) -> Option<&Equation> {
        self.state.equations.get(self.state.answers.len())
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.state.elapsed_secs
    }

    pub fn penalty_secs(&self) -> f64 {
        self.state.penalty_secs
    }

    pub fn final_time_secs(&self) -> f64 {
        self.state.elapsed_secs + self.state.penalty_secs
    }

    pub fn result(&self) -> Option<&RoundResult> {
        self.result.as_ref()
    }

    pub fn scores(&self) -> &ScoreStore<S> {
        &self.scores
    }

    pub fn load_best_scores(&mut self) -> GameResult<Vec<BestScoreEntry>> {
        self.scores.load()
    }

    /// Generates the round's equations and enters the countdown.
    pub fn start(&mut self, config: RoundConfig) -> GameResult<()> {
        self.require(Phase::Idle, Operation::Start)?;
        config.validate()?;

        self.state = SessionState {
            equations: self.generator.generate(config.question_count),
            ..SessionState::default()
        };
        self.config = Some(config);
        self.result = None;
        self.transition(Phase::Countdown);
        Ok(())
    }

    pub fn countdown_elapsed(&mut self) -> GameResult<()> {
        self.require(Phase::Countdown, Operation::CountdownElapsed)?;
        self.transition(Phase::Active);
        Ok(())
    }

    /// Adds `delta_secs` of play time. Only the accumulated total matters,
    /// not the cadence of calls.
    pub fn tick(&mut self, delta_secs: f64) -> GameResult<()> {
        self.require(Phase::Active, Operation::Tick)?;
        if !is_valid_secs(delta_secs) {
            return Err(GameError::InvalidTime(delta_secs));
        }
        self.state.elapsed_secs += delta_secs;
        Ok(())
    }

    /// Records the player's judgment of the current equation.
    ///
    /// Answering the last equation completes the round and reconciles the
    /// best score. If persisting fails the round still completes: the record
    /// is returned and the result carries `save_error` with no best time.
    pub fn answer(&mut self, guessed_true: bool) -> GameResult<AnswerRecord> {
        self.require(Phase::Active, Operation::Answer)?;

        let index = self.state.answers.len();
        let is_true = match self.state.equations.get(index) {
            Some(equation) => equation.is_true,
            None => {
                return Err(GameError::InvalidState {
                    phase: self.state.phase,
                    operation: Operation::Answer,
                })
            }
        };

        let record = AnswerRecord {
            guessed_true,
            correct: guessed_true == is_true,
        };
        self.state.answers.push(record);
        if !record.correct {
            self.state.penalty_secs += PENALTY_SECS;
        }
        self.emit(|observer| observer.on_answer_recorded(index, record.correct));

        if self.state.is_finished() {
            self.complete();
        }
        Ok(record)
    }

    /// Returns to `Idle` from any phase, discarding the round.
    pub fn reset(&mut self) {
        let previous = self.state.phase;
        self.state = SessionState::default();
        self.config = None;
        self.result = None;
        if previous != Phase::Idle {
            self.emit(|observer| observer.on_phase_change(Phase::Idle));
        }
    }

    fn complete(&mut self) {
        let question_count = self.state.equations.len();
        let final_time_secs = self.final_time_secs();

        let mut result = RoundResult {
            question_count,
            elapsed_secs: self.state.elapsed_secs,
            penalty_secs: self.state.penalty_secs,
            final_time_secs,
            correct_count: self.state.correct_count(),
            best_time_secs: None,
            is_new_best: false,
            save_error: None,
        };
        match self.scores.record(question_count, final_time_secs) {
            Ok(reconciliation) => {
                result.best_time_secs = reconciliation.best_for(question_count);
                result.is_new_best = reconciliation.improved;
            }
            Err(e) => result.save_error = Some(e.to_string()),
        }

        self.result = Some(result.clone());
        self.transition(Phase::Complete);
        self.emit(|observer| observer.on_round_complete(&result));
    }

    fn require(&self, phase: Phase, operation: Operation) -> GameResult<()> {
        if self.state.phase != phase {
            return Err(GameError::InvalidState {
                phase: self.state.phase,
                operation,
            });
        }
        Ok(())
    }

    fn transition(&mut self, phase: Phase) {
        self.state.phase = phase;
        self.emit(|observer| observer.on_phase_change(phase));
    }

    fn emit(&mut self, mut notify: impl FnMut(&mut dyn SessionObserver)) {
        for observer in self.observers.iter_mut() {
            notify(observer.as_mut());
        }
    }
}

impl<R: Rng, S: Storage> std::fmt::Debug for GameSession<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("result", &self.result)
            .field("observers", &self.observers.len())
            .finish()
    }
}
