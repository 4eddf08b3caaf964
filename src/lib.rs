// Library surface for the game core, shared by the terminal binary and tests.
// The session core has no clock, no global state and does no rendering.
pub mod app_dirs;
pub mod config;
pub mod countdown;
pub mod equation;
pub mod error;
pub mod runtime;
pub mod scores;
pub mod session;
pub mod util;

pub use equation::{Corruption, Equation, EquationGenerator};
pub use error::{GameError, GameResult};
pub use scores::{BestScoreEntry, FileStorage, MemoryStorage, ScoreStore, Storage};
pub use session::{
    AnswerRecord, GameSession, Phase, RoundConfig, RoundResult, SessionObserver, SessionState,
};
