use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use mathsprint::countdown::Countdown;
use mathsprint::runtime::{FixedTicker, GameEvent, ManualClock, Runner, TestEventSource};
use mathsprint::{GameSession, MemoryStorage, Phase, RoundConfig, ScoreStore};

// Simulated time credited per tick, independent of how fast the test runs.
const TICK: Duration = Duration::from_millis(100);

fn key(code: KeyCode) -> GameEvent {
    GameEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

// Headless integration using the runtime Runner + GameSession without a TTY.
// Verifies that a round moves through countdown, play and completion when
// driven by ticks and arrow-key answers.
#[test]
fn headless_round_flow_completes() {
    let mut session = GameSession::with_seed(21, ScoreStore::new(MemoryStorage::new()));
    session.start(RoundConfig::new(3).unwrap()).unwrap();
    let mut countdown = Countdown::new(1);

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(TestEventSource::new(rx), FixedTicker::from_millis(1));

    // Answer every equation correctly once play begins.
    let answers = session
        .equations()
        .iter()
        .map(|eq| key(if eq.is_true { KeyCode::Right } else { KeyCode::Left }))
        .collect::<Vec<_>>();

    let mut pending = answers.into_iter();
    for _ in 0..1000u32 {
        match runner.step() {
            GameEvent::Tick => match session.phase() {
                Phase::Countdown => {
                    if countdown.tick(TICK) {
                        session.countdown_elapsed().unwrap();
                    }
                }
                Phase::Active => {
                    session.tick(TICK.as_secs_f64()).unwrap();
                    // one answer per second of play
                    if (session.elapsed_secs() * 10.0).round() as u64 % 10 == 0 {
                        if let Some(ev) = pending.next() {
                            tx.send(ev).unwrap();
                        }
                    }
                }
                _ => {}
            },
            GameEvent::Resize => {}
            GameEvent::Key(key) => {
                let guess = match key.code {
                    KeyCode::Right => true,
                    KeyCode::Left => false,
                    _ => continue,
                };
                session.answer(guess).unwrap();
                if session.phase() == Phase::Complete {
                    break;
                }
            }
        }
    }

    assert_eq!(session.phase(), Phase::Complete, "round should have completed");
    let result = session.result().unwrap();
    assert_eq!(result.correct_count, 3);
    assert_eq!(result.penalty_secs, 0.0);
    assert!((result.final_time_secs - 3.0).abs() < 1e-6);
}

#[test]
fn headless_wrong_answers_add_penalty() {
    let mut session = GameSession::with_seed(2, ScoreStore::new(MemoryStorage::new()));
    session.start(RoundConfig::new(4).unwrap()).unwrap();
    session.countdown_elapsed().unwrap();

    let (tx, rx) = mpsc::channel();
    for eq in session.equations() {
        // always the opposite of the truth
        tx.send(key(if eq.is_true { KeyCode::Left } else { KeyCode::Right }))
            .unwrap();
    }
    let runner = Runner::new(TestEventSource::new(rx), FixedTicker::from_millis(1));

    while session.phase() == Phase::Active {
        match runner.step() {
            GameEvent::Key(key) => {
                session.answer(key.code == KeyCode::Right).unwrap();
            }
            GameEvent::Tick => session.tick(TICK.as_secs_f64()).unwrap(),
            GameEvent::Resize => {}
        }
    }

    let result = session.result().unwrap();
    assert_eq!(result.correct_count, 0);
    assert_eq!(result.penalty_secs, 2.0);
    assert_eq!(result.final_time_secs, result.elapsed_secs + 2.0);
}

#[test]
fn headless_ticks_accumulate_to_one_second() {
    let mut session = GameSession::with_seed(9, ScoreStore::new(MemoryStorage::new()));
    session.start(RoundConfig::new(10).unwrap()).unwrap();
    session.countdown_elapsed().unwrap();

    let (_tx, rx) = mpsc::channel();
    let runner = Runner::new(TestEventSource::new(rx), FixedTicker::from_millis(1));

    for _ in 0..10 {
        if let GameEvent::Tick = runner.step() {
            session.tick(TICK.as_secs_f64()).unwrap();
        }
    }

    assert!((session.elapsed_secs() - 1.0).abs() < 1e-9);
}

#[test]
fn headless_timed_steps_credit_time_between_keys() {
    let mut session = GameSession::with_seed(4, ScoreStore::new(MemoryStorage::new()));
    session.start(RoundConfig::new(2).unwrap()).unwrap();
    session.countdown_elapsed().unwrap();

    let (tx, rx) = mpsc::channel();
    for eq in session.equations() {
        tx.send(key(if eq.is_true { KeyCode::Right } else { KeyCode::Left }))
            .unwrap();
    }
    let clock = ManualClock::new();
    let runner = Runner::with_clock(
        TestEventSource::new(rx),
        FixedTicker::from_millis(1),
        clock.clone(),
    );

    // keys arrive back to back with no tick in between
    while session.phase() == Phase::Active {
        clock.advance(Duration::from_millis(700));
        let (event, elapsed) = runner.step_timed();
        session.tick(elapsed.as_secs_f64()).unwrap();
        if let GameEvent::Key(key) = event {
            session.answer(key.code == KeyCode::Right).unwrap();
        }
    }

    let result = session.result().unwrap();
    assert_eq!(result.correct_count, 2);
    assert!((result.final_time_secs - 1.4).abs() < 1e-9);
}
