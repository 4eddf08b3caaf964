//! Best-time persistence.
//!
//! Best scores live in a single key-value record (`bestScores`) holding a JSON
//! array of `{"questions": <count>, "bestScore": "<secs with one decimal>"}`.
//! A stored time of `0.0` means the round size has never been completed.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::{GameError, GameResult};
use crate::util::{format_secs, is_valid_secs, parse_secs, round_tenths};

/// Storage key of the best scores record.
pub const BEST_SCORES_KEY: &str = "bestScores";

/// Round sizes offered by default, each seeded with an unset best time.
pub const DEFAULT_ROUND_SIZES: [usize; 4] = [10, 25, 50, 99];

/// Best time value meaning "never completed".
pub const UNSET_BEST_TIME: f64 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestScoreEntry {
    pub question_count: usize,
    pub best_time_secs: f64,
}

impl BestScoreEntry {
    pub fn new(question_count: usize, best_time_secs: f64) -> Self {
        Self {
            question_count,
            best_time_secs,
        }
    }

    pub fn is_unset(&self) -> bool {
        self.best_time_secs == UNSET_BEST_TIME
    }
}

pub fn default_best_scores() -> Vec<BestScoreEntry> {
    DEFAULT_ROUND_SIZES
        .iter()
        .map(|&count| BestScoreEntry::new(count, UNSET_BEST_TIME))
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredScore {
    questions: usize,
    #[serde(rename = "bestScore")]
    best_score: StoredTime,
}

// Written as a string; plain numbers are accepted when reading.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredTime {
    Text(String),
    Number(f64),
}

impl StoredTime {
    fn secs(&self) -> Option<f64> {
        match self {
            StoredTime::Text(raw) => parse_secs(raw),
            StoredTime::Number(secs) if is_valid_secs(*secs) => Some(*secs),
            StoredTime::Number(_) => None,
        }
    }
}

/// Parses a best scores record. Duplicate round sizes keep their first entry.
pub fn parse_best_scores(raw: &str) -> GameResult<Vec<BestScoreEntry>> {
    let stored: Vec<StoredScore> =
        serde_json::from_str(raw).map_err(|e| GameError::StorageCorrupt(e.to_string()))?;

    stored
        .into_iter()
        .unique_by(|score| score.questions)
        .map(|score| {
            score
                .best_score
                .secs()
                .map(|secs| BestScoreEntry::new(score.questions, secs))
                .ok_or_else(|| {
                    GameError::StorageCorrupt(format!(
                        "invalid best score for {} questions: {:?}",
                        score.questions, score.best_score
                    ))
                })
        })
        .collect()
}

pub fn serialize_best_scores(entries: &[BestScoreEntry]) -> String {
    let stored = entries
        .iter()
        .map(|entry| StoredScore {
            questions: entry.question_count,
            best_score: StoredTime::Text(format_secs(entry.best_time_secs)),
        })
        .collect::<Vec<_>>();
    // a Vec of plain structs with string fields always serializes
    serde_json::to_string(&stored).unwrap_or_else(|_| String::from("[]"))
}

/// Shortest time that can be stored; anything faster would read back as unset.
pub const MIN_RECORDED_SECS: f64 = 0.1;

/// Applies a finished round to `entries`. Returns true if the stored best changed.
///
/// The candidate is rounded the way it will be stored, so a value that
/// round-trips through the record compares the same as it did before.
fn apply_round(entries: &mut Vec<BestScoreEntry>, question_count: usize, final_time: f64) -> bool {
    let candidate = round_tenths(final_time).max(MIN_RECORDED_SECS);

    match entries
        .iter_mut()
        .find(|entry| entry.question_count == question_count)
    {
        None => {
            entries.push(BestScoreEntry::new(question_count, candidate));
            true
        }
        Some(entry) if entry.is_unset() || candidate < entry.best_time_secs => {
            let changed = entry.best_time_secs != candidate;
            entry.best_time_secs = candidate;
            changed
        }
        Some(_) => false,
    }
}

/// Key-value persistence for best scores.
pub trait Storage {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    /// Replaces the value for `key` in one write; readers never see a partial value.
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;
}

impl<T: Storage + ?Sized> Storage for Box<T> {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        (**self).set(key, value)
    }
}

/// In-process storage, used by tests and embedders without a filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let mut storage = Self::new();
        storage.values.insert(key.to_string(), value.to_string());
        storage
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let dir = AppDirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self { dir }
    }

    pub fn with_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");

        fs::write(&tmp_path, value)?;
        fs::rename(&tmp_path, &path)?;

        tracing::debug!(path = %path.display(), bytes = value.len(), "stored record");
        Ok(())
    }
}

/// Where the entries returned by [`ScoreStore::load_report`] came from.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadSource {
    Stored,
    /// No record existed; defaults were written.
    Defaulted,
    /// The record was corrupt and has been overwritten with defaults.
    Recovered(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub entries: Vec<BestScoreEntry>,
    pub source: LoadSource,
}

/// Outcome of recording a finished round.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub entries: Vec<BestScoreEntry>,
    pub improved: bool,
}

impl Reconciliation {
    pub fn best_for(&self, question_count: usize) -> Option<f64> {
        best_in(&self.entries, question_count)
    }
}

fn best_in(entries: &[BestScoreEntry], question_count: usize) -> Option<f64> {
    entries
        .iter()
        .find(|entry| entry.question_count == question_count && !entry.is_unset())
        .map(|entry| entry.best_time_secs)
}

/// Best-time records keyed by round size.
///
/// `reconcile` takes `&mut self`, so load, update and persist happen as one
/// step per call. Share a store across threads behind a `Mutex`.
#[derive(Debug)]
pub struct ScoreStore<S: Storage> {
    storage: S,
}

impl<S: Storage> ScoreStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Returns the persisted entries, writing the defaults when the record is
    /// missing or corrupt.
    pub fn load(&mut self) -> GameResult<Vec<BestScoreEntry>> {
        self.load_report().map(|report| report.entries)
    }

    /// Like [`load`](Self::load) but reports whether defaults were used.
    pub fn load_report(&mut self) -> GameResult<LoadReport> {
        let Some(raw) = self.storage.get(BEST_SCORES_KEY)? else {
            let entries = self.write_defaults()?;
            return Ok(LoadReport {
                entries,
                source: LoadSource::Defaulted,
            });
        };

        match parse_best_scores(&raw) {
            Ok(entries) => Ok(LoadReport {
                entries,
                source: LoadSource::Stored,
            }),
            Err(GameError::StorageCorrupt(reason)) => {
                let entries = self.write_defaults()?;
                Ok(LoadReport {
                    entries,
                    source: LoadSource::Recovered(reason),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Records a finished round and persists the full updated set in one write.
    pub fn reconcile(&mut self, question_count: usize, final_time: f64) -> GameResult<Vec<BestScoreEntry>> {
        self.record(question_count, final_time)
            .map(|reconciliation| reconciliation.entries)
    }

    pub fn record(&mut self, question_count: usize, final_time: f64) -> GameResult<Reconciliation> {
        if !is_valid_secs(final_time) {
            return Err(GameError::InvalidTime(final_time));
        }

        // a missing or corrupt record is replaced by this single write
        let mut entries = match self.storage.get(BEST_SCORES_KEY)? {
            Some(raw) => match parse_best_scores(&raw) {
                Ok(entries) => entries,
                Err(GameError::StorageCorrupt(_)) => default_best_scores(),
                Err(e) => return Err(e),
            },
            None => default_best_scores(),
        };
        let improved = apply_round(&mut entries, question_count, final_time);
        self.persist(&entries)?;

        Ok(Reconciliation { entries, improved })
    }

    /// The stored best for a round size, `None` when missing or unset.
    pub fn best_for(&mut self, question_count: usize) -> GameResult<Option<f64>> {
        Ok(best_in(&self.load()?, question_count))
    }

    /// Discards all records and restores the defaults.
    pub fn clear(&mut self) -> GameResult<Vec<BestScoreEntry>> {
        self.write_defaults()
    }

    fn write_defaults(&mut self) -> GameResult<Vec<BestScoreEntry>> {
        let entries = default_best_scores();
        self.persist(&entries)?;
        Ok(entries)
    }

    fn persist(&mut self, entries: &[BestScoreEntry]) -> GameResult<()> {
        self.storage
            .set(BEST_SCORES_KEY, &serialize_best_scores(entries))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    fn memory_store() -> ScoreStore<MemoryStorage> {
        ScoreStore::new(MemoryStorage::new())
    }

    fn best(entries: &[BestScoreEntry], question_count: usize) -> f64 {
        entries
            .iter()
            .find(|entry| entry.question_count == question_count)
            .map(|entry| entry.best_time_secs)
            .unwrap()
    }

    #[test]
    fn load_without_record_returns_and_persists_defaults() {
        let mut store = memory_store();
        let entries = store.load().unwrap();
        assert_eq!(entries, default_best_scores());
        assert_eq!(
            store.storage().raw(BEST_SCORES_KEY),
            Some(
                r#"[{"questions":10,"bestScore":"0.0"},{"questions":25,"bestScore":"0.0"},{"questions":50,"bestScore":"0.0"},{"questions":99,"bestScore":"0.0"}]"#
            )
        );
        assert_eq!(store.load().unwrap(), entries);
    }

    #[test]
    fn load_report_sources() {
        let mut store = memory_store();
        assert_eq!(store.load_report().unwrap().source, LoadSource::Defaulted);
        assert_eq!(store.load_report().unwrap().source, LoadSource::Stored);
    }

    #[test]
    fn corrupt_record_is_replaced_with_defaults() {
        let mut store = ScoreStore::new(MemoryStorage::with_value(BEST_SCORES_KEY, "{not json"));
        let report = store.load_report().unwrap();
        assert_matches!(report.source, LoadSource::Recovered(_));
        assert_eq!(report.entries, default_best_scores());

        let raw = store.storage().raw(BEST_SCORES_KEY).unwrap();
        assert_eq!(parse_best_scores(raw).unwrap(), default_best_scores());
    }

    #[test]
    fn wrong_shape_is_corrupt() {
        assert_matches!(
            parse_best_scores(r#"{"questions":10}"#),
            Err(GameError::StorageCorrupt(_))
        );
        assert_matches!(
            parse_best_scores(r#"[{"questions":10,"bestScore":"fast"}]"#),
            Err(GameError::StorageCorrupt(_))
        );
        assert_matches!(
            parse_best_scores(r#"[{"questions":10,"bestScore":"-3.0"}]"#),
            Err(GameError::StorageCorrupt(_))
        );
    }

    #[test]
    fn parse_accepts_numeric_scores_and_dedupes() {
        let entries = parse_best_scores(
            r#"[{"questions":10,"bestScore":12.5},{"questions":10,"bestScore":"9.0"},{"questions":7,"bestScore":"3.2"}]"#,
        )
        .unwrap();
        assert_eq!(
            entries,
            vec![BestScoreEntry::new(10, 12.5), BestScoreEntry::new(7, 3.2)]
        );
    }

    #[test]
    fn reconcile_sets_unset_entry() {
        let mut store = memory_store();
        let entries = store.reconcile(10, 12.3).unwrap();
        assert_eq!(best(&entries, 10), 12.3);
        assert_eq!(best(&entries, 25), 0.0);
    }

    #[test]
    fn reconcile_keeps_better_time() {
        let mut store = memory_store();
        store.reconcile(10, 12.3).unwrap();
        let entries = store.reconcile(10, 15.0).unwrap();
        assert_eq!(best(&entries, 10), 12.3);
        assert_eq!(best(&store.load().unwrap(), 10), 12.3);
    }

    #[test]
    fn reconcile_lowers_on_faster_time() {
        let mut store = memory_store();
        store.reconcile(25, 40.0).unwrap();
        let entries = store.reconcile(25, 31.26).unwrap();
        assert_eq!(best(&entries, 25), 31.3);
    }

    #[test]
    fn reconcile_appends_unknown_round_size() {
        let mut store = memory_store();
        let entries = store.reconcile(7, 4.44).unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries.last(), Some(&BestScoreEntry::new(7, 4.4)));
    }

    #[test]
    fn reconcile_is_idempotent_for_non_improving_time() {
        let mut store = memory_store();
        store.reconcile(50, 20.0).unwrap();
        let first = store.record(50, 22.5).unwrap();
        let raw_after_first = store.storage().raw(BEST_SCORES_KEY).unwrap().to_string();
        let second = store.record(50, 22.5).unwrap();

        assert!(!first.improved);
        assert!(!second.improved);
        assert_eq!(first.entries, second.entries);
        assert_eq!(store.storage().raw(BEST_SCORES_KEY).unwrap(), raw_after_first);
    }

    #[test]
    fn best_time_never_rises() {
        let mut store = memory_store();
        let mut previous = f64::INFINITY;
        for time in [30.0, 28.4, 35.0, 28.4, 19.9, 50.0, 20.0] {
            let current = best(&store.reconcile(99, time).unwrap(), 99);
            assert!(current <= previous, "{current} rose above {previous}");
            previous = current;
        }
        assert_eq!(previous, 19.9);
    }

    #[test]
    fn sub_tenth_time_never_reads_as_unset() {
        let mut store = memory_store();
        store.reconcile(10, 12.3).unwrap();
        let entries = store.reconcile(10, 0.04).unwrap();
        assert_eq!(best(&entries, 10), MIN_RECORDED_SECS);
        let entries = store.reconcile(10, 15.0).unwrap();
        assert_eq!(best(&entries, 10), MIN_RECORDED_SECS);
        assert_eq!(store.best_for(10).unwrap(), Some(MIN_RECORDED_SECS));
    }

    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        writes: usize,
    }

    impl Storage for CountingStorage {
        fn get(&self, key: &str) -> io::Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
            self.writes += 1;
            self.inner.set(key, value)
        }
    }

    #[test]
    fn reconcile_writes_once_on_missing_record() {
        let mut store = ScoreStore::new(CountingStorage::default());
        let entries = store.reconcile(10, 12.3).unwrap();
        assert_eq!(store.storage().writes, 1);
        assert_eq!(entries.len(), default_best_scores().len());
        assert_eq!(best(&entries, 10), 12.3);
    }

    #[test]
    fn reconcile_writes_once_over_corrupt_record() {
        let mut store = ScoreStore::new(CountingStorage {
            inner: MemoryStorage::with_value(BEST_SCORES_KEY, "{not json"),
            writes: 0,
        });
        let entries = store.reconcile(25, 30.0).unwrap();
        assert_eq!(store.storage().writes, 1);
        assert_eq!(best(&entries, 25), 30.0);
        assert_eq!(best(&entries, 10), 0.0);

        let raw = store.storage().inner.raw(BEST_SCORES_KEY).unwrap();
        assert_eq!(parse_best_scores(raw).unwrap(), entries);
    }

    #[test]
    fn record_reports_improvement() {
        let mut store = memory_store();
        let first = store.record(10, 12.3).unwrap();
        assert!(first.improved);
        assert_eq!(first.best_for(10), Some(12.3));
        assert!(!store.record(10, 12.3).unwrap().improved);
        assert!(store.record(10, 11.0).unwrap().improved);
    }

    #[test]
    fn record_rejects_invalid_time() {
        let mut store = memory_store();
        assert_matches!(store.record(10, -1.0), Err(GameError::InvalidTime(_)));
        assert_matches!(store.record(10, f64::NAN), Err(GameError::InvalidTime(_)));
    }

    #[test]
    fn best_for_ignores_unset() {
        let mut store = memory_store();
        assert_eq!(store.best_for(10).unwrap(), None);
        store.reconcile(10, 9.8).unwrap();
        assert_eq!(store.best_for(10).unwrap(), Some(9.8));
        assert_eq!(store.best_for(3).unwrap(), None);
    }

    #[test]
    fn clear_restores_defaults() {
        let mut store = memory_store();
        store.reconcile(10, 9.8).unwrap();
        store.reconcile(12, 9.8).unwrap();
        assert_eq!(store.clear().unwrap(), default_best_scores());
        assert_eq!(store.load().unwrap(), default_best_scores());
    }

    #[test]
    fn file_storage_roundtrip() {
        let dir = tempdir().unwrap();
        let mut store = ScoreStore::new(FileStorage::with_dir(dir.path().join("nested")));
        store.reconcile(10, 12.3).unwrap();

        let reopened = FileStorage::with_dir(dir.path().join("nested"));
        let raw = reopened.get(BEST_SCORES_KEY).unwrap().unwrap();
        assert_eq!(best(&parse_best_scores(&raw).unwrap(), 10), 12.3);
        assert!(!reopened.path_for(BEST_SCORES_KEY).with_extension("json.tmp").exists());
    }

    #[test]
    fn file_storage_missing_key_is_none() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::with_dir(dir.path());
        assert_eq!(storage.get(BEST_SCORES_KEY).unwrap(), None);
    }
}
