//! File-backed record store
//!
//! One JSON file per record in a single directory. The store itself holds no
//! record state: every operation goes to the filesystem, so several stores
//! (in one process or several) can share a directory.
//!
//! ## Load semantics
//!
//! A record file that exists but cannot be loaded is an error, never "no
//! record". `find` distinguishes three outcomes:
//! - `Ok(None)`: no file for this call
//! - `Ok(Some(record))`: file parsed and every object type resolved
//! - `Err(..)`: `Corrupt`, `TypeResolution`, `Codec` or `Storage`
//!
//! ## Writes
//!
//! `save` replaces atomically (last writer wins); `insert` creates only if
//! absent (first writer wins). See `atomic`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use regrest_core::{CodecError, Decode, EncodedValue, Limits, ResolutionPolicy, TypeRegistry};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::atomic;
use crate::error::{StoreError, StoreResult};
use crate::fingerprint::fingerprint;
use crate::record::{
    record_file_name, RecordFile, RecordFileRef, RecordHeader, RecordId, TestRecord,
    FORMAT_VERSION, RECORD_EXTENSION,
};
use crate::stats::StoreStats;

/// Default store directory, relative to the working directory
pub const DEFAULT_STORE_DIR: &str = ".regrest";

// ============================================================================
// Configuration
// ============================================================================

/// Record store configuration
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Directory holding the record files
    pub dir: PathBuf,
    /// How to treat stored objects whose type is not registered
    pub policy: ResolutionPolicy,
    /// Depth bound applied to loaded values
    pub limits: Limits,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::new(DEFAULT_STORE_DIR)
    }
}

impl StoreConfig {
    /// Strict configuration for `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            dir: dir.into(),
            policy: ResolutionPolicy::Strict,
            limits: Limits::default(),
        }
    }

    /// Set the resolution policy
    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the depth limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

// ============================================================================
// Listing
// ============================================================================

/// A record file that could not be loaded
#[derive(Debug)]
pub struct LoadFailure {
    /// Record file
    pub path: PathBuf,
    /// Why it could not be loaded
    pub error: StoreError,
}

/// Result of enumerating the store
#[derive(Debug, Default)]
pub struct Listing {
    /// Loaded records, sorted by (module, function, timestamp)
    pub records: Vec<TestRecord>,
    /// Files that failed to load, sorted by path
    pub failures: Vec<LoadFailure>,
}

impl Listing {
    /// Number of loaded records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record loaded
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if every record file loaded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Patterns
// ============================================================================

/// Delete pattern: glob when it has metacharacters, substring otherwise
#[derive(Debug)]
enum RecordPattern {
    Glob(glob::Pattern),
    Substring(String),
}

impl RecordPattern {
    fn parse(pattern: &str) -> StoreResult<Self> {
        if pattern.is_empty() {
            return Err(StoreError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern is empty".to_string(),
            });
        }
        if pattern.contains(['*', '?', '[']) {
            glob::Pattern::new(pattern)
                .map(RecordPattern::Glob)
                .map_err(|e| StoreError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })
        } else {
            Ok(RecordPattern::Substring(pattern.to_string()))
        }
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            RecordPattern::Glob(p) => p.matches(candidate),
            RecordPattern::Substring(s) => candidate.contains(s.as_str()),
        }
    }
}

// ============================================================================
// RecordStore
// ============================================================================

/// Directory of record files plus the types it can reconstruct
#[derive(Debug)]
pub struct RecordStore {
    config: StoreConfig,
    registry: RwLock<TypeRegistry>,
}

impl RecordStore {
    /// Open a store, creating its directory if needed
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.dir).map_err(|e| StoreError::io("create_dir", &config.dir, e))?;
        debug!(dir = %config.dir.display(), policy = ?config.policy, "Opened record store");
        let registry = TypeRegistry::with_limits(config.limits);
        Ok(RecordStore {
            config,
            registry: RwLock::new(registry),
        })
    }

    /// Open a strict store at `dir`
    pub fn at(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        Self::open(StoreConfig::new(dir))
    }

    /// Store directory
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Store configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Register every object type reachable from `T`
    pub fn register<T: Decode>(&self) {
        self.registry.write().register::<T>();
    }

    /// Add every type of another registry
    pub fn extend_registry(&self, types: &TypeRegistry) {
        self.registry.write().extend(types);
    }

    /// Returns true if `type_name` can be reconstructed
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.registry.read().contains(type_name)
    }

    /// Registered type names, sorted
    pub fn registered_types(&self) -> Vec<String> {
        self.registry
            .read()
            .type_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Fingerprint of a call
    pub fn fingerprint(
        &self,
        module: &str,
        function: &str,
        args: &[EncodedValue],
        kwargs: &BTreeMap<String, EncodedValue>,
    ) -> StoreResult<RecordId> {
        Ok(fingerprint(module, function, args, kwargs)?)
    }

    /// Path of the record file for a call
    pub fn path_for(&self, module: &str, function: &str, record_id: &RecordId) -> PathBuf {
        self.config
            .dir
            .join(record_file_name(module, function, record_id))
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// Find the record of a call
    pub fn find(
        &self,
        module: &str,
        function: &str,
        args: &[EncodedValue],
        kwargs: &BTreeMap<String, EncodedValue>,
    ) -> StoreResult<Option<TestRecord>> {
        let record_id = fingerprint(module, function, args, kwargs)?;
        let path = self.path_for(module, function, &record_id);
        let record = self.load_if_exists(&path)?;
        debug!(
            module,
            function,
            record_id = %record_id,
            found = record.is_some(),
            "Record lookup"
        );
        Ok(record)
    }

    /// Load a record by id
    pub fn get(&self, record_id: &RecordId) -> StoreResult<Option<TestRecord>> {
        for path in self.files_for_id(record_id)? {
            if let Some(record) = self.load_if_exists(&path)? {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Load and resolve one record file
    pub fn load(&self, path: &Path) -> StoreResult<TestRecord> {
        let bytes = fs::read(path).map_err(|e| StoreError::io("read", path, e))?;
        self.decode_record(path, &bytes)
    }

    fn load_if_exists(&self, path: &Path) -> StoreResult<Option<TestRecord>> {
        match fs::read(path) {
            Ok(bytes) => self.decode_record(path, &bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io("read", path, e)),
        }
    }

    fn decode_record(&self, path: &Path, bytes: &[u8]) -> StoreResult<TestRecord> {
        let file: RecordFile = parse_json(path, bytes, self.config.limits)?;
        if file.format_version != FORMAT_VERSION {
            return Err(StoreError::corrupt(
                path,
                format!("unsupported format version {}", file.format_version),
            ));
        }
        let record = TestRecord::from(file);

        let registry = self.registry.read();
        let values = record
            .args
            .iter()
            .chain(record.kwargs.values())
            .chain(std::iter::once(&record.result));
        for value in values {
            self.config.limits.validate_value(value)?;
            if let Some(key) = duplicate_key(value) {
                return Err(StoreError::corrupt(path, format!("duplicate key '{}'", key)));
            }
            registry.resolve(value, self.config.policy)?;
        }
        Ok(record)
    }

    fn read_header(&self, path: &Path) -> StoreResult<RecordHeader> {
        let bytes = fs::read(path).map_err(|e| StoreError::io("read", path, e))?;
        parse_json(path, &bytes, self.config.limits)
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Write a record, replacing any existing one with the same id
    pub fn save(&self, record: &TestRecord) -> StoreResult<PathBuf> {
        let path = self.config.dir.join(record.file_name());
        let bytes = serialize(record)?;
        atomic::write_replace(&path, &bytes)?;
        debug!(
            record_id = %record.record_id,
            path = %path.display(),
            "Saved record"
        );
        Ok(path)
    }

    /// Write a record only if none exists for its id
    ///
    /// Returns `false` if another writer created the record first; the
    /// existing file is left untouched.
    pub fn insert(&self, record: &TestRecord) -> StoreResult<bool> {
        let path = self.config.dir.join(record.file_name());
        let bytes = serialize(record)?;
        let created = atomic::write_new(&path, &bytes)?;
        debug!(
            record_id = %record.record_id,
            created,
            "Inserted record"
        );
        Ok(created)
    }

    // ------------------------------------------------------------------------
    // Enumeration
    // ------------------------------------------------------------------------

    /// Load every record, reporting files that fail separately
    pub fn list_all(&self) -> StoreResult<Listing> {
        let mut listing = Listing::default();
        for path in self.record_files()? {
            match self.load(&path) {
                Ok(record) => listing.records.push(record),
                Err(StoreError::Storage { source, .. })
                    if source.kind() == io::ErrorKind::NotFound => {}
                Err(error) => {
                    debug!(path = %path.display(), error = %error, "Record failed to load");
                    listing.failures.push(LoadFailure { path, error });
                }
            }
        }
        listing.records.sort_by(|a, b| {
            (&a.module, &a.function, a.timestamp).cmp(&(&b.module, &b.function, b.timestamp))
        });
        Ok(listing)
    }

    /// Records whose module or function contains `keyword`, ignoring case
    ///
    /// Failures are kept if their file name contains the keyword.
    pub fn list_matching(&self, keyword: &str) -> StoreResult<Listing> {
        let keyword = keyword.to_lowercase();
        let mut listing = self.list_all()?;
        listing.records.retain(|r| {
            r.module.to_lowercase().contains(&keyword)
                || r.function.to_lowercase().contains(&keyword)
        });
        listing.failures.retain(|f| {
            f.path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase().contains(&keyword))
                .unwrap_or(false)
        });
        Ok(listing)
    }

    /// Record counts by module and function
    ///
    /// Reads only record metadata, so records with unresolvable types are
    /// still counted.
    pub fn stats(&self) -> StoreResult<StoreStats> {
        let mut headers = Vec::new();
        let mut unreadable = 0;
        for path in self.record_files()? {
            match self.read_header(&path) {
                Ok(header) => headers.push(header),
                Err(StoreError::Storage { source, .. })
                    if source.kind() == io::ErrorKind::NotFound => {}
                Err(_) => unreadable += 1,
            }
        }
        Ok(StoreStats::from_headers(&headers, unreadable))
    }

    // ------------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------------

    /// Delete a record by id; `false` if it did not exist
    pub fn delete(&self, record_id: &RecordId) -> StoreResult<bool> {
        let mut deleted = false;
        for path in self.files_for_id(record_id)? {
            deleted |= atomic::remove(&path)?;
        }
        if deleted {
            atomic::sync_dir(self.dir())?;
            debug!(record_id = %record_id, "Deleted record");
        }
        Ok(deleted)
    }

    /// Delete every record whose module, function or id matches `pattern`
    ///
    /// Patterns containing `*`, `?` or `[` are globs matched against each
    /// field in full; anything else is a substring. Files whose metadata
    /// cannot be read are matched by file name.
    pub fn delete_by_pattern(&self, pattern: &str) -> StoreResult<usize> {
        let pattern = RecordPattern::parse(pattern)?;
        let mut count = 0;
        for path in self.record_files()? {
            let fields = match self.read_header(&path) {
                Ok(header) => vec![header.module, header.function, header.record_id.to_string()],
                Err(StoreError::Storage { source, .. })
                    if source.kind() == io::ErrorKind::NotFound =>
                {
                    continue
                }
                Err(_) => vec![file_stem(&path)],
            };
            if fields.iter().any(|f| pattern.matches(f)) && atomic::remove(&path)? {
                count += 1;
            }
        }
        if count > 0 {
            atomic::sync_dir(self.dir())?;
        }
        info!(pattern = ?pattern, count, "Deleted records by pattern");
        Ok(count)
    }

    /// Delete every record file, and any leftover temp files
    pub fn clear_all(&self) -> StoreResult<usize> {
        let mut count = 0;
        for path in self.record_files()? {
            if atomic::remove(&path)? {
                count += 1;
            }
        }
        atomic::remove_stale_temps(self.dir())?;
        atomic::sync_dir(self.dir())?;
        info!(dir = %self.dir().display(), count, "Cleared record store");
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // Directory scanning
    // ------------------------------------------------------------------------

    fn record_files(&self) -> StoreResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.config.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(dir = %self.dir().display(), "Store directory is missing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::io("read_dir", &self.config.dir, e)),
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_record_file(path))
            .collect();
        files.sort();
        Ok(files)
    }

    fn files_for_id(&self, record_id: &RecordId) -> StoreResult<Vec<PathBuf>> {
        let suffix = format!(".{}.{}", record_id, RECORD_EXTENSION);
        Ok(self
            .record_files()?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.ends_with(&suffix))
            })
            .collect())
    }
}

fn is_record_file(path: &Path) -> bool {
    let visible = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| !n.starts_with('.'));
    visible && path.extension().map_or(false, |ext| ext == RECORD_EXTENSION)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// JSON container levels one encoded level can take up: an object is
/// `{"value":{"fields":[["name", ..]]}}`
const JSON_LEVELS_PER_VALUE: usize = 4;

/// Record envelope, argument list and the innermost scalar
const ENVELOPE_DEPTH: usize = 8;

// serde_json's own nesting limit is lower than the JSON depth of a value at
// `max_depth`, so the bound is enforced by a scan before parsing.
fn parse_json<T: DeserializeOwned>(path: &Path, bytes: &[u8], limits: Limits) -> StoreResult<T> {
    let max = limits
        .max_depth
        .saturating_mul(JSON_LEVELS_PER_VALUE)
        .saturating_add(ENVELOPE_DEPTH);
    if let Some(depth) = nesting_beyond(bytes, max) {
        return Err(StoreError::corrupt(
            path,
            format!("JSON nesting depth {} exceeds {}", depth, max),
        ));
    }

    let mut de = serde_json::Deserializer::from_slice(bytes);
    de.disable_recursion_limit();
    let value = T::deserialize(&mut de).map_err(|e| StoreError::corrupt(path, e.to_string()))?;
    de.end().map_err(|e| StoreError::corrupt(path, e.to_string()))?;
    Ok(value)
}

/// First container depth above `max`, skipping string contents
fn nesting_beyond(bytes: &[u8], max: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for &b in bytes {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                if depth > max {
                    return Some(depth);
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// A map key or object field that occurs twice at one level
fn duplicate_key(value: &EncodedValue) -> Option<&str> {
    match value {
        EncodedValue::List(items) | EncodedValue::Set(items) => {
            items.iter().find_map(duplicate_key)
        }
        EncodedValue::Map(entries) | EncodedValue::Object { fields: entries, .. } => {
            let mut seen = BTreeSet::new();
            for (key, _) in entries {
                if !seen.insert(key.as_str()) {
                    return Some(key.as_str());
                }
            }
            entries.iter().find_map(|(_, v)| duplicate_key(v))
        }
        _ => None,
    }
}

fn serialize(record: &TestRecord) -> StoreResult<Vec<u8>> {
    let file = RecordFileRef {
        format_version: FORMAT_VERSION,
        record,
    };
    serde_json::to_vec_pretty(&file).map_err(|e| CodecError::Unencodable(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, RecordStore) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::at(dir.path()).unwrap();
        (dir, store)
    }

    fn record(module: &str, function: &str, arg: i64, result: EncodedValue) -> TestRecord {
        TestRecord::new(
            module,
            function,
            vec![EncodedValue::Int(arg)],
            BTreeMap::new(),
            result,
        )
        .unwrap()
    }

    #[test]
    fn test_find_absent() {
        let (_dir, store) = store();
        let found = store
            .find("m", "f", &[EncodedValue::Int(1)], &BTreeMap::new())
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_save_then_find() {
        let (_dir, store) = store();
        let rec = record("m", "f", 1, EncodedValue::Float(2.5));
        store.save(&rec).unwrap();
        let found = store
            .find("m", "f", &[EncodedValue::Int(1)], &BTreeMap::new())
            .unwrap()
            .unwrap();
        assert_eq!(found, rec);
        assert_eq!(store.get(&rec.record_id).unwrap(), Some(rec));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (_dir, store) = store();
        let rec = record("m", "f", 1, EncodedValue::Null);
        let path = store.save(&rec).unwrap();
        fs::write(&path, b"{ not json").unwrap();

        let err = store
            .find("m", "f", &[EncodedValue::Int(1)], &BTreeMap::new())
            .unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_unsupported_format_version() {
        let (_dir, store) = store();
        let rec = record("m", "f", 1, EncodedValue::Null);
        let path = store.save(&rec).unwrap();
        let text = fs::read_to_string(&path)
            .unwrap()
            .replace("\"format_version\": 1", "\"format_version\": 99");
        fs::write(&path, text).unwrap();
        assert!(store.load(&path).unwrap_err().is_corrupt());
    }

    #[test]
    fn test_nesting_scan_skips_strings() {
        assert_eq!(nesting_beyond(br#"{"a":[[1]]}"#, 3), None);
        assert_eq!(nesting_beyond(br#"{"a":[[[1]]]}"#, 3), Some(4));
        assert_eq!(nesting_beyond(br#"{"a":"[[[[\"[[[["}"#, 1), None);
        assert_eq!(nesting_beyond(br#"["\\",[[]]]"#, 2), Some(3));
    }

    #[test]
    fn test_deepest_valid_object_loads() {
        let dir = TempDir::new().unwrap();
        let limits = Limits::with_max_depth(6);
        let store = RecordStore::open(
            StoreConfig::new(dir.path())
                .with_limits(limits)
                .with_policy(ResolutionPolicy::Lenient),
        )
        .unwrap();
        let mut value = EncodedValue::Int(1);
        for _ in 0..limits.max_depth {
            value = EncodedValue::object("app::Node", [("next", value)]);
        }
        limits.validate_value(&value).unwrap();

        let rec =
            TestRecord::new("m", "f", vec![value.clone()], BTreeMap::new(), value).unwrap();
        let path = store.save(&rec).unwrap();
        assert_eq!(store.load(&path).unwrap(), rec);
    }

    #[test]
    fn test_insert_first_writer_wins() {
        let (_dir, store) = store();
        let first = record("m", "f", 1, EncodedValue::Int(10));
        let second = record("m", "f", 1, EncodedValue::Int(20));
        assert!(store.insert(&first).unwrap());
        assert!(!store.insert(&second).unwrap());
        assert_eq!(store.get(&first.record_id).unwrap().unwrap().result, EncodedValue::Int(10));
    }

    #[test]
    fn test_pattern_parsing() {
        assert!(matches!(
            RecordPattern::parse("calc*").unwrap(),
            RecordPattern::Glob(_)
        ));
        assert!(matches!(
            RecordPattern::parse("calc").unwrap(),
            RecordPattern::Substring(_)
        ));
        assert!(RecordPattern::parse("").is_err());
        assert!(RecordPattern::parse("[").is_err());
    }

    #[test]
    fn test_record_files_ignores_temp_and_other_files() {
        let (dir, store) = store();
        store.save(&record("m", "f", 1, EncodedValue::Null)).unwrap();
        fs::write(dir.path().join(".x.tmp"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        assert_eq!(store.record_files().unwrap().len(), 1);
    }
}
