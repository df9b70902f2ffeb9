//! Interaction handler for the audit flow.
//!
//! An [`AuditSession`] answers the user actions of one browser session:
//! search by site id, open a record for editing, submit an edit, download the
//! workbook. It owns the dataset cache, the per-row view state and a queue of
//! notices the UI drains when it renders.

use crate::cache::DatasetCache;
use crate::error::StoreResult;
use crate::record::{Dataset, EditDraft, ID_COLUMN, RowKey};
use crate::store::Storage;
use serde::Serialize;
use std::collections::HashMap;

pub const MSG_SAVED: &str = "Data updated successfully!";
pub const MSG_NO_MATCHES: &str = "No matching records found.";
pub const MSG_DOWNLOADED: &str = "File downloaded successfully!";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
}

/// User-facing message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Notice {
            level: Level::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Notice {
            level: Level::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            level: Level::Error,
            message: message.into(),
        }
    }
}

/// One search match.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    pub key: RowKey,
    pub position: usize,
    /// Whether the row's detail view should render open.
    pub expanded: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SearchOutcome {
    /// Empty query: no search section at all.
    NoQuery,
    NoMatches,
    Matches(Vec<SearchHit>),
}

impl SearchOutcome {
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            SearchOutcome::Matches(hits) => hits,
            _ => &[],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    /// Persisted; the cache was refreshed and the row's view collapsed.
    Saved,
    /// Nothing persisted. The message is what the user was shown.
    Failed(String),
}

/// Positions of the rows whose site id contains `query`, ignoring case.
///
/// An empty query is distinct from a query that matches nothing. A dataset
/// without a site id column matches nothing.
pub fn search(dataset: &Dataset, query: &str) -> SearchOutcome {
    if query.is_empty() {
        return SearchOutcome::NoQuery;
    }
    let Some(id_index) = dataset.column_index(ID_COLUMN) else {
        return SearchOutcome::NoMatches;
    };

    let needle = query.to_lowercase();
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut hits = Vec::new();

    for (position, row) in dataset.rows().iter().enumerate() {
        let site_id = row[id_index].to_string();
        let ordinal = seen.entry(site_id.clone()).or_insert(0);
        if site_id.to_lowercase().contains(&needle) {
            hits.push(SearchHit {
                key: RowKey::new(site_id, *ordinal),
                position,
                expanded: true,
            });
        }
        *ordinal += 1;
    }

    if hits.is_empty() {
        SearchOutcome::NoMatches
    } else {
        SearchOutcome::Matches(hits)
    }
}

pub struct AuditSession<S> {
    cache: DatasetCache<S>,
    expanded: HashMap<RowKey, bool>,
    notices: Vec<Notice>,
}

impl<S: Storage> AuditSession<S> {
    pub fn new(storage: S) -> Self {
        AuditSession {
            cache: DatasetCache::new(storage),
            expanded: HashMap::new(),
            notices: Vec::new(),
        }
    }

    /// The full dataset, loading it if needed.
    pub fn dataset(&mut self) -> &Dataset {
        self.ensure_loaded();
        self.cache.get()
    }

    pub fn search(&mut self, query: &str) -> SearchOutcome {
        self.ensure_loaded();

        let mut outcome = search(self.cache.get(), query);
        match &mut outcome {
            SearchOutcome::NoQuery => {}
            SearchOutcome::NoMatches => self.notices.push(Notice::warning(MSG_NO_MATCHES)),
            SearchOutcome::Matches(hits) => {
                for hit in hits.iter_mut() {
                    // open by default the first time a row shows up
                    hit.expanded = *self.expanded.entry(hit.key.clone()).or_insert(true);
                }
            }
        }
        outcome
    }

    /// Draft seeded with the row's current editable values.
    pub fn begin_edit(&mut self, key: &RowKey) -> Option<EditDraft> {
        self.dataset().draft_for(key)
    }

    /// Apply a draft to its row and persist the whole dataset.
    ///
    /// The row is mutated before saving. If the save fails the mutation stays
    /// in memory, unsaved, until the next reload.
    pub fn submit_edit(&mut self, draft: &EditDraft) -> SubmitOutcome {
        self.ensure_loaded();

        let key = &draft.key;
        let Some(position) = self.cache.get().position_of(key) else {
            let message = format!("Error updating data: no record matches {}", key);
            log::warn!("{}", message);
            self.notices.push(Notice::error(message.clone()));
            return SubmitOutcome::Failed(message);
        };

        let written = self.cache.get_mut().apply_draft(position, draft);
        log::info!("applied {} field(s) to record {} at row {}", written, key, position);

        match self.cache.save() {
            Ok(()) => {
                self.cache.invalidate();
                self.ensure_loaded();
                self.expanded.insert(key.clone(), false);
                self.notices.push(Notice::info(MSG_SAVED));
                SubmitOutcome::Saved
            }
            Err(e) => {
                log::error!("save of record {} failed: {}", key, e);
                let message = format!("Error saving data: {}", e);
                self.notices.push(Notice::error(message.clone()));
                SubmitOutcome::Failed(message)
            }
        }
    }

    /// Workbook bytes for download, built from the cached dataset.
    pub fn export(&mut self) -> StoreResult<Vec<u8>> {
        self.ensure_loaded();

        let bytes = self.cache.export()?;
        self.notices.push(Notice::info(MSG_DOWNLOADED));
        Ok(bytes)
    }

    /// Forget the cached dataset so the next action re-reads the file.
    pub fn refresh(&mut self) {
        self.cache.invalidate();
    }

    pub fn set_expanded(&mut self, key: RowKey, expanded: bool) {
        self.expanded.insert(key, expanded);
    }

    pub fn is_expanded(&self, key: &RowKey) -> Option<bool> {
        self.expanded.get(key).copied()
    }

    /// Notices queued since the last call, oldest first.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn storage(&self) -> &S {
        self.cache.storage()
    }

    // Populate the cache, reporting a failed load once.
    fn ensure_loaded(&mut self) {
        self.cache.get();
        if let Some(e) = self.cache.take_load_error() {
            self.notices.push(Notice::error(format!("Error loading data: {}", e)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::record::Value;
    use crate::record::tests::{sample, text};
    use crate::store::XlsxStore;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    fn one_row() -> Dataset {
        Dataset::from_rows(
            vec!["SITEID".into(), "SITENAME".into(), "STATUS".into()],
            vec![vec![text("A1"), text("North"), text("Active")]],
        )
    }

    fn session_with(dataset: &Dataset) -> (TempDir, AuditSession<XlsxStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = XlsxStore::new(dir.path().join("assets.xlsx"));
        store.save(dataset).unwrap();
        (dir, AuditSession::new(store))
    }

    /// Loads from a real file but refuses every save.
    struct ReadOnly(XlsxStore);

    impl Storage for ReadOnly {
        fn load(&self) -> StoreResult<Dataset> {
            self.0.load()
        }

        fn save(&self, _dataset: &Dataset) -> StoreResult<()> {
            Err(StoreError::io(
                self.0.path(),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }

        fn export(&self, dataset: &Dataset) -> StoreResult<Vec<u8>> {
            self.0.export(dataset)
        }
    }

    /// Delegates to a real file and counts saves.
    struct Counting {
        inner: XlsxStore,
        saves: Cell<usize>,
    }

    impl Counting {
        fn new(inner: XlsxStore) -> Self {
            Counting {
                inner,
                saves: Cell::new(0),
            }
        }
    }

    impl Storage for Counting {
        fn load(&self) -> StoreResult<Dataset> {
            self.inner.load()
        }

        fn save(&self, dataset: &Dataset) -> StoreResult<()> {
            self.saves.set(self.saves.get() + 1);
            self.inner.save(dataset)
        }

        fn export(&self, dataset: &Dataset) -> StoreResult<Vec<u8>> {
            self.inner.export(dataset)
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let dataset = sample();
        let hits = search(&dataset, "a").hits().to_vec();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 2]);
        assert_eq!(hits[1].key, RowKey::new("A1", 1));

        assert_eq!(search(&dataset, "b7").hits().len(), 1);
        assert_eq!(search(&dataset, "zz"), SearchOutcome::NoMatches);
        assert_eq!(search(&dataset, ""), SearchOutcome::NoQuery);
    }

    #[test]
    fn search_treats_query_as_plain_text() {
        let dataset = Dataset::from_rows(
            vec!["SITEID".into()],
            vec![vec![text("X.1")], vec![text("XA1")]],
        );
        let hits = search(&dataset, ".").hits().to_vec();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 0);
    }

    #[test]
    fn search_matches_numeric_ids_by_string_form() {
        let dataset = Dataset::from_rows(
            vec!["SITEID".into()],
            vec![vec![Value::Number(1001.0)], vec![Value::Number(2002.0)]],
        );
        let hits = search(&dataset, "100").hits().to_vec();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].key, RowKey::new("1001", 0));
        assert!(search(&dataset, ".0").hits().is_empty());
    }

    #[test]
    fn search_without_id_column_matches_nothing() {
        let dataset = Dataset::from_rows(vec!["NAME".into()], vec![vec![text("A1")]]);
        assert_eq!(search(&dataset, "a"), SearchOutcome::NoMatches);
    }

    #[test]
    fn session_search_signals_no_matches() {
        let (_dir, mut session) = session_with(&one_row());

        let outcome = session.search("a1");
        assert_eq!(outcome.hits().len(), 1);
        assert!(outcome.hits()[0].expanded);
        assert!(session.drain_notices().is_empty());

        assert_eq!(session.search("zz"), SearchOutcome::NoMatches);
        assert_eq!(session.drain_notices(), vec![Notice::warning(MSG_NO_MATCHES)]);

        assert_eq!(session.search(""), SearchOutcome::NoQuery);
        assert!(session.drain_notices().is_empty());
    }

    #[test]
    fn submit_persists_and_collapses_the_row() {
        let (_dir, mut session) = session_with(&one_row());
        let key = RowKey::new("A1", 0);
        session.search("a1");
        assert_eq!(session.is_expanded(&key), Some(true));

        let mut draft = session.begin_edit(&key).unwrap();
        assert_eq!(draft.get("STATUS"), Some("Active"));
        draft.set("STATUS", "Inactive");

        assert_eq!(session.submit_edit(&draft), SubmitOutcome::Saved);
        assert_eq!(session.drain_notices(), vec![Notice::info(MSG_SAVED)]);
        assert_eq!(session.is_expanded(&key), Some(false));
        assert!(!session.search("a1").hits()[0].expanded);
        session.set_expanded(key.clone(), true);
        assert!(session.search("a1").hits()[0].expanded);

        let expected = Dataset::from_rows(
            vec!["SITEID".into(), "SITENAME".into(), "STATUS".into()],
            vec![vec![text("A1"), text("North"), text("Inactive")]],
        );
        assert_eq!(session.dataset(), &expected);
        assert_eq!(session.storage().load().unwrap(), expected);
    }

    #[test]
    fn identical_draft_still_saves() {
        let dir = tempfile::tempdir().unwrap();
        let store = XlsxStore::new(dir.path().join("assets.xlsx"));
        store.save(&one_row()).unwrap();
        let mut session = AuditSession::new(Counting::new(store));

        let draft = session.begin_edit(&RowKey::new("A1", 0)).unwrap();
        assert_eq!(session.submit_edit(&draft), SubmitOutcome::Saved);

        assert_eq!(session.storage().saves.get(), 1);
        assert_eq!(session.drain_notices(), vec![Notice::info(MSG_SAVED)]);
        assert_eq!(session.dataset(), &one_row());
    }

    #[test]
    fn numeric_cells_become_text_after_an_edit() {
        let dataset = Dataset::from_rows(
            vec!["SITEID".into(), "SITENAME".into(), "CAPACITY".into()],
            vec![vec![text("A1"), text("North"), Value::Number(40.0)]],
        );
        let (_dir, mut session) = session_with(&dataset);
        let draft = session.begin_edit(&RowKey::new("A1", 0)).unwrap();
        assert_eq!(draft.get("CAPACITY"), Some("40"));

        session.submit_edit(&draft);
        assert_eq!(session.dataset().value(0, "CAPACITY"), Some(&text("40")));
    }

    #[test]
    fn duplicate_ids_are_edited_independently() {
        let (_dir, mut session) = session_with(&sample());
        let mut draft = EditDraft::new(RowKey::new("A1", 1));
        draft.set("STATUS", "Closed");

        assert_eq!(session.submit_edit(&draft), SubmitOutcome::Saved);
        let dataset = session.dataset();
        assert_eq!(dataset.value(0, "STATUS"), Some(&text("Active")));
        assert_eq!(dataset.value(2, "STATUS"), Some(&text("Closed")));
        assert_eq!(dataset.len(), 3);
    }

    #[test]
    fn unknown_row_is_reported() {
        let (_dir, mut session) = session_with(&one_row());
        let mut draft = EditDraft::new(RowKey::new("Q9", 0));
        draft.set("STATUS", "x");

        let SubmitOutcome::Failed(message) = session.submit_edit(&draft) else {
            panic!("expected failure");
        };
        assert!(message.starts_with("Error updating data:"));
        assert_eq!(session.drain_notices()[0].level, Level::Error);
    }

    #[test]
    fn failed_save_keeps_file_and_in_memory_edit() {
        let dir = tempfile::tempdir().unwrap();
        let store = XlsxStore::new(dir.path().join("assets.xlsx"));
        store.save(&one_row()).unwrap();
        let on_disk = fs::read(store.path()).unwrap();

        let mut session = AuditSession::new(ReadOnly(store));
        let key = RowKey::new("A1", 0);
        session.search("a1");
        let mut draft = session.begin_edit(&key).unwrap();
        draft.set("STATUS", "Inactive");

        let SubmitOutcome::Failed(message) = session.submit_edit(&draft) else {
            panic!("expected failure");
        };
        assert!(message.starts_with("Error saving data:"));
        assert!(message.contains("read-only"));
        assert_eq!(session.drain_notices(), vec![Notice::error(message)]);

        assert_eq!(fs::read(session.storage().0.path()).unwrap(), on_disk);
        assert_eq!(session.dataset().value(0, "STATUS"), Some(&text("Inactive")));
        assert_eq!(session.is_expanded(&key), Some(true));

        session.refresh();
        assert_eq!(session.dataset().value(0, "STATUS"), Some(&text("Active")));
    }

    #[test]
    fn missing_file_reports_once_and_stays_usable() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = AuditSession::new(XlsxStore::new(dir.path().join("assets.xlsx")));

        assert!(session.dataset().is_empty());
        let notices = session.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, Level::Error);
        assert!(notices[0].message.starts_with("Error loading data:"));

        assert_eq!(session.search("a1"), SearchOutcome::NoMatches);
        assert_eq!(session.drain_notices(), vec![Notice::warning(MSG_NO_MATCHES)]);
        assert!(session.export().is_ok());
    }

    #[test]
    fn export_reflects_cache_and_reads_back() {
        let (_dir, mut session) = session_with(&sample());
        let bytes = session.export().unwrap();
        assert_eq!(crate::loader::from_bytes(&bytes).unwrap(), sample());
        assert_eq!(session.drain_notices(), vec![Notice::info(MSG_DOWNLOADED)]);
    }
}
