//! The engine context: one table and everything derived from it.
//!
//! A [`Session`] owns the line store, the table descriptor, the display
//! order and the search state. Input is streamed in with
//! [`Session::append_line`]; detection runs once enough rows are buffered
//! (or at [`Session::finish`]) and later rows only extend the descriptor.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::CaseMode;
use crate::cursor::{LineIter, Mark, Rows};
use crate::detect::{DetectOptions, TableDescriptor, analyze};
use crate::error::{EngineError, Result};
use crate::order::{OrderIndex, SortRequest, sort_by_column};
use crate::rows::{RowSet, format_rows, load_formatted};
use crate::search::{FoundPosition, SearchContext, SearchDirection, SearchEngine, SearchQuery};
use crate::store::PagedLineStore;

/// Rows buffered before the table structure is detected.
pub const DETECT_AFTER_ROWS: usize = 100;

/// Cancellation flag shared with a signal or key handler.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// The shared flag, for handlers living on other threads.
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }

    fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub detect: DetectOptions,
    pub case_mode: CaseMode,
    pub detect_after_rows: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            detect: DetectOptions::default(),
            case_mode: CaseMode::default(),
            detect_after_rows: DETECT_AFTER_ROWS,
        }
    }
}

#[derive(Debug, Default)]
pub struct Session {
    store: PagedLineStore,
    desc: TableDescriptor,
    order: OrderIndex,
    search: SearchEngine,
    sort: Option<SortRequest>,
    interrupt: Interrupt,
    options: SessionOptions,
    filename: Option<String>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            search: SearchEngine::new(options.case_mode),
            options,
            ..Self::default()
        }
    }

    /// Name the input; carried into every descriptor built from now on.
    pub fn set_filename(&mut self, filename: impl Into<String>) {
        let filename = filename.into();
        self.desc.filename = Some(filename.clone());
        self.filename = Some(filename);
    }

    pub const fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub const fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub const fn store(&self) -> &PagedLineStore {
        &self.store
    }

    /// The table model. Before detection this is an uninitialized default.
    pub const fn descriptor(&self) -> &TableDescriptor {
        &self.desc
    }

    pub const fn is_detected(&self) -> bool {
        self.desc.initialized
    }

    pub const fn order(&self) -> &OrderIndex {
        &self.order
    }

    pub const fn search_engine(&self) -> &SearchEngine {
        &self.search
    }

    pub fn set_case_mode(&mut self, case_mode: CaseMode) {
        self.options.case_mode = case_mode;
        self.search.set_case_mode(case_mode);
    }

    /// The active sort, if any.
    pub const fn sort_request(&self) -> Option<&SortRequest> {
        self.sort.as_ref()
    }

    pub const fn row_count(&self) -> usize {
        self.store.row_count()
    }

    pub fn iter(&self) -> LineIter<'_> {
        LineIter::new(&self.store, &self.order)
    }

    /// Line texts in display order.
    pub fn rows(&self) -> Rows<'_> {
        Rows::new(&self.store, &self.order)
    }

    pub fn mark(&self, position: usize) -> Option<Mark> {
        Mark::at(&self.store, &self.order, position)
    }

    /// Stream one line in.
    ///
    /// # Errors
    /// Propagates flag write failures from detection.
    pub fn append_line(&mut self, line: impl Into<String>) -> Result<()> {
        let from_row = self.store.row_count();
        self.store.append(line);
        self.after_append(from_row)
    }

    /// Stream one line of raw bytes in, replacing invalid UTF-8.
    ///
    /// # Errors
    /// See [`Session::append_line`].
    pub fn append_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let from_row = self.store.row_count();
        self.store.append_bytes(bytes);
        self.after_append(from_row)
    }

    fn after_append(&mut self, from_row: usize) -> Result<()> {
        if self.desc.initialized {
            self.desc.observe_appended(&mut self.store, from_row)?;
        } else if self.store.row_count() >= self.options.detect_after_rows {
            self.detect()?;
        }
        self.order.extend_identity(self.store.row_count());
        Ok(())
    }

    /// Read every line of `reader`, then [`Session::finish`].
    /// Returns the number of lines read.
    ///
    /// # Errors
    /// I/O errors from `reader`, or anything [`Session::finish`] returns.
    pub fn read_from<R: BufRead>(&mut self, mut reader: R) -> Result<usize> {
        let mut buf = Vec::new();
        let mut count = 0;
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            self.append_bytes(&buf)?;
            count += 1;
        }
        self.finish()?;
        Ok(count)
    }

    /// End of input: detect if that has not happened yet, mark the
    /// descriptor complete and re-apply the active sort to the full table.
    ///
    /// # Errors
    /// [`EngineError::Interrupted`] when re-sorting is cancelled.
    pub fn finish(&mut self) -> Result<()> {
        if !self.desc.initialized {
            self.detect()?;
        }
        self.order.extend_identity(self.store.row_count());
        self.desc.completed = true;
        if let Some(request) = self.sort {
            self.sort(request)?;
        }
        Ok(())
    }

    fn detect(&mut self) -> Result<()> {
        self.desc = analyze(&mut self.store, &self.options.detect)?;
        self.desc.filename.clone_from(&self.filename);
        tracing::debug!(
            rows = self.store.row_count(),
            columns = self.desc.columns,
            "table structure detected"
        );
        Ok(())
    }

    /// Replace the content with a formatted row source.
    ///
    /// # Errors
    /// Propagates flag write failures.
    pub fn load_rows(&mut self, rows: &RowSet) -> Result<()> {
        self.clear_content();
        let table = format_rows(rows);
        self.desc = load_formatted(&mut self.store, &table)?;
        self.desc.filename.clone_from(&self.filename);
        self.desc.completed = true;
        self.order = OrderIndex::build_identity(self.store.row_count());
        if let Some(request) = self.sort {
            self.sort(request)?;
        }
        Ok(())
    }

    /// Drop all lines ahead of re-reading the input. The sort request is
    /// kept and re-applied by [`Session::finish`]; marks taken before the
    /// reload become stale.
    pub fn reload(&mut self) {
        self.clear_content();
        tracing::debug!(generation = self.store.generation(), "session reloaded");
    }

    fn clear_content(&mut self) {
        self.store.free_all();
        self.desc = TableDescriptor {
            filename: self.filename.clone(),
            ..TableDescriptor::default()
        };
        self.order = OrderIndex::default();
        self.search.reset_position();
    }

    /// Index of the column named `name`, ignoring ASCII case.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.desc
            .cranges
            .iter()
            .position(|range| range.name.eq_ignore_ascii_case(name))
    }

    /// Sort the data rows. The order is left unchanged on error.
    ///
    /// # Errors
    /// See [`sort_by_column`].
    pub fn sort(&mut self, request: SortRequest) -> Result<()> {
        self.ensure_detected()?;
        self.order = sort_by_column(
            &self.store,
            &self.desc,
            &self.order,
            &request,
            self.interrupt.flag(),
        )?;
        self.sort = Some(request);
        Ok(())
    }

    /// Back to storage order.
    pub fn reset_order(&mut self) {
        self.order = OrderIndex::build_identity(self.store.row_count());
        self.sort = None;
    }

    fn ensure_detected(&mut self) -> Result<()> {
        if self.desc.initialized {
            Ok(())
        } else {
            self.detect()
        }
    }

    fn with_search<T>(
        &mut self,
        run: impl FnOnce(&mut SearchEngine, &mut SearchContext<'_>) -> Result<T>,
    ) -> Result<T> {
        self.ensure_detected()?;
        let mut cx = SearchContext {
            store: &mut self.store,
            desc: &self.desc,
            order: &self.order,
            interrupt: self.interrupt.flag(),
        };
        run(&mut self.search, &mut cx)
    }

    /// # Errors
    /// See [`SearchEngine::search`].
    pub fn search(&mut self, query: &SearchQuery) -> Result<Option<FoundPosition>> {
        self.with_search(|engine, cx| engine.search(cx, query))
    }

    /// # Errors
    /// See [`SearchEngine::search`].
    pub fn search_in_column(
        &mut self,
        term: &str,
        column: usize,
        direction: SearchDirection,
    ) -> Result<Option<FoundPosition>> {
        self.with_search(|engine, cx| engine.search_in_column(cx, term, column, direction))
    }

    /// # Errors
    /// See [`SearchEngine::search`].
    pub fn search_next(&mut self, direction: SearchDirection) -> Result<Option<FoundPosition>> {
        self.with_search(|engine, cx| engine.search_next(cx, direction))
    }

    /// # Errors
    /// See [`SearchEngine::mark_all_matches`].
    pub fn mark_all_matches(&mut self, pattern: &str) -> Result<usize> {
        self.with_search(|engine, cx| engine.mark_all_matches(cx, pattern))
    }

    /// Flip the bookmark of the line at display `position`.
    ///
    /// # Errors
    /// [`EngineError::RowOutOfRange`] for a position past the end.
    pub fn toggle_bookmark(&mut self, position: usize) -> Result<bool> {
        let mark = self.mark(position).ok_or(EngineError::RowOutOfRange {
            row: position,
            rows: self.order.len(),
        })?;
        mark.toggle_bookmark(&mut self.store)
    }

    /// Nearest bookmarked display position after `position`.
    pub fn next_bookmark(&self, position: usize) -> Option<usize> {
        LineIter::at(&self.store, &self.order, position + 1)
            .find(|line| line.info.is_bookmarked())
            .map(|line| line.position)
    }

    /// Nearest bookmarked display position before `position`.
    pub fn prev_bookmark(&self, position: usize) -> Option<usize> {
        (0..position.min(self.order.len())).rev().find(|&candidate| {
            self.order
                .get(candidate)
                .is_some_and(|pos| self.store.info(pos).is_bookmarked())
        })
    }

    /// Record number of the expanded record shown at `position`.
    pub fn record_number(&self, position: usize) -> Option<u64> {
        let row = self.store.row_of(self.order.get(position)?)?;
        self.desc.record_number(&self.store, row)
    }
}
