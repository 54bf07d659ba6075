//! Append-only paged storage of input lines.
//!
//! Lines live in fixed-capacity pages kept in an arena. Pages link to their
//! siblings by arena index, are filled front to back and are never moved or
//! reordered, so a `(page, offset)` position stays valid until the whole
//! store is released with [`PagedLineStore::free_all`].

mod line_info;

pub use line_info::LineInfo;

use serde::Serialize;

use crate::text::display_width;

/// Number of lines held by one page.
pub const PAGE_CAPACITY: usize = 1000;

/// Physical location of a stored line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowPos {
    pub page: usize,
    pub offset: usize,
}

#[derive(Debug)]
pub(crate) struct Page {
    first_row: usize,
    lines: Vec<Box<str>>,
    // Allocated on the first flag write, then always PAGE_CAPACITY long.
    info: Option<Box<[LineInfo]>>,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Page {
    fn new(first_row: usize, prev: Option<usize>) -> Self {
        Self {
            first_row,
            lines: Vec::with_capacity(PAGE_CAPACITY),
            info: None,
            prev,
            next: None,
        }
    }

    pub(crate) const fn first_row(&self) -> usize {
        self.first_row
    }

    pub(crate) fn nrows(&self) -> usize {
        self.lines.len()
    }

    pub(crate) const fn prev(&self) -> Option<usize> {
        self.prev
    }

    pub(crate) const fn next(&self) -> Option<usize> {
        self.next
    }

    fn is_full(&self) -> bool {
        self.lines.len() >= PAGE_CAPACITY
    }
}

/// Segmented line storage with lazily allocated per-line metadata.
#[derive(Debug, Default)]
pub struct PagedLineStore {
    pages: Vec<Page>,
    rows: usize,
    generation: u64,
    max_bytes: usize,
    max_width: usize,
}

impl PagedLineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one line, dropping a trailing line terminator.
    pub fn append(&mut self, line: impl Into<String>) -> RowPos {
        let mut line = line.into();
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        let needs_page = self.pages.last().is_none_or(Page::is_full);
        if needs_page {
            let prev = self.pages.len().checked_sub(1);
            let index = self.pages.len();
            if let Some(prev) = prev {
                self.pages[prev].next = Some(index);
            }
            self.pages.push(Page::new(self.rows, prev));
        }

        self.max_bytes = self.max_bytes.max(line.len());
        self.max_width = self.max_width.max(display_width(&line));

        let page = self.pages.len() - 1;
        let lines = &mut self.pages[page].lines;
        lines.push(line.into_boxed_str());
        self.rows += 1;
        RowPos {
            page,
            offset: lines.len() - 1,
        }
    }

    /// Store raw input bytes, replacing invalid UTF-8 sequences.
    pub fn append_bytes(&mut self, bytes: &[u8]) -> RowPos {
        self.append(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Line and metadata for an absolute row number.
    pub fn get(&self, row: usize) -> Option<(&str, LineInfo)> {
        let pos = self.position_of(row)?;
        Some((self.line(pos)?, self.info(pos)))
    }

    /// Physical position of an absolute row number.
    pub fn position_of(&self, row: usize) -> Option<RowPos> {
        if row >= self.rows {
            return None;
        }
        // Every page but the last is full.
        let pos = RowPos {
            page: row / PAGE_CAPACITY,
            offset: row % PAGE_CAPACITY,
        };
        debug_assert_eq!(self.pages[pos.page].first_row + pos.offset, row);
        Some(pos)
    }

    /// Absolute row number of a physical position.
    pub fn row_of(&self, pos: RowPos) -> Option<usize> {
        let page = self.pages.get(pos.page)?;
        (pos.offset < page.nrows()).then_some(page.first_row + pos.offset)
    }

    pub fn line(&self, pos: RowPos) -> Option<&str> {
        self.pages
            .get(pos.page)?
            .lines
            .get(pos.offset)
            .map(|line| &**line)
    }

    /// Metadata for a position; lines that were never flagged read as default.
    pub fn info(&self, pos: RowPos) -> LineInfo {
        self.pages
            .get(pos.page)
            .and_then(|page| page.info.as_ref())
            .and_then(|info| info.get(pos.offset))
            .copied()
            .unwrap_or_default()
    }

    /// In-place metadata access, allocating the page's info block on demand.
    pub(crate) fn info_mut(&mut self, pos: RowPos) -> Option<&mut LineInfo> {
        let page = self.pages.get_mut(pos.page)?;
        if pos.offset >= page.nrows() {
            return None;
        }
        let info = page
            .info
            .get_or_insert_with(|| vec![LineInfo::default(); PAGE_CAPACITY].into_boxed_slice());
        info.get_mut(pos.offset)
    }

    /// Release every page and invalidate all outstanding marks.
    pub fn free_all(&mut self) {
        self.pages = Vec::new();
        self.rows = 0;
        self.max_bytes = 0;
        self.max_width = 0;
        self.generation += 1;
        tracing::debug!(generation = self.generation, "line store released");
    }

    pub const fn row_count(&self) -> usize {
        self.rows
    }

    pub const fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Bumped by every [`free_all`](Self::free_all); marks remember it.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Length in bytes of the longest stored line.
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Display width of the widest stored line.
    pub const fn max_width(&self) -> usize {
        self.max_width
    }

    pub(crate) fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Lines in storage order, independent of any display order.
    pub fn lines(&self) -> PhysicalLines<'_> {
        PhysicalLines {
            store: self,
            cursor: StoreCursor::new(),
            row: 0,
        }
    }
}

/// Remembers the last page visited so nearby lookups follow sibling links
/// instead of starting from the head of the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreCursor {
    page: Option<usize>,
}

impl StoreCursor {
    pub const fn new() -> Self {
        Self { page: None }
    }

    /// Resolve `row`, walking from the remembered page.
    pub fn seek(&mut self, store: &PagedLineStore, row: usize) -> Option<RowPos> {
        if row >= store.row_count() {
            return None;
        }
        let mut index = self.page.filter(|&p| p < store.page_count()).unwrap_or(0);
        loop {
            let page = store.page(index)?;
            if row < page.first_row() {
                index = page.prev()?;
            } else if row >= page.first_row() + page.nrows() {
                index = page.next()?;
            } else {
                self.page = Some(index);
                return Some(RowPos {
                    page: index,
                    offset: row - page.first_row(),
                });
            }
        }
    }
}

/// Iterator over stored lines in physical order.
#[derive(Debug)]
pub struct PhysicalLines<'a> {
    store: &'a PagedLineStore,
    cursor: StoreCursor,
    row: usize,
}

impl<'a> Iterator for PhysicalLines<'a> {
    type Item = (&'a str, LineInfo);

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.cursor.seek(self.store, self.row)?;
        self.row += 1;
        Some((self.store.line(pos)?, self.store.info(pos)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.store.row_count().saturating_sub(self.row);
        (left, Some(left))
    }
}
