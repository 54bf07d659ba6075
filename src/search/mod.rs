//! Incremental search over the display order.
//!
//! Provides:
//! - Forward and backward search that wraps around once
//! - Smart, ignore and sensitive case modes
//! - Scopes: whole table, a selected rectangle, or one column
//! - Found flags on the matched lines for highlighting

use std::ops::Range;
use std::sync::atomic::{self, AtomicBool};

use regex::{Regex, RegexBuilder};
use serde::Serialize;

pub use crate::config::CaseMode;
use crate::cursor::Mark;
use crate::detect::{TableDescriptor, continued_head};
use crate::error::{EngineError, Result};
use crate::order::OrderIndex;
use crate::perf;
use crate::store::PagedLineStore;
use crate::text::{char_offset, column_span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDirection {
    #[default]
    Forward,
    Backward,
}

/// A rectangle of display rows by display columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedRegion {
    pub rows: Range<usize>,
    pub columns: Range<usize>,
}

/// Where a search looks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum SearchScope {
    /// Every data line.
    #[default]
    Table,
    Region(SelectedRegion),
    /// The cells of one detected column.
    Column(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub pattern: String,
    pub direction: SearchDirection,
    pub scope: SearchScope,
}

impl SearchQuery {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            direction: SearchDirection::Forward,
            scope: SearchScope::Table,
        }
    }

    #[must_use]
    pub const fn direction(mut self, direction: SearchDirection) -> Self {
        self.direction = direction;
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }
}

/// A search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FoundPosition {
    /// Display position of the line.
    pub position: usize,
    /// Row number in storage order.
    pub lineno: usize,
    pub start_char: usize,
    pub start_byte: usize,
    pub end_byte: usize,
    /// The match starts in a continued cell and ends on the next line;
    /// the byte range covers the part on this line.
    pub multi_segment: bool,
    /// The walk passed the end of the scope and continued from its start.
    pub wrapped: bool,
}

struct Matcher {
    regex: Regex,
}

impl Matcher {
    fn new(pattern: &str, case_mode: CaseMode) -> Result<Self> {
        if pattern.is_empty() {
            return Err(EngineError::EmptyPattern);
        }
        let insensitive = match case_mode {
            CaseMode::Smart => !pattern.chars().any(char::is_uppercase),
            CaseMode::Ignore => true,
            CaseMode::Sensitive => false,
        };
        let regex = RegexBuilder::new(&regex::escape(pattern))
            .case_insensitive(insensitive)
            .build()?;
        Ok(Self { regex })
    }

    /// Byte range of the first match inside `line[start..end]`.
    fn find_in(&self, line: &str, (start, end): (usize, usize)) -> Option<(usize, usize)> {
        self.regex
            .find(&line[start..end])
            .map(|found| (start + found.start(), start + found.end()))
    }

    /// Offset in `head` of the first match that begins in `head` and ends
    /// in `tail`.
    fn find_across(&self, head: &str, tail: &str) -> Option<usize> {
        if tail.is_empty() {
            return None;
        }
        let joined = format!("{head}{tail}");
        for (from, _) in head.char_indices() {
            let found = self.regex.find_at(&joined, from)?;
            if found.start() >= head.len() {
                return None;
            }
            if found.end() > head.len() {
                return Some(found.start());
            }
        }
        None
    }
}

/// A match in `line` (storage row `lineno`): its byte range and whether it
/// runs on into the continuation line below.
fn match_line(
    store: &PagedLineStore,
    desc: &TableDescriptor,
    matcher: &Matcher,
    scope: &SearchScope,
    lineno: usize,
    line: &str,
) -> Option<(usize, usize, bool)> {
    scope_span(desc, scope, line)
        .and_then(|span| matcher.find_in(line, span))
        .map(|(start, end)| (start, end, false))
        .or_else(|| {
            straddling_match(store, desc, matcher, scope, lineno, line)
                .map(|(start, end)| (start, end, true))
        })
}

/// A match that starts in a continued cell of `line` and ends in the same
/// cell of the next line. The range covers the part on `line`.
fn straddling_match(
    store: &PagedLineStore,
    desc: &TableDescriptor,
    matcher: &Matcher,
    scope: &SearchScope,
    lineno: usize,
    line: &str,
) -> Option<(usize, usize)> {
    if !desc.has_multilines {
        return None;
    }
    let mut columns = match scope {
        SearchScope::Table => 0..desc.columns,
        SearchScope::Column(column) => *column..*column + 1,
        SearchScope::Region(_) => return None,
    };
    let (next, info) = store.get(lineno + 1)?;
    if !info.is_continuation() {
        return None;
    }
    columns.find_map(|column| {
        let (start, end) = continued_head(desc, line, column)?;
        let tail = continued_head(desc, next, column)
            .map_or_else(|| desc.cell(next, column), |(s, e)| &next[s..e])
            .trim();
        matcher
            .find_across(&line[start..end], tail)
            .map(|offset| (start + offset, end))
    })
}

fn to_start_char(start_char: usize) -> u32 {
    u32::try_from(start_char).unwrap_or(u32::MAX)
}

/// The table a search runs against.
pub struct SearchContext<'a> {
    pub store: &'a mut PagedLineStore,
    pub desc: &'a TableDescriptor,
    pub order: &'a OrderIndex,
    pub interrupt: &'a AtomicBool,
}

impl SearchContext<'_> {
    fn interrupted(&self) -> Result<()> {
        if self.interrupt.load(atomic::Ordering::Relaxed) {
            Err(EngineError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// Search state: the case mode, the last query and the last hit.
#[derive(Debug, Clone, Default)]
pub struct SearchEngine {
    case_mode: CaseMode,
    last_query: Option<SearchQuery>,
    last_found: Option<Mark>,
    column_term: Option<(String, usize)>,
}

impl SearchEngine {
    pub fn new(case_mode: CaseMode) -> Self {
        Self {
            case_mode,
            ..Self::default()
        }
    }

    pub const fn case_mode(&self) -> CaseMode {
        self.case_mode
    }

    pub fn set_case_mode(&mut self, case_mode: CaseMode) {
        self.case_mode = case_mode;
    }

    pub const fn last_query(&self) -> Option<&SearchQuery> {
        self.last_query.as_ref()
    }

    pub const fn last_found(&self) -> Option<Mark> {
        self.last_found
    }

    /// The term and column of the last column search.
    pub fn column_term(&self) -> Option<(&str, usize)> {
        self.column_term
            .as_ref()
            .map(|(term, column)| (term.as_str(), *column))
    }

    /// Forget the last hit, e.g. after a reload or a new sort order.
    pub fn reset_position(&mut self) {
        self.last_found = None;
    }

    /// Find the next line matching `query` in display order.
    ///
    /// The walk starts just after (or before) the last hit and wraps once;
    /// the line of the last hit is tested last. A hit moves the found flag
    /// from the previous line to the new one.
    ///
    /// # Errors
    /// - [`EngineError::EmptyPattern`] for an empty pattern
    /// - [`EngineError::InvalidRegion`] for an empty region or one outside
    ///   the table
    /// - [`EngineError::ColumnOutOfRange`] for an unknown column scope
    /// - [`EngineError::Interrupted`] when `interrupt` is raised
    ///
    /// Previous search state is untouched on error.
    pub fn search(
        &mut self,
        cx: &mut SearchContext<'_>,
        query: &SearchQuery,
    ) -> Result<Option<FoundPosition>> {
        self.find(cx, query, true)
    }

    fn find(
        &mut self,
        cx: &mut SearchContext<'_>,
        query: &SearchQuery,
        include_origin: bool,
    ) -> Result<Option<FoundPosition>> {
        let _scope = perf::scope("search.find");
        let matcher = Matcher::new(&query.pattern, self.case_mode)?;
        let rows = scope_rows(cx.desc, cx.order, &query.scope)?;

        let origin = self
            .last_found
            .filter(|mark| mark.validate(cx.store).is_ok())
            .and_then(|mark| {
                cx.order
                    .entries()
                    .iter()
                    .position(|entry| *entry == mark.row_pos())
            })
            .filter(|position| rows.contains(position));

        let walk = Walk {
            rows,
            origin,
            include_origin,
            direction: query.direction,
        };
        let found = find_first(cx, &matcher, &query.scope, &walk)?;
        self.last_query = Some(query.clone());
        if let SearchScope::Column(column) = query.scope {
            self.column_term = Some((query.pattern.clone(), column));
        }

        let Some(found) = found else {
            if !include_origin && origin.is_some() {
                // back at the last hit: the next repeat starts from the edge
                if let Some(previous) = self.last_found.take() {
                    let _ = previous.clear_found(cx.store);
                }
            }
            tracing::debug!(pattern = %query.pattern, "no match");
            return Ok(None);
        };
        if let Some(previous) = self.last_found.take() {
            // a stale previous hit was wiped by the reload already
            let _ = previous.clear_found(cx.store);
        }
        let mark = Mark::at(cx.store, cx.order, found.position).ok_or(
            EngineError::RowOutOfRange {
                row: found.lineno,
                rows: cx.store.row_count(),
            },
        )?;
        mark.set_found(cx.store, to_start_char(found.start_char), found.multi_segment)?;
        self.last_found = Some(mark);
        tracing::trace!(
            position = found.position,
            lineno = found.lineno,
            wrapped = found.wrapped,
            "match"
        );
        Ok(Some(found))
    }

    /// Search for `term` inside one column and remember it for
    /// [`SearchEngine::search_next`].
    ///
    /// # Errors
    /// See [`SearchEngine::search`].
    pub fn search_in_column(
        &mut self,
        cx: &mut SearchContext<'_>,
        term: &str,
        column: usize,
        direction: SearchDirection,
    ) -> Result<Option<FoundPosition>> {
        let query = SearchQuery::new(term)
            .direction(direction)
            .scope(SearchScope::Column(column));
        self.search(cx, &query)
    }

    /// Repeat the last query in `direction`. Returns `Ok(None)` when nothing
    /// was searched yet.
    ///
    /// The line of the last hit is not tested again: coming back to it
    /// reports not-found and forgets the hit, so the following repeat walks
    /// the scope from its start (or end) again.
    ///
    /// # Errors
    /// See [`SearchEngine::search`].
    pub fn search_next(
        &mut self,
        cx: &mut SearchContext<'_>,
        direction: SearchDirection,
    ) -> Result<Option<FoundPosition>> {
        let Some(query) = self.last_query.clone() else {
            return Ok(None);
        };
        self.find(cx, &query.direction(direction), false)
    }

    /// Flag every data line matching `pattern` with the start of its first
    /// match. Returns the number of flagged lines.
    ///
    /// # Errors
    /// [`EngineError::EmptyPattern`] or [`EngineError::Interrupted`]; on
    /// interrupt no flags are changed.
    pub fn mark_all_matches(
        &mut self,
        cx: &mut SearchContext<'_>,
        pattern: &str,
    ) -> Result<usize> {
        let _scope = perf::scope("search.mark_all");
        let matcher = Matcher::new(pattern, self.case_mode)?;
        let mut hits = Vec::new();
        for (row, (line, _)) in cx.store.lines().enumerate() {
            cx.interrupted()?;
            if !cx.desc.is_data_row(row) {
                continue;
            }
            if let Some((start, _, multi)) =
                match_line(cx.store, cx.desc, &matcher, &SearchScope::Table, row, line)
            {
                hits.push((row, char_offset(line, start), multi));
            }
        }

        clear_found_flags(cx.store)?;
        for (row, start_char, multi) in &hits {
            if let Some(mark) = Mark::at_row(cx.store, *row) {
                mark.set_found(cx.store, to_start_char(*start_char), *multi)?;
            }
        }
        self.last_found = None;
        tracing::debug!(pattern, hits = hits.len(), "marked all matches");
        Ok(hits.len())
    }
}

/// Clear the found flag on every line.
///
/// # Errors
/// Never fails for the current generation.
pub fn clear_found_flags(store: &mut PagedLineStore) -> Result<()> {
    let found: Vec<usize> = (0..store.row_count())
        .filter(|&row| store.get(row).is_some_and(|(_, info)| info.is_found()))
        .collect();
    for row in found {
        if let Some(mark) = Mark::at_row(store, row) {
            mark.clear_found(store)?;
        }
    }
    Ok(())
}

/// Display positions covered by `scope`.
fn scope_rows(desc: &TableDescriptor, order: &OrderIndex, scope: &SearchScope) -> Result<Range<usize>> {
    match scope {
        SearchScope::Table => Ok(0..order.len()),
        SearchScope::Column(column) => {
            if *column >= desc.columns {
                return Err(EngineError::ColumnOutOfRange {
                    column: *column,
                    columns: desc.columns,
                });
            }
            Ok(0..order.len())
        }
        SearchScope::Region(region) => {
            if region.rows.is_empty()
                || region.columns.is_empty()
                || region.rows.start >= order.len()
                || region.columns.start >= desc.max_width
            {
                return Err(EngineError::InvalidRegion);
            }
            Ok(region.rows.start..region.rows.end.min(order.len()))
        }
    }
}

/// Byte range of `line` a scope searches.
fn scope_span(desc: &TableDescriptor, scope: &SearchScope, line: &str) -> Option<(usize, usize)> {
    match scope {
        SearchScope::Table => Some((0, line.len())),
        SearchScope::Region(region) => {
            column_span(line, region.columns.start, region.columns.end)
        }
        SearchScope::Column(column) => desc.cell_span(line, *column),
    }
}

struct Walk {
    rows: Range<usize>,
    origin: Option<usize>,
    include_origin: bool,
    direction: SearchDirection,
}

impl Walk {
    /// Display positions in visiting order: from the origin's neighbour
    /// around to the origin itself, or to the line before it when the
    /// origin is excluded.
    fn positions(&self) -> impl Iterator<Item = (usize, bool)> + '_ {
        let count = self.rows.len();
        let start = self.rows.start;
        let steps = if self.origin.is_some() && !self.include_origin {
            count - 1
        } else {
            count
        };
        (0..steps).map(move |step| {
            let offset = match (self.direction, self.origin) {
                (SearchDirection::Forward, Some(origin)) => (origin - start + 1 + step) % count,
                (SearchDirection::Forward, None) => step,
                (SearchDirection::Backward, Some(origin)) => {
                    (origin - start + count - 1 - step) % count
                }
                (SearchDirection::Backward, None) => count - 1 - step,
            };
            let position = start + offset;
            let wrapped = match (self.direction, self.origin) {
                (SearchDirection::Forward, Some(origin)) => position <= origin,
                (SearchDirection::Backward, Some(origin)) => position >= origin,
                (_, None) => false,
            };
            (position, wrapped)
        })
    }
}

fn find_first(
    cx: &SearchContext<'_>,
    matcher: &Matcher,
    scope: &SearchScope,
    walk: &Walk,
) -> Result<Option<FoundPosition>> {
    let (store, desc) = (&*cx.store, cx.desc);
    for (position, wrapped) in walk.positions() {
        cx.interrupted()?;
        let Some(pos) = cx.order.get(position) else {
            continue;
        };
        let (Some(lineno), Some(line)) = (store.row_of(pos), store.line(pos)) else {
            continue;
        };
        if !desc.is_data_row(lineno) {
            continue;
        }
        let Some((start_byte, end_byte, multi_segment)) =
            match_line(store, desc, matcher, scope, lineno, line)
        else {
            continue;
        };
        return Ok(Some(FoundPosition {
            position,
            lineno,
            start_char: char_offset(line, start_byte),
            start_byte,
            end_byte,
            multi_segment,
            wrapped,
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests;
