//! Cursors over the display order and storable line marks.
//!
//! A [`LineIter`] walks an [`OrderIndex`] snapshot in both directions and
//! resolves entries against the [`PagedLineStore`]. A [`Mark`] is a copyable
//! snapshot of one line's location that outlives the iterator which
//! produced it. Every flag write (bookmarks, search hits, continuation marks,
//! record offsets) goes through a mark, which checks the store generation
//! first so a mark taken before a reload is rejected instead of resolved.

use crate::error::{EngineError, Result};
use crate::order::OrderIndex;
use crate::store::{LineInfo, PagedLineStore, RowPos};

/// A line as seen through a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRef<'a> {
    pub text: &'a str,
    pub info: LineInfo,
    /// Absolute row number in storage order.
    pub lineno: usize,
    /// Position in the current display order.
    pub position: usize,
    pos: RowPos,
}

impl LineRef<'_> {
    pub const fn row_pos(&self) -> RowPos {
        self.pos
    }
}

/// Bidirectional cursor over an order index.
#[derive(Debug, Clone)]
pub struct LineIter<'a> {
    store: &'a PagedLineStore,
    order: &'a OrderIndex,
    position: usize,
}

impl<'a> LineIter<'a> {
    /// Cursor positioned at display position 0.
    pub const fn new(store: &'a PagedLineStore, order: &'a OrderIndex) -> Self {
        Self {
            store,
            order,
            position: 0,
        }
    }

    /// Cursor positioned at `position`, clamped to the end of the index.
    pub fn at(store: &'a PagedLineStore, order: &'a OrderIndex, position: usize) -> Self {
        Self {
            store,
            order,
            position: position.min(order.len()),
        }
    }

    /// Move to a display position. Returns `false` when out of range.
    pub fn seek(&mut self, position: usize) -> bool {
        if position < self.order.len() {
            self.position = position;
            true
        } else {
            false
        }
    }

    pub const fn position(&self) -> usize {
        self.position
    }

    pub fn step_forward(&mut self) -> bool {
        self.seek(self.position + 1)
    }

    pub fn step_backward(&mut self) -> bool {
        match self.position.checked_sub(1) {
            Some(position) => self.seek(position),
            None => false,
        }
    }

    /// The line under the cursor.
    pub fn current(&self) -> Option<LineRef<'a>> {
        let pos = self.order.get(self.position)?;
        Some(LineRef {
            text: self.store.line(pos)?,
            info: self.store.info(pos),
            lineno: self.store.row_of(pos)?,
            position: self.position,
            pos,
        })
    }

    /// Snapshot of the cursor's current line.
    pub fn mark(&self) -> Option<Mark> {
        self.current().map(|line| Mark::from_line(self.store, &line))
    }
}

impl<'a> Iterator for LineIter<'a> {
    type Item = LineRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.current()?;
        self.position += 1;
        Some(line)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.order.len().saturating_sub(self.position);
        (left, Some(left))
    }
}

/// Line texts in display order, for export.
#[derive(Debug, Clone)]
pub struct Rows<'a> {
    inner: LineIter<'a>,
}

impl<'a> Rows<'a> {
    pub const fn new(store: &'a PagedLineStore, order: &'a OrderIndex) -> Self {
        Self {
            inner: LineIter::new(store, order),
        }
    }
}

impl<'a> Iterator for Rows<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|line| line.text)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Storable location of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mark {
    pos: RowPos,
    lineno: usize,
    position: usize,
    generation: u64,
}

impl Mark {
    /// Mark the line shown at display `position`.
    pub fn at(store: &PagedLineStore, order: &OrderIndex, position: usize) -> Option<Self> {
        LineIter::at(store, order, position).mark()
    }

    /// Mark an absolute row in storage order.
    pub fn at_row(store: &PagedLineStore, row: usize) -> Option<Self> {
        let pos = store.position_of(row)?;
        Some(Self {
            pos,
            lineno: row,
            position: row,
            generation: store.generation(),
        })
    }

    fn from_line(store: &PagedLineStore, line: &LineRef<'_>) -> Self {
        Self {
            pos: line.pos,
            lineno: line.lineno,
            position: line.position,
            generation: store.generation(),
        }
    }

    pub const fn lineno(&self) -> usize {
        self.lineno
    }

    /// Display position at the time the mark was taken.
    pub const fn position(&self) -> usize {
        self.position
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn row_pos(&self) -> RowPos {
        self.pos
    }

    /// Check that the mark belongs to the store's current generation.
    ///
    /// # Errors
    /// Returns [`EngineError::StaleMark`] after a reload.
    pub fn validate(&self, store: &PagedLineStore) -> Result<()> {
        if self.generation == store.generation() {
            Ok(())
        } else {
            Err(EngineError::StaleMark {
                mark: self.generation,
                current: store.generation(),
            })
        }
    }

    /// The marked line and its metadata.
    ///
    /// # Errors
    /// Returns an error when the mark is stale or points past the stored rows.
    pub fn resolve<'s>(&self, store: &'s PagedLineStore) -> Result<(&'s str, LineInfo)> {
        self.validate(store)?;
        let line = store.line(self.pos).ok_or(EngineError::RowOutOfRange {
            row: self.lineno,
            rows: store.row_count(),
        })?;
        Ok((line, store.info(self.pos)))
    }

    /// # Errors
    /// See [`Mark::resolve`].
    pub fn line<'s>(&self, store: &'s PagedLineStore) -> Result<&'s str> {
        self.resolve(store).map(|(line, _)| line)
    }

    /// # Errors
    /// See [`Mark::resolve`].
    pub fn info(&self, store: &PagedLineStore) -> Result<LineInfo> {
        self.resolve(store).map(|(_, info)| info)
    }

    fn update<R>(
        &self,
        store: &mut PagedLineStore,
        apply: impl FnOnce(&mut LineInfo) -> R,
    ) -> Result<R> {
        self.validate(store)?;
        let rows = store.row_count();
        let info = store.info_mut(self.pos).ok_or(EngineError::RowOutOfRange {
            row: self.lineno,
            rows,
        })?;
        Ok(apply(info))
    }

    /// Flip the bookmark flag and return its new state.
    ///
    /// # Errors
    /// See [`Mark::resolve`].
    pub fn toggle_bookmark(&self, store: &mut PagedLineStore) -> Result<bool> {
        self.update(store, LineInfo::toggle_bookmark)
    }

    /// # Errors
    /// See [`Mark::resolve`].
    pub fn set_bookmarked(&self, store: &mut PagedLineStore, on: bool) -> Result<()> {
        self.update(store, |info| info.set_bookmarked(on))
    }

    /// Record a search hit starting at character `start_char`.
    ///
    /// # Errors
    /// See [`Mark::resolve`].
    pub fn set_found(
        &self,
        store: &mut PagedLineStore,
        start_char: u32,
        multi_segment: bool,
    ) -> Result<()> {
        self.update(store, |info| info.set_found(start_char, multi_segment))
    }

    /// # Errors
    /// See [`Mark::resolve`].
    pub fn clear_found(&self, store: &mut PagedLineStore) -> Result<()> {
        self.update(store, LineInfo::clear_found)
    }

    /// Move the highlighted match start of a found line.
    ///
    /// # Errors
    /// See [`Mark::resolve`].
    pub fn set_start_char(&self, store: &mut PagedLineStore, start_char: u32) -> Result<()> {
        self.update(store, |info| info.set_start_char(start_char))
    }

    /// Relate the line to its expanded-mode record banner.
    ///
    /// # Errors
    /// See [`Mark::resolve`].
    pub fn set_recno_offset(&self, store: &mut PagedLineStore, offset: i16) -> Result<()> {
        self.update(store, |info| info.set_recno_offset(offset))
    }

    pub(crate) fn set_unknown(&self, store: &mut PagedLineStore, on: bool) -> Result<()> {
        self.update(store, |info| info.set_unknown(on))
    }

    pub(crate) fn set_continuation(
        &self,
        store: &mut PagedLineStore,
        continuation: bool,
        no_continuation: bool,
    ) -> Result<()> {
        self.update(store, |info| {
            info.set_continuation(continuation);
            info.set_no_continuation(no_continuation);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(lines: &[&str]) -> (PagedLineStore, OrderIndex) {
        let mut store = PagedLineStore::new();
        for line in lines {
            store.append(*line);
        }
        let order = OrderIndex::build_identity(store.row_count());
        (store, order)
    }

    #[test]
    fn test_iterates_forward_in_order() {
        let (store, order) = fixture(&["a", "b", "c"]);
        let texts: Vec<_> = LineIter::new(&store, &order).map(|l| l.text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_steps_both_directions() {
        let (store, order) = fixture(&["a", "b", "c"]);
        let mut iter = LineIter::new(&store, &order);
        assert!(!iter.step_backward());
        assert!(iter.step_forward());
        assert!(iter.step_forward());
        assert!(!iter.step_forward());
        assert_eq!(iter.current().unwrap().text, "c");
        assert!(iter.step_backward());
        assert_eq!(iter.current().unwrap().lineno, 1);
    }

    #[test]
    fn test_seek_out_of_range_keeps_position() {
        let (store, order) = fixture(&["a", "b"]);
        let mut iter = LineIter::new(&store, &order);
        assert!(iter.seek(1));
        assert!(!iter.seek(2));
        assert_eq!(iter.position(), 1);
    }

    #[test]
    fn test_mark_survives_iterator_movement() {
        let (store, order) = fixture(&["zero", "one", "two", "three"]);
        let mut iter = LineIter::new(&store, &order);
        iter.seek(2);
        let mark = iter.mark().unwrap();
        for _ in 0..5 {
            iter.step_forward();
            iter.step_backward();
        }
        iter.seek(0);
        assert_eq!(mark.line(&store).unwrap(), "two");
        assert_eq!(mark.lineno(), 2);
    }

    #[test]
    fn test_bookmark_toggle_through_mark() {
        let (mut store, order) = fixture(&["a", "b"]);
        let mark = Mark::at(&store, &order, 1).unwrap();
        assert!(mark.toggle_bookmark(&mut store).unwrap());
        assert!(mark.info(&store).unwrap().is_bookmarked());
        assert!(!mark.toggle_bookmark(&mut store).unwrap());
    }

    #[test]
    fn test_stale_mark_is_rejected() {
        let (mut store, order) = fixture(&["a", "b"]);
        let mark = Mark::at(&store, &order, 0).unwrap();
        store.free_all();
        store.append("new");
        assert!(matches!(
            mark.line(&store),
            Err(EngineError::StaleMark { mark: 0, current: 1 })
        ));
        assert!(mark.toggle_bookmark(&mut store).is_err());
    }

    #[test]
    fn test_rows_follow_display_order() {
        let (store, _) = fixture(&["a", "b", "c"]);
        let order = OrderIndex::from_entries(vec![
            store.position_of(2).unwrap(),
            store.position_of(0).unwrap(),
            store.position_of(1).unwrap(),
        ]);
        let rows: Vec<_> = Rows::new(&store, &order).collect();
        assert_eq!(rows, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_found_flag_round_trip() {
        let (mut store, _) = fixture(&["alpha"]);
        let mark = Mark::at_row(&store, 0).unwrap();
        mark.set_found(&mut store, 2, false).unwrap();
        assert_eq!(mark.info(&store).unwrap().match_start(), Some(2));
        mark.set_start_char(&mut store, 4).unwrap();
        assert_eq!(mark.info(&store).unwrap().match_start(), Some(4));
        mark.clear_found(&mut store).unwrap();
        assert!(!mark.info(&store).unwrap().is_found());
    }

    #[test]
    fn test_recno_offset_through_mark() {
        let (mut store, _) = fixture(&["-[ RECORD 1 ]-", "id | 1", "name | a"]);
        let mark = Mark::at_row(&store, 2).unwrap();
        mark.set_recno_offset(&mut store, -2).unwrap();
        assert_eq!(mark.info(&store).unwrap().recno_offset(), -2);

        store.free_all();
        store.append("again");
        assert!(matches!(
            mark.set_recno_offset(&mut store, 1),
            Err(EngineError::StaleMark { .. })
        ));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn mark_resolves_to_same_bytes_after_steps(
                count in 1..3000usize,
                start in 0..3000usize,
                steps in proptest::collection::vec(any::<bool>(), 10),
            ) {
                let mut store = PagedLineStore::new();
                for i in 0..count {
                    store.append(format!("row {i}"));
                }
                let order = OrderIndex::build_identity(store.row_count());
                let start = start % count;
                let mark = Mark::at(&store, &order, start).unwrap();
                let before = mark.line(&store).unwrap().to_string();

                let mut iter = LineIter::new(&store, &order);
                for forward in steps {
                    if forward { iter.step_forward(); } else { iter.step_backward(); }
                }
                prop_assert_eq!(mark.line(&store).unwrap(), before.as_str());
            }
        }
    }
}
