//! Per-line metadata kept alongside each stored line.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(transparent)]
    struct LineFlags: u8 {
        const BOOKMARK = 1 << 0;
        const FOUND = 1 << 1;
        /// The match straddles a wrapped or multi-line cell.
        const FOUND_MULTI = 1 << 2;
        const UNKNOWN = 1 << 3;
        /// This line continues the logical row started above it.
        const CONTINUATION = 1 << 4;
        /// Multiline detection looked at this line and found no continuation.
        const NO_CONTINUATION = 1 << 5;
    }
}

/// Flags and offsets attached to one stored line.
///
/// Readers get copies; writes go through [`crate::cursor::Mark`] so that
/// every mutation is validated against the current table generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineInfo {
    flags: LineFlags,
    start_char: Option<u32>,
    recno_offset: i16,
}

impl LineInfo {
    pub const fn is_bookmarked(&self) -> bool {
        self.flags.contains(LineFlags::BOOKMARK)
    }

    /// True when the last search (or highlight pass) matched this line.
    pub const fn is_found(&self) -> bool {
        self.flags.intersects(LineFlags::FOUND.union(LineFlags::FOUND_MULTI))
    }

    pub const fn is_found_multi_segment(&self) -> bool {
        self.flags.contains(LineFlags::FOUND_MULTI)
    }

    /// True when the line does not fit the detected table grid.
    pub const fn is_unknown(&self) -> bool {
        self.flags.contains(LineFlags::UNKNOWN)
    }

    pub const fn is_continuation(&self) -> bool {
        self.flags.contains(LineFlags::CONTINUATION)
    }

    pub const fn has_no_continuation(&self) -> bool {
        self.flags.contains(LineFlags::NO_CONTINUATION)
    }

    /// Character offset where the found match starts.
    pub const fn match_start(&self) -> Option<u32> {
        self.start_char
    }

    /// Offset (zero or negative) from this line back to its record banner.
    pub const fn recno_offset(&self) -> i16 {
        self.recno_offset
    }

    pub(crate) fn toggle_bookmark(&mut self) -> bool {
        self.flags.toggle(LineFlags::BOOKMARK);
        self.is_bookmarked()
    }

    pub(crate) fn set_bookmarked(&mut self, on: bool) {
        self.flags.set(LineFlags::BOOKMARK, on);
    }

    pub(crate) fn set_found(&mut self, start_char: u32, multi_segment: bool) {
        self.flags.remove(LineFlags::FOUND | LineFlags::FOUND_MULTI);
        self.flags.insert(if multi_segment {
            LineFlags::FOUND_MULTI
        } else {
            LineFlags::FOUND
        });
        self.start_char = Some(start_char);
    }

    pub(crate) fn set_start_char(&mut self, start_char: u32) {
        self.start_char = Some(start_char);
    }

    pub(crate) fn clear_found(&mut self) {
        self.flags.remove(LineFlags::FOUND | LineFlags::FOUND_MULTI);
        self.start_char = None;
    }

    pub(crate) fn set_unknown(&mut self, on: bool) {
        self.flags.set(LineFlags::UNKNOWN, on);
    }

    pub(crate) fn set_continuation(&mut self, on: bool) {
        self.flags.set(LineFlags::CONTINUATION, on);
    }

    pub(crate) fn set_no_continuation(&mut self, on: bool) {
        self.flags.set(LineFlags::NO_CONTINUATION, on);
    }

    pub(crate) fn set_recno_offset(&mut self, offset: i16) {
        self.recno_offset = offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_flags() {
        let info = LineInfo::default();
        assert!(!info.is_bookmarked());
        assert!(!info.is_found());
        assert!(!info.is_continuation());
        assert_eq!(info.match_start(), None);
        assert_eq!(info.recno_offset(), 0);
    }

    #[test]
    fn test_toggle_bookmark_flips() {
        let mut info = LineInfo::default();
        assert!(info.toggle_bookmark());
        assert!(!info.toggle_bookmark());
    }

    #[test]
    fn test_found_multi_replaces_plain_found() {
        let mut info = LineInfo::default();
        info.set_found(3, false);
        assert!(info.is_found());
        assert!(!info.is_found_multi_segment());

        info.set_found(5, true);
        assert!(info.is_found());
        assert!(info.is_found_multi_segment());
        assert_eq!(info.match_start(), Some(5));

        info.clear_found();
        assert!(!info.is_found());
        assert_eq!(info.match_start(), None);
    }

    #[test]
    fn test_flags_are_independent() {
        let mut info = LineInfo::default();
        info.set_bookmarked(true);
        info.set_continuation(true);
        info.set_found(0, false);
        info.clear_found();
        assert!(info.is_bookmarked());
        assert!(info.is_continuation());
        assert!(!info.has_no_continuation());
    }
}
