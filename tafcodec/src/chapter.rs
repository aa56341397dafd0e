//! Chapter tracker (C5).

use crate::error::{CodecError, Result};

/// Maximum number of chapters a single TAF file may record.
pub const MAX_CHAPTERS: usize = 100;

/// Records the page index at which each new logical track begins.
///
/// The first entry is implicitly `0` and is present from construction; it
/// does not count against [`MAX_CHAPTERS`] on its own since it is never
/// added again by `new_chapter`.
#[derive(Debug, Clone)]
pub struct ChapterTracker {
    page_nums: Vec<u32>,
}

impl ChapterTracker {
    pub fn new() -> Self {
        Self { page_nums: vec![0] }
    }

    /// Records `current_page` as the start of a new chapter.
    ///
    /// Fails with [`CodecError::TooManyChapters`] if the limit would be
    /// exceeded, and is a no-op (not an error) if `current_page` would not
    /// keep the list strictly increasing (e.g. called twice with no pages
    /// emitted in between) other than to reject it silently would violate
    /// the invariant, so such a call is rejected just like the over-limit
    /// case would be: callers are expected to only call this between pages.
    pub fn new_chapter(&mut self, current_page: u32) -> Result<()> {
        if self.page_nums.len() >= MAX_CHAPTERS {
            return Err(CodecError::TooManyChapters(MAX_CHAPTERS));
        }
        if let Some(&last) = self.page_nums.last() {
            if current_page <= last {
                // Already marked at (or before) this page; nothing to do.
                return Ok(());
            }
        }
        self.page_nums.push(current_page);
        Ok(())
    }

    pub fn page_nums(&self) -> &[u32] {
        &self.page_nums
    }

    pub fn into_page_nums(self) -> Vec<u32> {
        self.page_nums
    }
}

impl Default for ChapterTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_is_zero() {
        let tracker = ChapterTracker::new();
        assert_eq!(tracker.page_nums(), &[0]);
    }

    #[test]
    fn strictly_increasing() {
        let mut tracker = ChapterTracker::new();
        tracker.new_chapter(5).unwrap();
        tracker.new_chapter(9).unwrap();
        assert_eq!(tracker.page_nums(), &[0, 5, 9]);
    }

    #[test]
    fn rejects_beyond_limit() {
        let mut tracker = ChapterTracker::new();
        for page in 1..MAX_CHAPTERS as u32 {
            tracker.new_chapter(page).unwrap();
        }
        assert_eq!(tracker.page_nums().len(), MAX_CHAPTERS);
        let err = tracker.new_chapter(MAX_CHAPTERS as u32).unwrap_err();
        assert!(matches!(err, CodecError::TooManyChapters(_)));
    }
}
