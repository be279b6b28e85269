//! Incremental index of line boundaries.
//!
//! [`Lines`] never looks at the text itself. It is driven purely by the
//! insertions and deletions reported to it, and keeps the position just after
//! every newline. There is one line per newline, and a "row" is a line number
//! counting from zero.
//!
//! The positions are held in a gap buffer. Entries before the gap are stored
//! as plain ascending offsets; entries after the gap are stored as their
//! distance from the end of the text. Moving the gap to an edit site slides
//! entries across it one at a time, so local edits cost O(1) amortized and a
//! change of text length never requires touching the post-gap entries.

/// Row index of a text, built from insert/delete notifications.
#[derive(Debug, Clone)]
pub struct Lines {
  entries: Vec<usize>,
  /// Start of the gap, also the number of pre-gap entries.
  lo:      usize,
  /// End of the gap, the index of the first post-gap entry.
  hi:      usize,
  /// Total number of bytes in the text.
  total:   usize,
}

impl Default for Lines {
  fn default() -> Self {
    Self::new(6)
  }
}

impl Lines {
  /// Create an index for an empty text with room for `capacity` newlines.
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      entries: vec![0; capacity],
      lo:      0,
      hi:      capacity,
      total:   0,
    }
  }

  /// Forget every line, as for an empty text.
  pub fn clear(&mut self) {
    self.lo = 0;
    self.hi = self.entries.len();
    self.total = 0;
  }

  /// Total number of bytes in the text being tracked.
  #[inline]
  pub fn len(&self) -> usize {
    self.total
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.total == 0
  }

  /// The number of lines, equal to the number of newlines.
  #[inline]
  pub fn count_lines(&self) -> usize {
    self.entries.len() - (self.hi - self.lo)
  }

  /// Record the insertion of `bytes` into the text at position `at`.
  pub fn insert_lines(&mut self, at: usize, bytes: &[u8]) {
    self.move_gap(at);
    self.total += bytes.len();
    for (i, _) in bytes.iter().enumerate().filter(|(_, b)| **b == b'\n') {
      if self.lo >= self.hi {
        self.grow();
      }
      self.entries[self.lo] = at + i + 1;
      self.lo += 1;
    }
  }

  /// Record the deletion of `bytes`, which occupied the text just before
  /// position `at`. `at` must be at least `bytes.len()`.
  pub fn delete_lines(&mut self, at: usize, bytes: &[u8]) {
    debug_assert!(at >= bytes.len(), "deleted bytes reach before the text");
    let from = at - bytes.len();
    self.move_gap(at);
    self.total -= bytes.len();
    while self.lo > 0 && self.entries[self.lo - 1] > from {
      self.lo -= 1;
    }
  }

  /// Position of the start of a row. Rows past the last newline are clamped
  /// to `count_lines()`, the unterminated tail of the text.
  pub fn start_line(&self, row: usize) -> usize {
    let row = row.min(self.count_lines());
    if row == 0 { 0 } else { self.entry(row - 1) }
  }

  /// Position of the end of a row, just after its newline. For the
  /// unterminated tail this is the length of the text.
  pub fn end_line(&self, row: usize) -> usize {
    if row >= self.count_lines() {
      self.total
    } else {
      self.entry(row)
    }
  }

  /// Number of bytes in a row, including its newline.
  pub fn length_line(&self, row: usize) -> usize {
    self.end_line(row) - self.start_line(row)
  }

  /// Row containing a position, found by binary search over the line ends.
  pub fn find_row(&self, at: usize) -> usize {
    let at = at.min(self.total);
    let (mut start, mut end) = (0, self.count_lines());
    while end > start {
      let mid = start + (end - start) / 2;
      if at < self.entry(mid) {
        end = mid;
      } else {
        start = mid + 1;
      }
    }
    start
  }

  /// Absolute end position of the i'th line, wherever it sits in the buffer.
  #[inline]
  fn entry(&self, i: usize) -> usize {
    if i < self.lo {
      self.entries[i]
    } else {
      self.total - self.entries[i + (self.hi - self.lo)]
    }
  }

  /// Slide entries across the gap until every pre-gap entry is `<= at` and
  /// every post-gap entry is `> at`.
  fn move_gap(&mut self, at: usize) {
    while self.lo > 0 && self.entries[self.lo - 1] > at {
      self.lo -= 1;
      self.hi -= 1;
      self.entries[self.hi] = self.total - self.entries[self.lo];
    }
    while self.hi < self.entries.len() && self.total - self.entries[self.hi] <= at {
      self.entries[self.lo] = self.total - self.entries[self.hi];
      self.hi += 1;
      self.lo += 1;
    }
  }

  /// Grow the buffer by half, keeping post-gap entries at the far end.
  fn grow(&mut self) {
    let size = self.entries.len();
    let new_size = (size * 3 / 2).max(size + 1);
    let tail = size - self.hi;
    self.entries.resize(new_size, 0);
    self.entries.copy_within(self.hi..size, new_size - tail);
    self.hi = new_size - tail;
  }
}
