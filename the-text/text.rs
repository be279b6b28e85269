//! Text content, kept consistent with its lines, cursors and history.
//!
//! A [`Text`] holds the UTF-8 bytes of a document. For `n` bytes there are
//! `n + 1` positions, from 0 up to just past the final newline. The content
//! never holds invalid UTF-8, control bytes 0x00 to 0x07, tabs or carriage
//! returns, and never has trailers: spaces at the end of a line, blank lines
//! at the end of the text, or a missing final newline.
//!
//! Insertions and deletions are logged in the shared history, applied to the
//! bytes and the line index, and followed by cursor relocation. Any trailer an
//! edit creates is removed by further logged edits, so the repair is undone
//! along with the edit that caused it.

use std::{
  ops::{
    Range,
    RangeInclusive,
  },
  rc::Rc,
};

use thiserror::Error;

use crate::{
  config::Config,
  cursors::{
    Cursors,
    Point,
  },
  history::{
    Edit,
    Op,
    SharedHistory,
  },
  lines::Lines,
};

/// Positions and deltas must fit in an `i32`.
pub const MAX_LEN: usize = i32::MAX as usize;

/// Result type for text operations.
pub type Result<T> = std::result::Result<T, TextError>;

/// Errors that can occur when loading text.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TextError {
  #[error("invalid UTF-8 at byte {offset}, probably binary")]
  InvalidUtf8 { offset: usize },
  #[error("NUL byte at {offset}, probably binary")]
  NulByte { offset: usize },
  #[error("text of {len} bytes exceeds the maximum of {max}")]
  TooLarge { len: usize, max: usize },
}

#[derive(Debug)]
pub struct Text {
  bytes:     Vec<u8>,
  lines:     Lines,
  cursors:   Cursors,
  history:   SharedHistory,
  tab_width: usize,
  changed:   Option<Range<usize>>,
}

impl Text {
  /// An empty text with a single caret, logging into `history`.
  pub fn new(history: SharedHistory) -> Self {
    Self::with_config(history, &Config::default())
  }

  pub fn with_config(history: SharedHistory, config: &Config) -> Self {
    Self {
      bytes: Vec::new(),
      lines: Lines::new(config.lines_capacity),
      cursors: Cursors::with_capacity(Rc::clone(&history), config.cursors_capacity),
      history,
      tab_width: config.tab_width.max(1),
      changed: None,
    }
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  #[inline]
  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  #[inline]
  pub fn lines(&self) -> &Lines {
    &self.lines
  }

  #[inline]
  pub fn cursors(&self) -> &Cursors {
    &self.cursors
  }

  /// Cursor operations are logged into the same history as text edits.
  #[inline]
  pub fn cursors_mut(&mut self) -> &mut Cursors {
    &mut self.cursors
  }

  /// Replace the content with a newly loaded buffer, discarding the history.
  /// Fails if the buffer holds invalid UTF-8 or NUL bytes, since it is then
  /// probably binary. Other disallowed content is normalised away.
  pub fn load_text(&mut self, bytes: Vec<u8>) -> Result<()> {
    if bytes.len() > MAX_LEN {
      return Err(TextError::TooLarge {
        len: bytes.len(),
        max: MAX_LEN,
      });
    }
    if let Err(err) = std::str::from_utf8(&bytes) {
      return Err(TextError::InvalidUtf8 {
        offset: err.valid_up_to(),
      });
    }
    if let Some(offset) = bytes.iter().position(|byte| *byte == 0) {
      return Err(TextError::NulByte { offset });
    }

    let normalized = normalize(&bytes, self.tab_width);
    if normalized != bytes {
      tracing::warn!(
        before = bytes.len(),
        after = normalized.len(),
        "normalised loaded text"
      );
    }
    self.bytes = normalized;
    self.lines.clear();
    self.lines.insert_lines(0, &self.bytes);
    self.cursors.reset();
    self.history.borrow_mut().clear();
    self.changed = Some(0..self.bytes.len());
    tracing::debug!(
      bytes = self.bytes.len(),
      lines = self.lines.count_lines(),
      "loaded text"
    );
    Ok(())
  }

  /// Copy the content out.
  pub fn save_text(&self) -> Vec<u8> {
    self.bytes.clone()
  }

  /// Up to `n` bytes starting at `at`.
  pub fn get_text(&self, at: usize, n: usize) -> &[u8] {
    let at = at.min(self.len());
    let end = at.saturating_add(n).min(self.len());
    &self.bytes[at..end]
  }

  /// The bytes of a row, without its newline.
  pub fn line(&self, row: usize) -> &[u8] {
    if row > self.lines.count_lines() {
      return &[];
    }
    let start = self.lines.start_line(row);
    let end = self.lines.end_line(row);
    let line = &self.bytes[start..end];
    line.strip_suffix(b"\n").unwrap_or(line)
  }

  /// Row/column point of a position.
  pub fn point_of(&self, at: usize) -> Point {
    let at = at.min(self.len());
    let row = self.lines.find_row(at);
    Point::new(row, at - self.lines.start_line(row))
  }

  /// Position of a point, clamped to the physical text.
  pub fn position_of(&self, point: Point) -> usize {
    if point.row > self.lines.count_lines() {
      return self.len();
    }
    let start = self.lines.start_line(point.row);
    start + point.col.min(self.line(point.row).len())
  }

  /// Insert `s` at a position. Any cursor end at that position moves to the
  /// end of the inserted text. Line endings, tabs and control bytes in `s`
  /// are cleaned up as on load, and the cleaned text is what gets logged.
  pub fn insert_text(&mut self, at: usize, s: &str) {
    let at = at.min(self.len());
    let start = self.point_of(at);
    let cleaned = clean(s.as_bytes(), start.col, self.tab_width);
    if cleaned.is_empty() {
      return;
    }
    debug_assert!(self.len() + cleaned.len() <= MAX_LEN);
    let bytes = cleaned.as_slice();
    let newlines = bytes.iter().filter(|byte| **byte == b'\n').count();
    let end = match bytes.iter().rposition(|byte| *byte == b'\n') {
      Some(last) => Point::new(start.row + newlines, bytes.len() - last - 1),
      None => Point::new(start.row, start.col + bytes.len()),
    };

    self.raw_insert(at, bytes);
    self.cursors.remap(|point| {
      if point < start {
        point
      } else if point.row == start.row {
        Point::new(end.row, end.col + (point.col - start.col))
      } else {
        Point::new(point.row + newlines, point.col)
      }
    });
    self.repair(start.row..=end.row);
  }

  /// Delete the text between two positions, in either order. Any cursor end
  /// within the range, or at its left end, is first moved to the right end.
  pub fn delete_text(&mut self, from: usize, to: usize) {
    let (from, to) = if to < from { (to, from) } else { (from, to) };
    let to = to.min(self.len());
    if from >= to {
      return;
    }
    let start = self.point_of(from);
    let end = self.point_of(to);

    self.cursors.remap(|point| {
      if point >= start && point <= end {
        end
      } else {
        point
      }
    });
    self.raw_delete(from, to);
    self.cursors.remap(|point| {
      if point < end {
        point
      } else if point.row == end.row {
        Point::new(start.row, start.col + (point.col - end.col))
      } else {
        Point::new(point.row - (end.row - start.row), point.col)
      }
    });
    self.repair(start.row..=start.row);
  }

  /// Close the current user action: merge overlapping cursors and mark the
  /// end of the action in the history.
  pub fn finish_action(&mut self) {
    self.cursors.merge_cursors();
    self.history.borrow_mut().save_end();
  }

  /// Undo the most recent user action, or just its last primitive edit when
  /// taking a small step. Returns false if there was nothing to undo.
  pub fn undo_text(&mut self, small: bool) -> bool {
    let mut applied = false;
    loop {
      let edit = self.history.borrow_mut().undo();
      if edit.is_exhausted() {
        break;
      }
      self.apply(&edit);
      applied = true;
      if small || edit.end {
        break;
      }
    }
    applied
  }

  /// Redo the most recently undone user action, or one primitive edit of it.
  /// Returns false if there was nothing to redo.
  pub fn redo_text(&mut self, small: bool) -> bool {
    let mut applied = false;
    loop {
      let edit = self.history.borrow_mut().redo();
      if edit.is_exhausted() {
        break;
      }
      self.apply(&edit);
      applied = true;
      if small || edit.end {
        break;
      }
    }
    applied
  }

  /// Range touched by the edits since the last reset, if any, in current
  /// positions.
  #[inline]
  pub fn changed(&self) -> Option<Range<usize>> {
    self.changed.clone()
  }

  /// Start of the changed range, or the length of the text if unchanged.
  pub fn start_changed(&self) -> usize {
    self.changed.as_ref().map_or(self.len(), |range| range.start)
  }

  /// End of the changed range, or 0 if unchanged.
  pub fn end_changed(&self) -> usize {
    self.changed.as_ref().map_or(0, |range| range.end)
  }

  pub fn reset_changed(&mut self) {
    self.changed = None;
  }

  fn apply(&mut self, edit: &Edit) {
    match edit.op {
      Op::Insert => self.apply_insert(edit.at, &edit.text),
      Op::Delete => self.apply_delete(edit.at, edit.at + edit.text.len()),
      _ => self.cursors.apply(edit),
    }
  }

  fn raw_insert(&mut self, at: usize, bytes: &[u8]) {
    self.history.borrow_mut().save_insert(at, bytes);
    self.apply_insert(at, bytes);
  }

  fn raw_delete(&mut self, from: usize, to: usize) {
    self.history.borrow_mut().save_delete(to, &self.bytes[from..to]);
    self.apply_delete(from, to);
  }

  fn apply_insert(&mut self, at: usize, bytes: &[u8]) {
    self.bytes.splice(at..at, bytes.iter().copied());
    self.lines.insert_lines(at, bytes);
    let n = bytes.len();
    self.changed = Some(match self.changed.take() {
      None => at..at + n,
      Some(range) => {
        let end = if range.end > at { range.end + n } else { range.end };
        range.start.min(at)..end.max(at + n)
      },
    });
  }

  fn apply_delete(&mut self, from: usize, to: usize) {
    let removed: Vec<u8> = self.bytes.drain(from..to).collect();
    self.lines.delete_lines(to, &removed);
    let shift = |p: usize| {
      if p >= to {
        p - (to - from)
      } else {
        p.min(from)
      }
    };
    self.changed = Some(match self.changed.take() {
      None => from..from,
      Some(range) => shift(range.start).min(from)..shift(range.end).max(from),
    });
  }

  /// Remove trailers after an edit: trailing spaces on the given rows, then
  /// anything wrong at the end of the text. Cursors keep their points, which
  /// may now lie beyond the end of their lines.
  fn repair(&mut self, rows: RangeInclusive<usize>) {
    for row in rows.rev() {
      if row >= self.lines.count_lines() {
        continue;
      }
      let start = self.lines.start_line(row);
      let newline = self.lines.end_line(row) - 1;
      let keep = self.bytes[start..newline]
        .iter()
        .rposition(|byte| *byte != b' ')
        .map_or(start, |i| start + i + 1);
      if keep < newline {
        tracing::debug!(row, spaces = newline - keep, "removing trailing spaces");
        self.raw_delete(keep, newline);
      }
    }
    self.repair_end();
  }

  /// Make a non-empty text end with exactly one newline after its last
  /// visible byte, and a blank text empty.
  fn repair_end(&mut self) {
    let len = self.len();
    let keep = self
      .bytes
      .iter()
      .rposition(|byte| !matches!(*byte, b' ' | b'\n'))
      .map_or(0, |i| i + 1);
    let tail = &self.bytes[keep..];
    let settled = if keep == 0 { tail.is_empty() } else { tail == b"\n" };
    if settled {
      return;
    }
    let terminated = tail.first() == Some(&b'\n');
    tracing::debug!(tail = len - keep, "repairing end of text");
    if keep == 0 {
      self.raw_delete(0, len);
    } else if terminated {
      self.raw_delete(keep + 1, len);
    } else {
      if keep < len {
        self.raw_delete(keep, len);
      }
      self.raw_insert(keep, b"\n");
    }
  }
}

/// Turn line endings into `\n`, expand tabs from byte column `col` onward,
/// and drop control bytes.
fn clean(input: &[u8], mut col: usize, tab_width: usize) -> Vec<u8> {
  let mut out = Vec::with_capacity(input.len());
  let mut bytes = input.iter().copied().peekable();
  while let Some(byte) = bytes.next() {
    match byte {
      b'\r' | b'\n' => {
        if byte == b'\r' {
          bytes.next_if_eq(&b'\n');
        }
        out.push(b'\n');
        col = 0;
      },
      b'\t' => {
        let pad = tab_width - col % tab_width;
        out.resize(out.len() + pad, b' ');
        col += pad;
      },
      0x00..=0x07 => {},
      byte => {
        out.push(byte);
        col += 1;
      },
    }
  }
  out
}

/// Bring loaded text into the allowed form: line endings become `\n`, tabs
/// are expanded, control bytes dropped, and trailers removed.
fn normalize(input: &[u8], tab_width: usize) -> Vec<u8> {
  let out = clean(input, 0, tab_width);
  let mut result = Vec::with_capacity(out.len() + 1);
  for line in out.split(|byte| *byte == b'\n') {
    let len = line.iter().rposition(|byte| *byte != b' ').map_or(0, |i| i + 1);
    result.extend_from_slice(&line[..len]);
    result.push(b'\n');
  }
  while result.ends_with(b"\n\n") {
    result.pop();
  }
  if result == b"\n" {
    result.clear();
  }
  result
}
