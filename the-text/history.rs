//! Undo and redo as a packed, append-only byte log.
//!
//! Every primitive change to a document (an insertion, a deletion, or a
//! cursor adjustment) is recorded as an invertible [`Edit`]. A user action is
//! a run of edits whose final op byte carries the `end` flag. Undo walks the
//! log backward, handing out inverted edits; redo walks it forward again.
//!
//! # Encoding
//!
//! An entry is its argument followed by one op byte,
//! `(0xFF - op) << 1 | end`. Op bytes always have the top bit set.
//!
//! - Integer arguments are deltas relative to the previous value of the same
//!   quantity, packed big-endian in 7-bit groups with the top bit clear, using
//!   as few bytes as sign extension allows. Zero takes no bytes at all.
//! - `Insert` and `Delete` carry raw UTF-8 text and are always preceded by a
//!   `Move` entry holding the change of edit position. The `Move`, `Insert`
//!   and `Delete` op bytes are all `>= 0xF5`, which never occurs in UTF-8, so
//!   they delimit the text on both sides: backward from the `Insert`/`Delete`
//!   op byte, and forward from the `Move` op byte.
//!
//! ```text
//!   [delta] Move  [text bytes...] Insert|end   [delta] BaseCol ...
//! ```
//!
//! Writing anywhere other than the end of the log, i.e. after some undos,
//! first discards the undone tail.

use std::{
  cell::RefCell,
  rc::Rc,
};

/// Handle through which the text and cursors log into one undo stream.
pub type SharedHistory = Rc<RefCell<History>>;

/// Opcodes, in the order that fixes their byte encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
  /// Relative change of the insert/delete position.
  Move,
  Insert,
  Delete,
  /// New cursor at a relative index, copied from its neighbour.
  AddCursor,
  /// Removal of the current cursor, which must equal its neighbour.
  CutCursor,
  SetCursor,
  /// Row of a caret with no selection, moving base and mark together.
  CursorRow,
  CursorCol,
  BaseRow,
  BaseCol,
  MarkRow,
  MarkCol,
  /// Never stored; returned when there is nothing left to undo or redo.
  End,
}

impl Op {
  const ALL: [Op; 13] = [
    Op::Move,
    Op::Insert,
    Op::Delete,
    Op::AddCursor,
    Op::CutCursor,
    Op::SetCursor,
    Op::CursorRow,
    Op::CursorCol,
    Op::BaseRow,
    Op::BaseCol,
    Op::MarkRow,
    Op::MarkCol,
    Op::End,
  ];

  #[inline]
  fn byte(self) -> u8 {
    ((0xFF - self as u32) << 1) as u8
  }

  #[inline]
  fn from_byte(byte: u8) -> Op {
    let code = 0xFF - ((byte >> 1) | 0x80);
    Self::ALL.get(code as usize).copied().unwrap_or(Op::End)
  }

  /// Whether this op carries a text payload.
  #[inline]
  pub fn is_text(self) -> bool {
    matches!(self, Op::Insert | Op::Delete)
  }

  #[inline]
  fn inverse(self) -> Op {
    match self {
      Op::Insert => Op::Delete,
      Op::Delete => Op::Insert,
      Op::AddCursor => Op::CutCursor,
      Op::CutCursor => Op::AddCursor,
      op => op,
    }
  }
}

/// A decoded log entry, ready to execute.
///
/// For [`Op::Insert`] and [`Op::Delete`], `at` is the start of the byte range
/// inserted or deleted and `text` is its content; `n` is unused. For all
/// other ops, `n` is the relative change to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
  pub op:   Op,
  pub n:    i32,
  pub at:   usize,
  pub text: Vec<u8>,
  /// This is the last edit of an undo or redo sequence for one user action.
  pub end:  bool,
}

impl Edit {
  fn exhausted() -> Self {
    Self {
      op:   Op::End,
      n:    0,
      at:   0,
      text: Vec::new(),
      end:  true,
    }
  }

  fn numeric(op: Op, n: i32, end: bool) -> Self {
    Self {
      op,
      n,
      at: 0,
      text: Vec::new(),
      end,
    }
  }

  #[inline]
  pub fn is_exhausted(&self) -> bool {
    self.op == Op::End
  }
}

/// Bytes at or above this value never occur in UTF-8 text.
#[inline]
fn illegal(byte: u8) -> bool {
  byte >= 0xF5
}

#[inline]
fn is_end(byte: u8) -> bool {
  byte & 1 != 0
}

/// Sign-extend and unpack 7-bit groups, most significant first.
fn unpack(bytes: &[u8]) -> i32 {
  let Some(first) = bytes.first() else {
    return 0;
  };
  let mut n: u32 = if first & 0x40 != 0 { u32::MAX } else { 0 };
  for byte in bytes {
    n = (n << 7) | *byte as u32;
  }
  n as i32
}

/// Append the minimal 7-bit group encoding of `n`.
fn pack(bytes: &mut Vec<u8>, n: i32) {
  if n == 0 {
    return;
  }
  if !(-134_217_728..134_217_728).contains(&n) {
    bytes.push(((n >> 28) & 0x7F) as u8);
  }
  if !(-1_048_576..1_048_576).contains(&n) {
    bytes.push(((n >> 21) & 0x7F) as u8);
  }
  if !(-8192..8192).contains(&n) {
    bytes.push(((n >> 14) & 0x7F) as u8);
  }
  if !(-64..64).contains(&n) {
    bytes.push(((n >> 7) & 0x7F) as u8);
  }
  bytes.push((n & 0x7F) as u8);
}

/// Delta between two positions or indices.
#[inline]
pub(crate) fn delta(old: usize, new: usize) -> i32 {
  (new as i64 - old as i64) as i32
}

/// Record of edits, with a read/write position for undo/redo sequences.
#[derive(Debug, Clone)]
pub struct History {
  bytes:    Vec<u8>,
  /// Read/write position; equal to `bytes.len()` outside undo/redo.
  current:  usize,
  /// Insert/delete position after the edit just before `current`.
  position: usize,
}

impl Default for History {
  fn default() -> Self {
    Self::new(1000)
  }
}

impl History {
  pub fn new(capacity: usize) -> Self {
    Self {
      bytes:    Vec::with_capacity(capacity),
      current:  0,
      position: 0,
    }
  }

  /// Wrap a new history in the handle shared by text and cursors.
  pub fn shared(capacity: usize) -> SharedHistory {
    Rc::new(RefCell::new(Self::new(capacity)))
  }

  /// Remove all the entries.
  pub fn clear(&mut self) {
    tracing::debug!(bytes = self.bytes.len(), "clearing history");
    self.bytes.clear();
    self.current = 0;
    self.position = 0;
  }

  /// Number of bytes in the current branch of the log.
  #[inline]
  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  #[inline]
  pub fn can_undo(&self) -> bool {
    self.current > 0
  }

  #[inline]
  pub fn can_redo(&self) -> bool {
    self.current < self.bytes.len()
  }

  /// The raw encoded log.
  #[inline]
  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  /// Drop anything beyond the read/write position, starting a new branch.
  /// What is left of a partly undone action becomes an action of its own.
  fn truncate(&mut self) {
    if self.bytes.len() > self.current {
      tracing::trace!(
        dropped = self.bytes.len() - self.current,
        "discarding undone edits"
      );
      self.bytes.truncate(self.current);
      if let Some(last) = self.bytes.last_mut() {
        *last |= 1;
      }
    }
  }

  fn save_op_n(&mut self, op: Op, n: i32) {
    self.truncate();
    pack(&mut self.bytes, n);
    self.bytes.push(op.byte());
    self.current = self.bytes.len();
  }

  fn save_op_s(&mut self, op: Op, text: &[u8]) {
    debug_assert!(
      !text.iter().copied().any(illegal),
      "logged text must be UTF-8"
    );
    self.bytes.extend_from_slice(text);
    self.bytes.push(op.byte());
    self.current = self.bytes.len();
  }

  /// Save an insertion of `text` at position `at`.
  pub fn save_insert(&mut self, at: usize, text: &[u8]) {
    self.save_op_n(Op::Move, delta(self.position, at));
    self.save_op_s(Op::Insert, text);
    self.position = at + text.len();
  }

  /// Save a deletion of `text`, which occupied the bytes just before `at`.
  /// `at` must be at least `text.len()`.
  pub fn save_delete(&mut self, at: usize, text: &[u8]) {
    debug_assert!(at >= text.len(), "deleted text reaches before the log position");
    self.save_op_n(Op::Move, delta(self.position, at));
    self.save_op_s(Op::Delete, text);
    self.position = at - text.len();
  }

  /// Save the addition of a cursor at the given relative index.
  pub fn save_add_cursor(&mut self, n: i32) {
    self.save_op_n(Op::AddCursor, n);
  }

  /// Save the removal of the current cursor, then a relative change of
  /// current index.
  pub fn save_cut_cursor(&mut self, n: i32) {
    self.save_op_n(Op::CutCursor, n);
  }

  pub fn save_set_cursor(&mut self, n: i32) {
    self.save_op_n(Op::SetCursor, n);
  }

  pub fn save_cursor_row(&mut self, n: i32) {
    self.save_op_n(Op::CursorRow, n);
  }

  pub fn save_cursor_col(&mut self, n: i32) {
    self.save_op_n(Op::CursorCol, n);
  }

  pub fn save_base_row(&mut self, n: i32) {
    self.save_op_n(Op::BaseRow, n);
  }

  pub fn save_base_col(&mut self, n: i32) {
    self.save_op_n(Op::BaseCol, n);
  }

  pub fn save_mark_row(&mut self, n: i32) {
    self.save_op_n(Op::MarkRow, n);
  }

  pub fn save_mark_col(&mut self, n: i32) {
    self.save_op_n(Op::MarkCol, n);
  }

  /// Record the end of the current user action.
  pub fn save_end(&mut self) {
    if self.current == self.bytes.len() {
      if let Some(last) = self.bytes.last_mut() {
        *last |= 1;
      }
    }
  }

  /// Pop the integer argument that ends at `current`.
  fn pop_int(&mut self) -> i32 {
    let end = self.current;
    let mut start = end;
    while start > 0 && self.bytes[start - 1] & 0x80 == 0 {
      start -= 1;
    }
    self.current = start;
    unpack(&self.bytes[start..end])
  }

  /// Pop the text argument that ends at `current`.
  fn pop_text(&mut self) -> Vec<u8> {
    let end = self.current;
    let mut start = end;
    while start > 0 && !illegal(self.bytes[start - 1]) {
      start -= 1;
    }
    self.current = start;
    self.bytes[start..end].to_vec()
  }

  /// Read the integer argument that starts at `current`.
  fn read_int(&mut self) -> i32 {
    let start = self.current;
    let mut end = start;
    while end < self.bytes.len() && self.bytes[end] & 0x80 == 0 {
      end += 1;
    }
    self.current = end;
    unpack(&self.bytes[start..end])
  }

  /// Read the text argument that starts at `current`.
  fn read_text(&mut self) -> Vec<u8> {
    let start = self.current;
    let mut end = start;
    while end < self.bytes.len() && !illegal(self.bytes[end]) {
      end += 1;
    }
    self.current = end;
    self.bytes[start..end].to_vec()
  }

  /// Read an op byte forward, returning the op and its end flag.
  fn read_op(&mut self) -> Option<(Op, bool)> {
    let byte = *self.bytes.get(self.current)?;
    self.current += 1;
    Some((Op::from_byte(byte), is_end(byte)))
  }

  /// Whether the action boundary (or log start) sits just before `current`.
  #[inline]
  fn at_boundary(&self) -> bool {
    self.current == 0 || is_end(self.bytes[self.current - 1])
  }

  /// Get the most recent edit, inverted ready to execute. Repeat until the
  /// `end` flag is set to undo one user action. An [`Op::End`] edit means
  /// there is nothing left to undo.
  pub fn undo(&mut self) -> Edit {
    if self.current == 0 {
      return Edit::exhausted();
    }
    self.current -= 1;
    let op = Op::from_byte(self.bytes[self.current]);

    let edit = if op.is_text() {
      let text = self.pop_text();
      // The preceding Move.
      self.current -= 1;
      let moved = self.pop_int();
      let at = match op {
        Op::Insert => {
          // Inserted at `position - len`; the inverse deletes it again.
          self.position -= text.len();
          self.position
        },
        _ => {
          // Deleted from before `position + len`; the inverse reinserts it.
          let at = self.position;
          self.position += text.len();
          at
        },
      };
      self.position = (self.position as i64 - moved as i64) as usize;
      Edit {
        op: op.inverse(),
        n: 0,
        at,
        text,
        end: false,
      }
    } else {
      let n = self.pop_int();
      Edit::numeric(op.inverse(), n.wrapping_neg(), false)
    };

    let edit = Edit {
      end: self.at_boundary(),
      ..edit
    };
    tracing::trace!(op = ?edit.op, n = edit.n, at = edit.at, end = edit.end, "undo");
    edit
  }

  /// Get the most recently undone edit, ready for re-execution. Repeat until
  /// the `end` flag is set to redo one user action. An [`Op::End`] edit means
  /// there is nothing left to redo.
  pub fn redo(&mut self) -> Edit {
    if self.current >= self.bytes.len() {
      return Edit::exhausted();
    }
    let n = self.read_int();
    let Some((op, end)) = self.read_op() else {
      return Edit::exhausted();
    };

    let edit = if op == Op::Move {
      let text = self.read_text();
      let Some((op, end)) = self.read_op() else {
        return Edit::exhausted();
      };
      self.position = (self.position as i64 + n as i64) as usize;
      let at = match op {
        Op::Insert => {
          let at = self.position;
          self.position += text.len();
          at
        },
        _ => {
          self.position -= text.len();
          self.position
        },
      };
      Edit {
        op,
        n: 0,
        at,
        text,
        end,
      }
    } else {
      Edit::numeric(op, n, end)
    };

    tracing::trace!(op = ?edit.op, n = edit.n, at = edit.at, end = edit.end, "redo");
    edit
  }
}
