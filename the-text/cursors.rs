//! Multiple cursors and selections.
//!
//! A [`Cursor`] has a base and a mark, which are equal when there is no
//! selection. Points are row/column pairs, so a cursor may sit beyond the
//! physical end of its line, or beyond the last line. The cursors are kept in
//! order of their bases, with one of them current.
//!
//! Every change goes through a handful of setters which log a relative delta
//! to the shared [`History`](crate::history::History) before touching the
//! state, so any sequence of cursor operations can be undone exactly.
//!
//! After a user action, [`Cursors::merge_cursors`] makes sure no two cursors
//! overlap. Two selections may touch, as long as it is not their bases that
//! touch, since that would be visually ambiguous.

use std::cmp::Ordering;

use smallvec::{
  SmallVec,
  smallvec,
};

use crate::history::{
  Edit,
  Op,
  SharedHistory,
  delta,
};

/// A zero-based row/column point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Point {
  pub row: usize,
  pub col: usize,
}

impl Point {
  #[inline]
  pub const fn new(row: usize, col: usize) -> Self {
    Self { row, col }
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
  pub base:    Point,
  pub mark:    Point,
  /// Column to aim for when moving up or down.
  pub old_col: usize,
}

impl Cursor {
  pub fn new(base: Point, mark: Point) -> Self {
    Self {
      base,
      mark,
      old_col: mark.col,
    }
  }

  #[inline]
  pub fn point(point: Point) -> Self {
    Self::new(point, point)
  }

  #[inline]
  #[must_use]
  pub fn is_caret(&self) -> bool {
    self.base == self.mark
  }

  /// Whether the selection runs right to left.
  #[inline]
  #[must_use]
  pub fn is_leftward(&self) -> bool {
    self.mark < self.base
  }

  #[inline]
  #[must_use]
  pub fn left(&self) -> Point {
    self.base.min(self.mark)
  }

  #[inline]
  #[must_use]
  pub fn right(&self) -> Point {
    self.base.max(self.mark)
  }

  /// Check whether two cursors, `self` before `other` in order, overlap or
  /// touch ambiguously: some point of `self` lies beyond a point of
  /// `other`, two or more of the four points coincide, or the bases do.
  pub fn overlaps(&self, other: &Self) -> bool {
    let sign = |ord: Ordering| ord as i32;
    let bb = sign(self.base.cmp(&other.base));
    let bm = sign(self.base.cmp(&other.mark));
    let mb = sign(self.mark.cmp(&other.base));
    let mm = sign(self.mark.cmp(&other.mark));
    if bb > 0 || bm > 0 || mb > 0 || mm > 0 {
      return true;
    }
    if bb < 0 && bm < 0 && mb < 0 && mm < 0 {
      return false;
    }
    bb + bm + mb + mm >= -2 || bb == 0
  }

  /// The cursor covering both `self` and `other`. It runs right to left
  /// only if both inputs do.
  #[must_use]
  pub fn merge(&self, other: &Self) -> Self {
    let points = [self.base, self.mark, other.base, other.mark];
    let (mut base, mut mark) = (points[0], points[0]);
    for point in points {
      base = base.min(point);
      mark = mark.max(point);
    }
    if self.is_leftward() && other.is_leftward() {
      std::mem::swap(&mut base, &mut mark);
    }
    Self::new(base, mark)
  }
}

/// The ordered set of cursors for one document.
#[derive(Debug)]
pub struct Cursors {
  cursors: SmallVec<[Cursor; 1]>,
  current: usize,
  history: SharedHistory,
}

impl Cursors {
  /// A single caret at (0,0), logging into `history`.
  pub fn new(history: SharedHistory) -> Self {
    Self::with_capacity(history, 1)
  }

  pub fn with_capacity(history: SharedHistory, capacity: usize) -> Self {
    let mut cursors = SmallVec::with_capacity(capacity.max(1));
    cursors.push(Cursor::default());
    Self {
      cursors,
      current: 0,
      history,
    }
  }

  /// Go back to a single caret at (0,0) without logging.
  pub fn reset(&mut self) {
    self.cursors = smallvec![Cursor::default()];
    self.current = 0;
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.cursors.len()
  }

  /// There is always at least one cursor.
  #[inline]
  pub fn is_empty(&self) -> bool {
    false
  }

  /// Index of the current cursor.
  #[inline]
  pub fn current(&self) -> usize {
    self.current
  }

  #[inline]
  pub fn get(&self, i: usize) -> Option<&Cursor> {
    self.cursors.get(i)
  }

  #[inline]
  pub fn iter(&self) -> impl Iterator<Item = &Cursor> {
    self.cursors.iter()
  }

  #[inline]
  fn cursor(&self) -> &Cursor {
    &self.cursors[self.current]
  }

  #[inline]
  pub fn base(&self) -> Point {
    self.cursor().base
  }

  #[inline]
  pub fn mark(&self) -> Point {
    self.cursor().mark
  }

  #[inline]
  pub fn left(&self) -> Point {
    self.cursor().left()
  }

  #[inline]
  pub fn right(&self) -> Point {
    self.cursor().right()
  }

  #[inline]
  pub fn old_col(&self) -> usize {
    self.cursor().old_col
  }

  /// Remember a column for vertical movement. Not logged.
  pub fn set_old_col(&mut self, col: usize) {
    self.cursors[self.current].old_col = col;
  }

  // Logged primitives.
  //

  /// Make the i'th cursor current, clamped to the valid range.
  pub fn set_cursor(&mut self, i: usize) {
    let i = i.min(self.cursors.len() - 1);
    if i == self.current {
      return;
    }
    self.history.borrow_mut().save_set_cursor(delta(self.current, i));
    self.current = i;
  }

  fn set_base_row(&mut self, row: usize) {
    let old = self.cursor().base.row;
    if row == old {
      return;
    }
    self.history.borrow_mut().save_base_row(delta(old, row));
    self.cursors[self.current].base.row = row;
  }

  fn set_base_col(&mut self, col: usize) {
    let old = self.cursor().base.col;
    if col == old {
      return;
    }
    self.history.borrow_mut().save_base_col(delta(old, col));
    self.cursors[self.current].base.col = col;
  }

  fn set_mark_row(&mut self, row: usize) {
    let old = self.cursor().mark.row;
    if row == old {
      return;
    }
    self.history.borrow_mut().save_mark_row(delta(old, row));
    self.cursors[self.current].mark.row = row;
  }

  fn set_mark_col(&mut self, col: usize) {
    let old = self.cursor().mark.col;
    if col == old {
      return;
    }
    self.history.borrow_mut().save_mark_col(delta(old, col));
    self.cursors[self.current].mark.col = col;
  }

  /// Caret-only row change, moving base and mark together.
  fn set_caret_row(&mut self, row: usize) {
    let old = self.cursor().base.row;
    if row == old {
      return;
    }
    self.history.borrow_mut().save_cursor_row(delta(old, row));
    let cursor = &mut self.cursors[self.current];
    cursor.base.row = row;
    cursor.mark.row = row;
  }

  fn set_caret_col(&mut self, col: usize) {
    let old = self.cursor().base.col;
    if col == old {
      return;
    }
    self.history.borrow_mut().save_cursor_col(delta(old, col));
    let cursor = &mut self.cursors[self.current];
    cursor.base.col = col;
    cursor.mark.col = col;
  }

  // Combinations.
  //

  fn set_base(&mut self, point: Point) {
    self.set_base_row(point.row);
    self.set_base_col(point.col);
  }

  fn set_mark(&mut self, point: Point) {
    self.set_mark_row(point.row);
    self.set_mark_col(point.col);
  }

  /// Make the current cursor equal to the i'th.
  fn set_equal(&mut self, i: usize) {
    let other = self.cursors[i];
    self.set_base(other.base);
    self.set_mark(other.mark);
    self.cursors[self.current].old_col = other.old_col;
  }

  /// Move the current cursor, collapsing any selection.
  pub fn move_cursor(&mut self, row: usize, col: usize) {
    if self.cursor().is_caret() {
      self.set_caret_row(row);
      self.set_caret_col(col);
    } else {
      let point = Point::new(row, col);
      self.set_base(point);
      self.set_mark(point);
    }
    self.cursors[self.current].old_col = col;
  }

  /// Move the current cursor's base.
  pub fn base_cursor(&mut self, row: usize, col: usize) {
    self.set_base(Point::new(row, col));
  }

  /// Move the current cursor's mark, the free end of a selection.
  pub fn mark_cursor(&mut self, row: usize, col: usize) {
    self.set_mark(Point::new(row, col));
    self.cursors[self.current].old_col = col;
  }

  /// Index at which a cursor based at `point` keeps the set ordered.
  fn find(&self, point: Point) -> usize {
    self.cursors.partition_point(|cursor| cursor.base <= point)
  }

  /// Insert a copy of the neighbouring cursor at index `i` and make it
  /// current. The neighbour is the cursor currently at `i`, or the last one
  /// when appending.
  fn insert_copy(&mut self, i: usize) {
    let neighbour = self.cursors[i.min(self.cursors.len() - 1)];
    if self.cursors.len() == self.cursors.capacity() {
      self.cursors.reserve_exact(self.cursors.len());
    }
    self.cursors.insert(i, neighbour);
    self.current = i;
  }

  /// Add a caret at the given point, at the right index. It becomes current.
  pub fn add_cursor(&mut self, row: usize, col: usize) {
    let index = self.find(Point::new(row, col));
    self
      .history
      .borrow_mut()
      .save_add_cursor(delta(self.current, index));
    self.insert_copy(index);
    self.move_cursor(row, col);
    tracing::trace!(index, cursors = self.cursors.len(), "added cursor");
  }

  /// Remove the current cursor, after first making it equal to the next (or
  /// previous) one so that the removal can be undone.
  fn cut_cursor(&mut self) {
    let last = self.current + 1 == self.cursors.len();
    let (neighbour, shift) = if last {
      (self.current - 1, -1)
    } else {
      (self.current + 1, 0)
    };
    self.set_equal(neighbour);
    self.history.borrow_mut().save_cut_cursor(shift);
    self.cursors.remove(self.current);
    self.current = self.current.saturating_add_signed(shift as isize);
  }

  /// Merge the i'th and (i+1)'th cursors, keeping the i'th.
  fn merge(&mut self, i: usize) {
    let merged = self.cursors[i].merge(&self.cursors[i + 1]);
    self.set_cursor(i + 1);
    self.set_base(merged.base);
    self.set_mark(merged.mark);
    self.set_cursor(i);
    self.cut_cursor();
  }

  /// Merge any overlapping cursors.
  pub fn merge_cursors(&mut self) {
    let before = self.cursors.len();
    let mut i = 0;
    while i + 1 < self.cursors.len() {
      if self.cursors[i].overlaps(&self.cursors[i + 1]) {
        self.merge(i);
        // The widened cursor may now reach its predecessor.
        i = i.saturating_sub(1);
      } else {
        i += 1;
      }
    }
    if self.cursors.len() != before {
      tracing::trace!(before, after = self.cursors.len(), "merged cursors");
    }
  }

  /// Relocate every cursor end through `map`, logging only the ends that
  /// move. A cursor whose mark changes column forgets its vertical-motion
  /// column. The current cursor is restored afterwards.
  pub fn remap(&mut self, mut map: impl FnMut(Point) -> Point) {
    let current = self.current;
    for i in 0..self.cursors.len() {
      let cursor = self.cursors[i];
      let (base, mark) = (map(cursor.base), map(cursor.mark));
      if base == cursor.base && mark == cursor.mark {
        continue;
      }
      self.set_cursor(i);
      if cursor.is_caret() && base == mark {
        self.set_caret_row(base.row);
        self.set_caret_col(base.col);
      } else {
        self.set_base(base);
        self.set_mark(mark);
      }
      if mark.col != cursor.mark.col {
        self.cursors[i].old_col = mark.col;
      }
    }
    self.set_cursor(current);
  }

  /// Execute a cursor edit from undo or redo, without logging it.
  pub fn apply(&mut self, edit: &Edit) {
    let n = edit.n as isize;
    let shift = |value: usize| value.saturating_add_signed(n);
    match edit.op {
      Op::SetCursor => self.current = shift(self.current),
      Op::AddCursor => self.insert_copy(shift(self.current)),
      Op::CutCursor => {
        self.cursors.remove(self.current);
        self.current = shift(self.current);
      },
      Op::CursorRow => {
        let cursor = &mut self.cursors[self.current];
        cursor.base.row = shift(cursor.base.row);
        cursor.mark.row = shift(cursor.mark.row);
      },
      Op::CursorCol => {
        let cursor = &mut self.cursors[self.current];
        cursor.base.col = shift(cursor.base.col);
        cursor.mark.col = shift(cursor.mark.col);
      },
      Op::BaseRow => {
        let row = shift(self.cursor().base.row);
        self.cursors[self.current].base.row = row;
      },
      Op::BaseCol => {
        let col = shift(self.cursor().base.col);
        self.cursors[self.current].base.col = col;
      },
      Op::MarkRow => {
        let row = shift(self.cursor().mark.row);
        self.cursors[self.current].mark.row = row;
      },
      Op::MarkCol => {
        let col = shift(self.cursor().mark.col);
        self.cursors[self.current].mark.col = col;
      },
      Op::Move | Op::Insert | Op::Delete | Op::End => {},
    }
  }
}

#[cfg(test)]
mod test {
  use quickcheck::TestResult;

  use super::*;
  use crate::history::History;

  fn p(row: usize, col: usize) -> Point {
    Point::new(row, col)
  }

  fn selection(base: (usize, usize), mark: (usize, usize)) -> Cursor {
    Cursor::new(p(base.0, base.1), p(mark.0, mark.1))
  }

  fn snapshot(cursors: &Cursors) -> (Vec<Cursor>, usize) {
    (cursors.iter().copied().collect(), cursors.current())
  }

  /// Undo everything logged, applying the edits to `cursors`.
  fn undo_all(cursors: &mut Cursors) {
    loop {
      let edit = cursors.history.borrow_mut().undo();
      if edit.is_exhausted() {
        break;
      }
      cursors.apply(&edit);
    }
  }

  /// Build a cursor set from selections without logging.
  fn with_cursors(list: &[Cursor]) -> Cursors {
    let mut cursors = Cursors::new(History::shared(64));
    cursors.cursors = list.iter().copied().collect();
    cursors
  }

  #[test]
  fn test_new() {
    let cursors = Cursors::new(History::shared(64));
    assert_eq!(cursors.len(), 1);
    assert_eq!(cursors.current(), 0);
    assert_eq!(cursors.base(), p(0, 0));
  }

  #[test]
  fn test_set_cursor_clamps() {
    let mut cursors = with_cursors(&[Cursor::point(p(0, 0)), Cursor::point(p(1, 0))]);
    cursors.set_cursor(7);
    assert_eq!(cursors.current(), 1);
    cursors.set_cursor(0);
    assert_eq!(cursors.current(), 0);
  }

  #[test]
  fn test_move_and_select() {
    let mut cursors = Cursors::new(History::shared(64));
    cursors.move_cursor(2, 4);
    assert_eq!((cursors.base(), cursors.mark()), (p(2, 4), p(2, 4)));
    cursors.mark_cursor(0, 1);
    assert_eq!(cursors.left(), p(0, 1));
    assert_eq!(cursors.right(), p(2, 4));
    assert_eq!(cursors.old_col(), 1);
    cursors.base_cursor(3, 0);
    assert_eq!((cursors.base(), cursors.mark()), (p(3, 0), p(0, 1)));
  }

  #[test]
  fn test_add_cursor_sorted() {
    let mut cursors = Cursors::new(History::shared(64));
    cursors.move_cursor(5, 0);
    cursors.add_cursor(1, 0);
    cursors.add_cursor(9, 2);
    cursors.add_cursor(3, 3);
    let bases: Vec<Point> = cursors.iter().map(|c| c.base).collect();
    assert_eq!(bases, vec![p(1, 0), p(3, 3), p(5, 0), p(9, 2)]);
    assert_eq!(cursors.current(), 1);
    assert!(cursors.iter().all(Cursor::is_caret));
  }

  #[test]
  fn test_add_cursor_undo() {
    let mut cursors = Cursors::new(History::shared(64));
    cursors.move_cursor(4, 4);
    cursors.history.borrow_mut().save_end();
    let before = snapshot(&cursors);
    cursors.add_cursor(0, 2);
    cursors.add_cursor(7, 1);
    cursors.history.borrow_mut().save_end();
    assert_eq!(cursors.len(), 3);

    loop {
      let edit = cursors.history.borrow_mut().undo();
      cursors.apply(&edit);
      if edit.end {
        break;
      }
    }
    assert_eq!(snapshot(&cursors), before);
  }

  #[test]
  fn test_merge_overlapping() {
    let mut cursors = with_cursors(&[selection((0, 0), (0, 5)), selection((0, 3), (0, 8))]);
    cursors.merge_cursors();
    assert_eq!(cursors.len(), 1);
    assert_eq!((cursors.base(), cursors.mark()), (p(0, 0), p(0, 8)));
  }

  #[test]
  fn test_merge_leftward_pair() {
    let mut cursors = with_cursors(&[selection((0, 5), (0, 0)), selection((0, 8), (0, 3))]);
    cursors.merge_cursors();
    assert_eq!(cursors.len(), 1);
    assert_eq!((cursors.base(), cursors.mark()), (p(0, 8), p(0, 0)));
  }

  #[test]
  fn test_touching() {
    // Mark of one touching the base of the next is unambiguous.
    let touching = [selection((0, 0), (0, 5)), selection((0, 5), (0, 9))];
    assert!(!touching[0].overlaps(&touching[1]));
    // Two bases touching are not.
    let bases = [selection((0, 5), (0, 0)), selection((0, 5), (0, 9))];
    assert!(bases[0].overlaps(&bases[1]));
    // A caret touching a selection is not either.
    let caret = [Cursor::point(p(0, 5)), selection((0, 5), (0, 9))];
    assert!(caret[0].overlaps(&caret[1]));
    let apart = [Cursor::point(p(0, 1)), Cursor::point(p(0, 2))];
    assert!(!apart[0].overlaps(&apart[1]));
  }

  #[test]
  fn test_merge_chain_and_undo() {
    let list = [
      selection((0, 0), (0, 4)),
      selection((0, 3), (0, 6)),
      selection((0, 5), (1, 0)),
      Cursor::point(p(2, 0)),
    ];
    let mut cursors = with_cursors(&list);
    cursors.set_cursor(3);
    cursors.history.borrow_mut().clear();
    let before = snapshot(&cursors);

    cursors.merge_cursors();
    cursors.history.borrow_mut().save_end();
    let merged: Vec<Cursor> = cursors.iter().copied().collect();
    assert_eq!(merged.len(), 2);
    assert_eq!((merged[0].base, merged[0].mark), (p(0, 0), p(1, 0)));
    assert_eq!(merged[1].base, p(2, 0));

    undo_all(&mut cursors);
    assert_eq!(snapshot(&cursors).0.len(), before.0.len());
    let bases: Vec<(Point, Point)> = cursors.iter().map(|c| (c.base, c.mark)).collect();
    let expected: Vec<(Point, Point)> = list.iter().map(|c| (c.base, c.mark)).collect();
    assert_eq!(bases, expected);
    assert_eq!(cursors.current(), 3);
  }

  #[test]
  fn test_remap_logs_and_undoes() {
    let mut cursors = with_cursors(&[Cursor::point(p(0, 2)), selection((1, 0), (3, 1))]);
    cursors.history.borrow_mut().clear();
    cursors.remap(|point| {
      if point.row >= 1 {
        Point::new(point.row + 2, point.col)
      } else {
        point
      }
    });
    assert_eq!(cursors.get(1).map(|c| (c.base, c.mark)), Some((p(3, 0), p(5, 1))));
    assert_eq!(cursors.current(), 0);
    undo_all(&mut cursors);
    assert_eq!(cursors.get(1).map(|c| (c.base, c.mark)), Some((p(1, 0), p(3, 1))));
  }

  #[test]
  fn test_remap_resets_old_col() {
    let mut cursors = with_cursors(&[Cursor::point(p(0, 5)), Cursor::point(p(1, 3))]);
    cursors.remap(|point| {
      if point.row == 0 {
        Point::new(0, point.col + 2)
      } else {
        Point::new(point.row + 1, point.col)
      }
    });
    let first = cursors.get(0).copied().unwrap();
    assert_eq!((first.mark, first.old_col), (p(0, 7), 7));
    // Moving down a row keeps the column to aim for.
    let second = cursors.get(1).copied().unwrap();
    assert_eq!((second.mark, second.old_col), (p(2, 3), 3));
  }

  fn arbitrary_cursors(raw: Vec<(u8, u8, u8, u8)>) -> Vec<Cursor> {
    let mut list: Vec<Cursor> = raw
      .into_iter()
      .map(|(br, bc, mr, mc)| {
        selection(
          ((br % 4) as usize, (bc % 8) as usize),
          ((mr % 4) as usize, (mc % 8) as usize),
        )
      })
      .collect();
    list.sort_by_key(|cursor| cursor.base);
    list
  }

  fn merged_contract(first: Cursor, second: Cursor) -> Cursor {
    let mut points = [first.base, first.mark, second.base, second.mark];
    points.sort();
    if first.is_leftward() && second.is_leftward() {
      Cursor::new(points[3], points[0])
    } else {
      Cursor::new(points[0], points[3])
    }
  }

  quickcheck::quickcheck! {
    fn test_merged_pair_spans_all_points(a: (u8, u8, u8, u8), b: (u8, u8, u8, u8)) -> TestResult {
      let list = arbitrary_cursors(vec![a, b]);
      if !list[0].overlaps(&list[1]) {
        return TestResult::discard();
      }
      let expected = merged_contract(list[0], list[1]);
      let mut cursors = with_cursors(&list);
      cursors.merge_cursors();
      let merged = cursors.get(0).copied().unwrap_or_default();
      TestResult::from_bool(
        cursors.len() == 1 && (merged.base, merged.mark) == (expected.base, expected.mark),
      )
    }

    fn test_merge_leaves_no_overlap(raw: Vec<(u8, u8, u8, u8)>) -> TestResult {
      if raw.is_empty() {
        return TestResult::discard();
      }
      let list = arbitrary_cursors(raw);
      let mut cursors = with_cursors(&list);
      cursors.merge_cursors();
      let merged: Vec<Cursor> = cursors.iter().copied().collect();
      let ordered = merged.windows(2).all(|w| w[0].base <= w[1].base);
      let apart = merged.windows(2).all(|w| !w[0].overlaps(&w[1]));
      TestResult::from_bool(ordered && apart)
    }

    fn test_merge_is_undoable(raw: Vec<(u8, u8, u8, u8)>) -> TestResult {
      if raw.is_empty() {
        return TestResult::discard();
      }
      let list = arbitrary_cursors(raw);
      let mut cursors = with_cursors(&list);
      cursors.merge_cursors();
      undo_all(&mut cursors);
      let restored: Vec<(Point, Point)> = cursors.iter().map(|c| (c.base, c.mark)).collect();
      let expected: Vec<(Point, Point)> = list.iter().map(|c| (c.base, c.mark)).collect();
      TestResult::from_bool(restored == expected && cursors.current() == 0)
    }
  }
}
