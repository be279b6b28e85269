use the_text::Document;

const MAX_INITIAL_BYTES: usize = 4 * 1024;
const MAX_OPS: usize = 128;
const MAX_INSERT_BYTES: usize = 64;

#[derive(Debug, Clone)]
pub enum EditOp {
  Replace {
    anchor: u16,
    delete: u16,
    insert: Vec<u8>,
  },
  AddCursor {
    row: u8,
    col: u8,
  },
  Select {
    row: u8,
    col: u8,
  },
}

pub struct FuzzSession {
  pub doc: Document,
  pub ops: Vec<EditOp>,
}

pub fn session_from_bytes(data: &[u8]) -> Option<FuzzSession> {
  let mut cursor = ByteCursor::new(data);
  let initial_len = cursor.next_usize(MAX_INITIAL_BYTES);
  let initial = lossy_text(cursor.next_bytes(initial_len)).replace('\0', "");
  let op_count = cursor.next_usize(MAX_OPS);
  let mut ops = Vec::with_capacity(op_count);
  for _ in 0..op_count {
    let op = match cursor.next_u8() % 3 {
      0 => {
        let anchor = cursor.next_u16();
        let delete = cursor.next_u16() % 16;
        let insert_len = cursor.next_usize(MAX_INSERT_BYTES);
        let insert = cursor.next_bytes(insert_len).to_vec();
        EditOp::Replace {
          anchor,
          delete,
          insert,
        }
      },
      1 => EditOp::AddCursor {
        row: cursor.next_u8(),
        col: cursor.next_u8(),
      },
      _ => EditOp::Select {
        row: cursor.next_u8(),
        col: cursor.next_u8(),
      },
    };
    ops.push(op);
  }

  let doc = Document::new(initial.into_bytes()).ok()?;
  Some(FuzzSession { doc, ops })
}

/// Apply one op as a complete user action.
pub fn apply_op(doc: &mut Document, op: &EditOp) {
  let text = doc.text_mut();
  match op {
    EditOp::Replace {
      anchor,
      delete,
      insert,
    } => {
      let from = char_boundary(text.as_bytes(), *anchor as usize % (text.len() + 1));
      let to = char_boundary(text.as_bytes(), (from + *delete as usize).min(text.len()));
      text.delete_text(from, to);
      let at = from.min(text.len());
      text.insert_text(at, &lossy_text(insert));
    },
    EditOp::AddCursor { row, col } => {
      text.cursors_mut().add_cursor(*row as usize % 8, *col as usize % 16);
    },
    EditOp::Select { row, col } => {
      text.cursors_mut().mark_cursor(*row as usize % 8, *col as usize % 16);
    },
  }
  text.finish_action();
}

/// Raw bytes as text. Control bytes, tabs and carriage returns are left in
/// for the editor to clean up.
fn lossy_text(bytes: &[u8]) -> String {
  String::from_utf8_lossy(bytes).into_owned()
}

fn char_boundary(bytes: &[u8], mut at: usize) -> usize {
  while at < bytes.len() && (bytes[at] & 0xC0) == 0x80 {
    at += 1;
  }
  at
}

struct ByteCursor<'a> {
  data: &'a [u8],
  pos:  usize,
}

impl<'a> ByteCursor<'a> {
  fn new(data: &'a [u8]) -> Self {
    Self { data, pos: 0 }
  }

  fn next_u8(&mut self) -> u8 {
    let value = self.data.get(self.pos).copied().unwrap_or(0);
    self.pos = self.pos.saturating_add(1);
    value
  }

  fn next_u16(&mut self) -> u16 {
    let lo = self.next_u8() as u16;
    let hi = self.next_u8() as u16;
    lo | (hi << 8)
  }

  fn next_usize(&mut self, max: usize) -> usize {
    if max == 0 {
      return 0;
    }
    (self.next_u16() as usize) % (max + 1)
  }

  fn next_bytes(&mut self, len: usize) -> &'a [u8] {
    let start = self.pos.min(self.data.len());
    let end = start.saturating_add(len).min(self.data.len());
    self.pos = end;
    &self.data[start..end]
  }
}
