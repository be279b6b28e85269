#![no_main]

mod common;

use libfuzzer_sys::fuzz_target;

use crate::common::{
  apply_op,
  session_from_bytes,
};

fn line_ends(bytes: &[u8]) -> Vec<usize> {
  bytes
    .iter()
    .enumerate()
    .filter(|(_, byte)| **byte == b'\n')
    .map(|(i, _)| i + 1)
    .collect()
}

fn check_lines(doc: &the_text::Document) {
  let lines = doc.text().lines();
  let ends: Vec<usize> = (0..lines.count_lines()).map(|row| lines.end_line(row)).collect();
  assert_eq!(ends, line_ends(doc.text().as_bytes()));
}

fuzz_target!(|data: &[u8]| {
  let Some(mut session) = session_from_bytes(data) else {
    return;
  };

  let initial = session.doc.text().save_text();
  for op in &session.ops {
    apply_op(&mut session.doc, op);
    let bytes = session.doc.text().as_bytes();
    let settled = bytes.ends_with(b"\n") && !bytes.ends_with(b"\n\n") && bytes != b"\n";
    assert!(bytes.is_empty() || settled);
    assert!(!bytes.windows(2).any(|pair| pair == b" \n"));
    check_lines(&session.doc);
  }
  let last = session.doc.text().save_text();

  while session.doc.text_mut().undo_text(false) {}
  assert_eq!(session.doc.text().as_bytes(), initial.as_slice());
  check_lines(&session.doc);

  while session.doc.text_mut().redo_text(false) {}
  assert_eq!(session.doc.text().as_bytes(), last.as_slice());
  check_lines(&session.doc);
});
