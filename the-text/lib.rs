//! In-memory editing core: text content, a line index, multiple cursors and
//! an undo log that records every change to all three.

pub mod config;
pub mod cursors;
pub mod document;
pub mod history;
pub mod lines;
pub mod text;

pub use config::{
  Config,
  ConfigError,
};
pub use cursors::{
  Cursor,
  Cursors,
  Point,
};
pub use document::{
  Document,
  DocumentError,
};
pub use history::{
  Edit,
  History,
  Op,
  SharedHistory,
};
pub use lines::Lines;
pub use text::{
  Text,
  TextError,
};
