//! Document core state.
//!
//! A [`Document`] ties one [`Text`] to the history it logs into. It does no
//! I/O and no rendering: bytes come in, and queries for a display layer come
//! out.
//!
//! # Example
//!
//! ```no_run
//! use the_text::document::Document;
//!
//! let mut doc = Document::new(b"hello\n".to_vec()).unwrap();
//! doc.text_mut().insert_text(5, " world");
//! doc.text_mut().finish_action();
//! assert_eq!(doc.line(0), b"hello world");
//!
//! doc.text_mut().undo_text(false);
//! assert_eq!(doc.line(0), b"hello");
//! ```

use std::{
  cell::Ref,
  rc::Rc,
};

use thiserror::Error;

use crate::{
  config::{
    Config,
    ConfigError,
  },
  cursors::Cursors,
  history::{
    History,
    SharedHistory,
  },
  text::{
    Text,
    TextError,
  },
};

/// Errors that can occur when creating a document.
#[derive(Debug, Error)]
pub enum DocumentError {
  #[error(transparent)]
  Text(#[from] TextError),
  #[error(transparent)]
  Config(#[from] ConfigError),
}

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Debug)]
pub struct Document {
  text:    Text,
  history: SharedHistory,
}

impl Document {
  pub fn new(bytes: Vec<u8>) -> Result<Self> {
    Self::with_config(bytes, &Config::default())
  }

  pub fn with_config(bytes: Vec<u8>, config: &Config) -> Result<Self> {
    config.validate()?;
    let history = History::shared(config.history_capacity);
    let mut text = Text::with_config(Rc::clone(&history), config);
    text.load_text(bytes)?;
    tracing::debug!(bytes = text.len(), "created document");
    Ok(Self { text, history })
  }

  #[inline]
  pub fn text(&self) -> &Text {
    &self.text
  }

  #[inline]
  pub fn text_mut(&mut self) -> &mut Text {
    &mut self.text
  }

  #[inline]
  pub fn cursors(&self) -> &Cursors {
    self.text.cursors()
  }

  /// The undo log shared by the text and its cursors.
  pub fn history(&self) -> Ref<'_, History> {
    self.history.borrow()
  }

  /// Number of lines.
  #[inline]
  pub fn height(&self) -> usize {
    self.text.lines().count_lines()
  }

  /// Number of bytes in a row, excluding its newline.
  #[inline]
  pub fn width(&self, row: usize) -> usize {
    self.line(row).len()
  }

  /// Bytes of a row, excluding its newline.
  #[inline]
  pub fn line(&self, row: usize) -> &[u8] {
    self.text.line(row)
  }
}
