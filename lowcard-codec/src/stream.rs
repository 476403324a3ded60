//! Substream routing between the codec and the host storage layer.
//!
//! A serialized dictionary column occupies two substreams below the column's
//! own path: the keys stream (dictionary payloads) and the indexes stream
//! (per-block headers, additional keys and packed indexes). The host decides
//! where each substream lives and hands the codec a resolver from paths to
//! streams.

use std::cell::RefCell;
use std::io::{BufRead, Write};

/// Substream tags used by the dictionary codec below its own path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substream {
    DictionaryKeys,
    DictionaryIndexes,
}

/// A stack of substream tags addressing one stream of a serialized column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubstreamPath(Vec<Substream>);

impl SubstreamPath {
    pub fn new() -> SubstreamPath {
        SubstreamPath(Vec::new())
    }

    pub fn push(&mut self, substream: Substream) {
        self.0.push(substream);
    }

    pub fn pop(&mut self) {
        self.0.pop();
    }

    /// Replaces the innermost tag, as when switching from the keys to the
    /// indexes substream of the same column.
    pub fn replace_last(&mut self, substream: Substream) {
        if let Some(last) = self.0.last_mut() {
            *last = substream;
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[Substream] {
        &self.0
    }
}

/// Input stream for the decoder: buffered reads plus an end-of-stream probe.
pub trait ReadStream: BufRead {
    /// Returns `true` when no further bytes are available.
    fn is_eof(&mut self) -> std::io::Result<bool> {
        Ok(self.fill_buf()?.is_empty())
    }
}

impl<R: BufRead + ?Sized> ReadStream for R {}

/// Resolves substream paths to output streams.
///
/// Returning `None` means the host elected not to materialize that
/// substream. Streams are handed out behind `RefCell` so that the keys and
/// indexes substreams of one column can be held simultaneously.
pub trait WriteStreamSource {
    fn stream<'a>(&'a self, path: &SubstreamPath) -> Option<&'a RefCell<dyn Write + 'a>>;
}

/// Resolves substream paths to input streams.
pub trait ReadStreamSource {
    fn stream<'a>(&'a self, path: &SubstreamPath) -> Option<&'a RefCell<dyn ReadStream + 'a>>;
}

/// Settings driving one serialization session.
pub struct SerializeSettings<'a> {
    /// Path of the column being serialized; the codec pushes its substream
    /// tags below it.
    pub path: SubstreamPath,
    pub streams: &'a dyn WriteStreamSource,
    /// Target cap on the number of entries in the shared global dictionary.
    /// Zero disables the global dictionary: every block carries all of its
    /// keys in the additional-keys section.
    pub max_dictionary_size: u64,
    /// When the global dictionary fills up, flush it into the keys stream
    /// mid-session and start a fresh one instead of waiting for the suffix.
    pub use_new_dictionary_on_overflow: bool,
}

impl<'a> SerializeSettings<'a> {
    pub fn new(streams: &'a dyn WriteStreamSource) -> SerializeSettings<'a> {
        SerializeSettings {
            path: SubstreamPath::new(),
            streams,
            max_dictionary_size: 8192,
            use_new_dictionary_on_overflow: false,
        }
    }
}

/// Settings driving one deserialization session.
pub struct DeserializeSettings<'a> {
    pub path: SubstreamPath,
    pub streams: &'a dyn ReadStreamSource,
    /// Average serialized value size hint, forwarded to the element codec
    /// for pre-sizing variable-length reads. Zero disables the hint.
    pub avg_value_size_hint: usize,
}

impl<'a> DeserializeSettings<'a> {
    pub fn new(streams: &'a dyn ReadStreamSource) -> DeserializeSettings<'a> {
        DeserializeSettings {
            path: SubstreamPath::new(),
            streams,
            avg_value_size_hint: 0,
        }
    }
}
