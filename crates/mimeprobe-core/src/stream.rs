//! Sniffable stream with a scoped decoding override.
//!
//! Every signature reads through a [`SniffableStream`]. Plain signatures read
//! the primary cursor; archive signatures install an override (a decoded view
//! of a freshly reopened resource) for the duration of one match attempt.
//! [`OverrideScope`] removes the override on every exit path.

use std::io::{Read, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};

use crate::cursor::ByteCursor;
use crate::error::{ProbeError, ProbeResult};
use crate::resource::{ReadSeek, Resource};

/// Reader type backing every cursor of a stream.
pub type BoxedRead = Box<dyn Read + Send>;

/// Default cap on decompressed ZIP entry bytes and parsed XML bytes.
pub const DEFAULT_MAX_ENTRY_SIZE: u64 = 16 * 1024 * 1024;

/// Default number of leading bytes handed to the host prober.
pub const DEFAULT_HEAD_SIZE: usize = 64;

/// Limits applied while sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffOptions {
    /// Maximum bytes decoded from a single ZIP entry or parsed as XML.
    pub max_entry_size: u64,
    /// Leading bytes passed to the host prober.
    pub head_size: usize,
}

impl Default for SniffOptions {
    fn default() -> Self {
        Self {
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            head_size: DEFAULT_HEAD_SIZE,
        }
    }
}

/// A resource being sniffed, with its primary cursor and an optional
/// override cursor.
pub struct SniffableStream<'r> {
    resource: &'r dyn Resource,
    primary: ByteCursor<BoxedRead>,
    overlay: Option<ByteCursor<BoxedRead>>,
    options: SniffOptions,
}

impl<'r> SniffableStream<'r> {
    /// Open `resource` and wrap it in a primary cursor.
    ///
    /// Failure to open is [`ProbeError::Unreachable`].
    pub fn open(resource: &'r dyn Resource, options: SniffOptions) -> ProbeResult<Self> {
        let reader = resource.open().map_err(|source| ProbeError::Unreachable {
            locator: resource.locator().to_string(),
            source,
        })?;
        Ok(Self {
            resource,
            primary: ByteCursor::new(Box::new(reader) as BoxedRead),
            overlay: None,
            options,
        })
    }

    pub fn resource(&self) -> &'r dyn Resource {
        self.resource
    }

    pub fn locator(&self) -> &str {
        self.resource.locator()
    }

    pub fn options(&self) -> &SniffOptions {
        &self.options
    }

    /// Reopen the resource, pass the fresh reader through `transform` and
    /// install the result as the override cursor.
    pub fn open_override<F>(&mut self, transform: F) -> ProbeResult<()>
    where
        F: FnOnce(Box<dyn ReadSeek>) -> ProbeResult<BoxedRead>,
    {
        if self.overlay.is_some() {
            return Err(ProbeError::OverrideActive {
                locator: self.locator().to_string(),
            });
        }
        let raw = self.reopen()?;
        let decoded = transform(raw)?;
        self.overlay = Some(ByteCursor::new(decoded));
        Ok(())
    }

    /// Drop the override cursor, if any. Reads fall back to the primary
    /// cursor.
    pub fn close_override(&mut self) {
        if self.overlay.take().is_some() {
            tracing::trace!(locator = self.locator(), "override closed");
        }
    }

    pub fn has_override(&self) -> bool {
        self.overlay.is_some()
    }

    /// Override cursor if installed, else the primary cursor.
    pub fn current_cursor(&self) -> &ByteCursor<BoxedRead> {
        self.overlay.as_ref().unwrap_or(&self.primary)
    }

    pub fn current_cursor_mut(&mut self) -> &mut ByteCursor<BoxedRead> {
        self.overlay.as_mut().unwrap_or(&mut self.primary)
    }

    /// The current cursor rewound to offset zero, for parsers that want a
    /// plain [`Read`].
    pub fn reader(&mut self) -> &mut ByteCursor<BoxedRead> {
        let cursor = self.current_cursor_mut();
        cursor.rewind();
        cursor
    }

    pub fn read_at(&mut self, offset: usize, length: usize) -> ProbeResult<&[u8]> {
        self.current_cursor_mut().read_at(offset, length)
    }

    pub fn read_byte_at(&mut self, offset: usize) -> ProbeResult<u8> {
        self.current_cursor_mut().read_byte_at(offset)
    }

    pub fn read_line_at(&mut self, offset: usize) -> ProbeResult<Option<Vec<u8>>> {
        self.current_cursor_mut().read_line_at(offset)
    }

    pub fn read_next_byte(&mut self) -> ProbeResult<Option<u8>> {
        self.current_cursor_mut().read_next_byte()
    }

    /// A fresh seekable reader over the resource, positioned at the start.
    pub fn reopen(&self) -> ProbeResult<Box<dyn ReadSeek>> {
        let mut reader = self.resource.open()?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(reader)
    }

    /// Up to `length` leading bytes of the primary cursor. Short input is
    /// not an error.
    pub fn peek_head(&mut self, length: usize) -> ProbeResult<&[u8]> {
        self.primary.head(length)
    }

    /// Enter an override scope. The returned guard derefs to the stream and
    /// closes any override when dropped.
    pub fn scoped(&mut self) -> OverrideScope<'_, 'r> {
        OverrideScope { stream: self }
    }

    /// Release the stream and any override.
    pub fn close(mut self) {
        self.close_override();
    }
}

impl std::fmt::Debug for SniffableStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SniffableStream")
            .field("locator", &self.locator())
            .field("primary", &self.primary)
            .field("overlay", &self.overlay)
            .field("options", &self.options)
            .finish()
    }
}

/// RAII guard pairing a decoding override with its removal.
pub struct OverrideScope<'s, 'r> {
    stream: &'s mut SniffableStream<'r>,
}

impl<'r> Deref for OverrideScope<'_, 'r> {
    type Target = SniffableStream<'r>;

    fn deref(&self) -> &Self::Target {
        self.stream
    }
}

impl DerefMut for OverrideScope<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.stream
    }
}

impl Drop for OverrideScope<'_, '_> {
    fn drop(&mut self) {
        self.stream.close_override();
    }
}
