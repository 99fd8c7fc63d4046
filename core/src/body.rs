//! Request bodies and how they are replayed across attempts.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

use crate::error::CommandError;

/// Readable and rewindable, e.g. a `File` or an `io::Cursor`.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// Payload attached to a command.
pub enum Body {
    /// Held in memory and resent unchanged on every attempt.
    Bytes(Vec<u8>),
    /// Rewound to the start before every attempt.
    Seekable(Box<dyn ReadSeek>),
    /// Read once. A retried attempt sends whatever is left in the stream.
    Stream(Box<dyn Read + Send>),
}

impl Body {
    pub fn seekable(reader: impl ReadSeek + 'static) -> Self {
        Body::Seekable(Box::new(reader))
    }

    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        Body::Stream(Box::new(reader))
    }

    /// `application/x-www-form-urlencoded` encoding of `pairs`, in order.
    pub fn form(pairs: &[(String, String)]) -> Result<Self, CommandError> {
        serde_urlencoded::to_string(pairs)
            .map(|encoded| Body::Bytes(encoded.into_bytes()))
            .map_err(|e| CommandError::Configuration(e.to_string()))
    }

    pub fn supports_rewind(&self) -> bool {
        !matches!(self, Body::Stream(_))
    }

    /// Seek back to offset zero when the body supports it.
    pub fn rewind(&mut self) -> io::Result<()> {
        if let Body::Seekable(reader) = self {
            reader.seek(SeekFrom::Start(0))?;
        }
        Ok(())
    }

    /// Bytes to send for the current attempt.
    pub fn read_payload(&mut self) -> io::Result<Vec<u8>> {
        match self {
            Body::Bytes(bytes) => Ok(bytes.clone()),
            Body::Seekable(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
            Body::Stream(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::Seekable(_) => f.write_str("Seekable(..)"),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Bytes(text.into_bytes())
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Bytes(text.as_bytes().to_vec())
    }
}
