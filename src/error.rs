use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::result;
use std::str::Utf8Error;

use crate::factory::FileFormat;

// Error data structures are modeled just like in the `csv` crate by BurntSushi.

pub(crate) fn new_error(kind: ErrorKind) -> Error {
    Error(Box::new(kind))
}

pub(crate) fn new_protobuf_error(err: protobuf::Error, location: &'static str) -> Error {
    Error(Box::new(ErrorKind::Protobuf {
        message: err.to_string(),
        location,
    }))
}

/// A type alias for `Result<T, osmstream::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when reading OSM binary data.
///
/// The same error value may have to be delivered through the header promise
/// and as a failed item on the output queue, so `Error` is `Clone`. Wrapped
/// I/O errors survive cloning as their kind plus the rendered message.
#[derive(Debug)]
pub struct Error(Box<ErrorKind>);

impl Error {
    /// Return the specific type of this error.
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Unwrap this error into its underlying type.
    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Returns true if parsing was aborted by a cancellation request.
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.0, ErrorKind::Cancelled)
    }
}

/// The specific type of an error.
#[non_exhaustive]
#[derive(Debug)]
pub enum ErrorKind {
    /// An error for I/O operations, including a failure sentinel received
    /// from the input queue.
    Io(io::Error),
    /// An error that occurred when decoding a protobuf message.
    Protobuf {
        message: String,
        location: &'static str,
    },
    /// The o5m prologue or a PBF blob type did not match the expected bytes.
    FormatMagic {
        format: FileFormat,
        detail: &'static str,
    },
    /// End of stream was reached in the middle of a dataset or blob.
    Truncated { location: &'static str },
    /// A varint was longer than 10 bytes or ran past the end of its input.
    MalformedVarint,
    /// An o5m string reference was 0, beyond the table size, or pointed at
    /// a slot that has not been (re)populated since the last reset.
    BadStringSlot { index: u64 },
    /// A NUL terminator was missing in an o5m tag, user name or role.
    MissingNul { location: &'static str },
    /// An o5m relation member type byte outside `'0'..='2'`.
    UnknownMemberType { byte: u8 },
    /// A PBF `BlobHeader` without a `datasize` field.
    BlobHeaderMissingSize,
    /// A PBF blob header or uncompressed blob exceeded its configured cap.
    SizeLimitExceeded {
        what: &'static str,
        size: u64,
        limit: u64,
    },
    /// A PBF `required_features` entry this implementation does not know.
    UnsupportedFeature { feature: String },
    /// A PBF blob compressed with a codec this implementation does not
    /// support.
    UnsupportedCompression { codec: &'static str },
    /// The inflated size of a PBF blob did not match its declared
    /// `raw_size`.
    UncompressedSizeMismatch { declared: u64, actual: u64 },
    /// Inconsistent array lengths or tag terminators inside a
    /// `PrimitiveBlock`.
    MalformedBlock { location: &'static str },
    /// An element contains an out-of-bounds index to the stringtable.
    StringtableIndexOutOfBounds { index: usize },
    /// The stringtable contains an entry at `index` that could not be
    /// decoded to a valid UTF-8 string.
    StringtableUtf8 { err: Utf8Error, index: usize },
    /// A string in the input was not valid UTF-8.
    Utf8 {
        err: Utf8Error,
        location: &'static str,
    },
    /// A parser was registered twice for the same format tag.
    FormatAlreadyRegistered { format: FileFormat },
    /// No parser is registered for the requested format tag.
    UnsupportedFormat { format: String },
    /// Parsing was aborted by a cancellation request.
    Cancelled,
}

impl Clone for Error {
    fn clone(&self) -> Error {
        let kind = match *self.0 {
            ErrorKind::Io(ref err) => ErrorKind::Io(io::Error::new(err.kind(), err.to_string())),
            ErrorKind::Protobuf {
                ref message,
                location,
            } => ErrorKind::Protobuf {
                message: message.clone(),
                location,
            },
            ErrorKind::FormatMagic { format, detail } => ErrorKind::FormatMagic { format, detail },
            ErrorKind::Truncated { location } => ErrorKind::Truncated { location },
            ErrorKind::MalformedVarint => ErrorKind::MalformedVarint,
            ErrorKind::BadStringSlot { index } => ErrorKind::BadStringSlot { index },
            ErrorKind::MissingNul { location } => ErrorKind::MissingNul { location },
            ErrorKind::UnknownMemberType { byte } => ErrorKind::UnknownMemberType { byte },
            ErrorKind::BlobHeaderMissingSize => ErrorKind::BlobHeaderMissingSize,
            ErrorKind::SizeLimitExceeded { what, size, limit } => {
                ErrorKind::SizeLimitExceeded { what, size, limit }
            }
            ErrorKind::UnsupportedFeature { ref feature } => ErrorKind::UnsupportedFeature {
                feature: feature.clone(),
            },
            ErrorKind::UnsupportedCompression { codec } => {
                ErrorKind::UnsupportedCompression { codec }
            }
            ErrorKind::UncompressedSizeMismatch { declared, actual } => {
                ErrorKind::UncompressedSizeMismatch { declared, actual }
            }
            ErrorKind::MalformedBlock { location } => ErrorKind::MalformedBlock { location },
            ErrorKind::StringtableIndexOutOfBounds { index } => {
                ErrorKind::StringtableIndexOutOfBounds { index }
            }
            ErrorKind::StringtableUtf8 { err, index } => {
                ErrorKind::StringtableUtf8 { err, index }
            }
            ErrorKind::Utf8 { err, location } => ErrorKind::Utf8 { err, location },
            ErrorKind::FormatAlreadyRegistered { format } => {
                ErrorKind::FormatAlreadyRegistered { format }
            }
            ErrorKind::UnsupportedFormat { ref format } => ErrorKind::UnsupportedFormat {
                format: format.clone(),
            },
            ErrorKind::Cancelled => ErrorKind::Cancelled,
        };
        Error(Box::new(kind))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        new_error(ErrorKind::Io(err))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        io::Error::new(io::ErrorKind::Other, err)
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self.0 {
            ErrorKind::Io(ref err) => Some(err),
            ErrorKind::StringtableUtf8 { ref err, .. } => Some(err),
            ErrorKind::Utf8 { ref err, .. } => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.0 {
            ErrorKind::Io(ref err) => err.fmt(f),
            ErrorKind::Protobuf {
                ref message,
                location,
            } => {
                write!(f, "protobuf error at '{location}': {message}")
            }
            ErrorKind::FormatMagic { format, detail } => {
                write!(f, "{format} format error: {detail}")
            }
            ErrorKind::Truncated { location } => {
                write!(f, "premature end of stream in {location}")
            }
            ErrorKind::MalformedVarint => write!(f, "malformed varint"),
            ErrorKind::BadStringSlot { index } => {
                write!(f, "reference to non-existing string in table: {index}")
            }
            ErrorKind::MissingNul { location } => {
                write!(f, "no null byte in {location}")
            }
            ErrorKind::UnknownMemberType { byte } => {
                write!(f, "unknown relation member type: {byte:#04x}")
            }
            ErrorKind::BlobHeaderMissingSize => {
                write!(f, "BlobHeader.datasize missing or zero")
            }
            ErrorKind::SizeLimitExceeded { what, size, limit } => {
                write!(f, "{what} is too big: {size} bytes (limit {limit})")
            }
            ErrorKind::UnsupportedFeature { ref feature } => {
                write!(f, "required feature not supported: {feature}")
            }
            ErrorKind::UnsupportedCompression { codec } => {
                write!(f, "unsupported blob compression: {codec}")
            }
            ErrorKind::UncompressedSizeMismatch { declared, actual } => {
                write!(
                    f,
                    "uncompressed blob size {actual} does not match declared raw_size {declared}"
                )
            }
            ErrorKind::MalformedBlock { location } => {
                write!(f, "malformed primitive block: {location}")
            }
            ErrorKind::StringtableIndexOutOfBounds { index } => {
                write!(f, "stringtable index out of bounds: {index}")
            }
            ErrorKind::StringtableUtf8 { ref err, index } => {
                write!(f, "invalid UTF-8 at string table index {index}: {err}")
            }
            ErrorKind::Utf8 { ref err, location } => {
                write!(f, "invalid UTF-8 in {location}: {err}")
            }
            ErrorKind::FormatAlreadyRegistered { format } => {
                write!(f, "a parser for format {format} is already registered")
            }
            ErrorKind::UnsupportedFormat { ref format } => {
                write!(f, "no parser registered for format {format}")
            }
            ErrorKind::Cancelled => write!(f, "parsing was cancelled"),
        }
    }
}
