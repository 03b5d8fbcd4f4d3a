//! Parser selection, configuration and the shared parser plumbing.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, SendTimeoutError};

use crate::entity::EntityMask;
use crate::error::{new_error, ErrorKind, Result};
use crate::header::Header;
use crate::queue::{BufferFuture, BufferQueueSender, ChunkReceiver, HeaderPromise};

/// The binary formats this crate can read.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FileFormat {
    /// o5m data file.
    O5m,
    /// o5c change file.
    O5c,
    /// OSM PBF file.
    Pbf,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tag = match self {
            FileFormat::O5m => "o5m",
            FileFormat::O5c => "o5c",
            FileFormat::Pbf => "pbf",
        };
        f.write_str(tag)
    }
}

impl FromStr for FileFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<FileFormat> {
        match s {
            "o5m" => Ok(FileFormat::O5m),
            "o5c" => Ok(FileFormat::O5c),
            "pbf" => Ok(FileFormat::Pbf),
            _ => Err(new_error(ErrorKind::UnsupportedFormat {
                format: s.to_string(),
            })),
        }
    }
}

/// A cloneable flag for stopping a running parser from any thread.
///
/// Cancellation is cooperative: the parser checks the flag at chunk
/// boundaries, after entity commits and around blocking queue operations.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Configuration for a single parser instance.
#[derive(Clone, Debug)]
pub struct ParserConfig {
    /// Which entity types to deliver. Excluded types are skipped without
    /// allocation; an empty mask parses only the header.
    pub read_types: EntityMask,
    /// If false, version/timestamp/changeset/uid/user are not delivered.
    pub read_metadata: bool,
    /// If false, all PBF blobs are decoded on the parser thread instead of
    /// the worker pool.
    pub use_pool_threads_for_pbf_parsing: bool,
    /// Hard limit on the size of a PBF `BlobHeader`.
    pub max_blob_header_size: u64,
    /// Hard limit on the uncompressed size of a PBF blob.
    pub max_uncompressed_blob_size: u64,
}

impl Default for ParserConfig {
    fn default() -> ParserConfig {
        ParserConfig {
            read_types: EntityMask::ALL,
            read_metadata: true,
            use_pool_threads_for_pbf_parsing: true,
            max_blob_header_size: 64 * 1024,
            max_uncompressed_blob_size: 32 * 1024 * 1024,
        }
    }
}

/// A format-specific parser driving one input stream to completion.
pub trait Parser: Send {
    /// Runs the parser until end-of-stream, a fatal error or
    /// cancellation. Blocking; meant to be called on a dedicated thread.
    ///
    /// Errors are not returned here: they are published through the header
    /// promise (if still pending) and as a failed item on the output
    /// queue, and the output queue is always closed before `run` returns.
    fn run(&mut self);

    /// Returns a token that cancels this parser. Clone it before moving
    /// the parser to its worker thread.
    fn cancel_token(&self) -> CancelToken;

    /// Requests cancellation. Idempotent, safe from any thread.
    fn cancel(&self) {
        self.cancel_token().cancel();
    }
}

/// Everything a parser constructor receives from [`open_parser`].
///
/// [`open_parser`]: ParserFactory::open_parser
pub struct ParserContext {
    pub input: ChunkReceiver,
    pub output: BufferQueueSender,
    pub header_promise: HeaderPromise,
    pub config: ParserConfig,
}

/// How long blocking queue operations wait between cancellation checks.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Queue plumbing shared by all parser implementations.
pub(crate) struct ParserCore {
    input: ChunkReceiver,
    output: Option<BufferQueueSender>,
    header_promise: HeaderPromise,
    pub(crate) read_types: EntityMask,
    pub(crate) read_metadata: bool,
    cancel: CancelToken,
    input_done: bool,
}

impl ParserCore {
    pub(crate) fn new(context: ParserContext) -> ParserCore {
        ParserCore {
            input: context.input,
            output: Some(context.output),
            header_promise: context.header_promise,
            read_types: context.config.read_types,
            read_metadata: context.config.read_metadata,
            cancel: CancelToken::new(),
            input_done: false,
        }
    }

    pub(crate) fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(new_error(ErrorKind::Cancelled))
        } else {
            Ok(())
        }
    }

    /// Fetches the next chunk from the input queue. `Ok(None)` is
    /// end-of-stream; a failure sentinel from the producer and
    /// cancellation surface as errors.
    pub(crate) fn get_input(&mut self) -> Result<Option<Vec<u8>>> {
        if self.input_done {
            return Ok(None);
        }
        loop {
            self.check_cancelled()?;
            match self.input.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(Ok(chunk)) => return Ok(Some(chunk)),
                Ok(Err(err)) => {
                    self.input_done = true;
                    return Err(err.into());
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    self.input_done = true;
                    return Ok(None);
                }
            }
        }
    }

    pub(crate) fn input_done(&self) -> bool {
        self.input_done
    }

    /// Pushes a buffer future downstream, blocking while the output queue
    /// is full.
    pub(crate) fn send_to_output_queue(&self, future: BufferFuture) -> Result<()> {
        let Some(output) = self.output.as_ref() else {
            return Ok(());
        };
        let mut item = future;
        loop {
            self.check_cancelled()?;
            match output.send_timeout(item, CANCEL_POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(value)) => item = value,
                // Consumer is gone; nothing left to deliver to.
                Err(SendTimeoutError::Disconnected(_)) => return Ok(()),
            }
        }
    }

    /// Publishes the header. Only the first call has an effect.
    pub(crate) fn set_header(&mut self, header: &Header) {
        if !self.header_promise.is_fulfilled() {
            self.header_promise.fulfill(Ok(header.clone()));
        }
    }

    pub(crate) fn header_is_done(&self) -> bool {
        self.header_promise.is_fulfilled()
    }

    /// Terminates the stream: publishes a pending error to the header
    /// promise and the output queue, then closes the queue, which is the
    /// end-of-stream sentinel for the consumer.
    pub(crate) fn finish(&mut self, result: Result<()>) {
        if let Err(err) = result {
            self.header_promise.fulfill(Err(err.clone()));
            if let Some(output) = self.output.as_ref() {
                let _ = output.send(BufferFuture::ready(Err(err)));
            }
        }
        self.output = None;
    }
}

/// A constructor for one parser implementation.
pub type ParserConstructor = fn(ParserContext) -> Box<dyn Parser>;

/// A registry mapping format tags to parser constructors.
///
/// Registration is an explicit startup step:
/// [`with_builtin_formats`](ParserFactory::with_builtin_formats) returns a
/// factory that knows the formats built into this crate, and
/// [`register`](ParserFactory::register) adds external implementations.
pub struct ParserFactory {
    parsers: HashMap<FileFormat, ParserConstructor>,
}

impl ParserFactory {
    /// Creates an empty factory with no registered formats.
    pub fn new() -> ParserFactory {
        ParserFactory {
            parsers: HashMap::new(),
        }
    }

    /// Creates a factory with the o5m, o5c and pbf parsers registered.
    pub fn with_builtin_formats() -> ParserFactory {
        let mut factory = ParserFactory::new();
        let builtin: [(FileFormat, ParserConstructor); 3] = [
            (FileFormat::O5m, crate::o5m::O5mParser::boxed),
            (FileFormat::O5c, crate::o5m::O5mParser::boxed),
            (FileFormat::Pbf, crate::pbf::PbfParser::boxed),
        ];
        for (format, constructor) in builtin {
            factory
                .register(format, constructor)
                .expect("builtin formats registered twice");
        }
        factory
    }

    /// Registers a parser constructor for a format tag. Registering the
    /// same tag twice is an error.
    pub fn register(&mut self, format: FileFormat, constructor: ParserConstructor) -> Result<()> {
        if self.parsers.contains_key(&format) {
            return Err(new_error(ErrorKind::FormatAlreadyRegistered { format }));
        }
        self.parsers.insert(format, constructor);
        Ok(())
    }

    /// Constructs a parser for `format` wired to the given queues and
    /// header promise.
    pub fn open_parser(
        &self,
        format: FileFormat,
        input: ChunkReceiver,
        output: BufferQueueSender,
        header_promise: HeaderPromise,
        config: ParserConfig,
    ) -> Result<Box<dyn Parser>> {
        let constructor =
            self.parsers
                .get(&format)
                .ok_or_else(|| new_error(ErrorKind::UnsupportedFormat {
                    format: format.to_string(),
                }))?;
        Ok(constructor(ParserContext {
            input,
            output,
            header_promise,
            config,
        }))
    }
}

impl Default for ParserFactory {
    fn default() -> ParserFactory {
        ParserFactory::with_builtin_formats()
    }
}
