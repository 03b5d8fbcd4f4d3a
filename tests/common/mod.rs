//! Helpers for driving the full pipeline from in-memory streams.

use std::thread;

use osmstream::{
    buffer_queue, chunk_queue, header_promise, Entity, FileFormat, Header, ParserConfig,
    ParserFactory, Result,
};

/// Chunk size for the input queue, deliberately small so datasets and
/// blobs regularly straddle chunk boundaries.
const CHUNK_SIZE: usize = 16;

/// Runs `data` through the pipeline and collects the header and all
/// entities. The second result holds the first error delivered on the
/// output queue, if any.
pub fn run_parser(
    format: FileFormat,
    data: Vec<u8>,
    config: ParserConfig,
) -> (Result<Header>, Result<Vec<Entity>>) {
    let factory = ParserFactory::with_builtin_formats();
    let (chunk_tx, chunk_rx) = chunk_queue();
    let (buffer_tx, buffer_rx) = buffer_queue();
    let (promise, header_future) = header_promise();

    let mut parser = factory
        .open_parser(format, chunk_rx, buffer_tx, promise, config)
        .unwrap();

    let producer = thread::spawn(move || {
        for chunk in data.chunks(CHUNK_SIZE) {
            if chunk_tx.send(Ok(chunk.to_vec())).is_err() {
                // The parser hung up early (error or entity filter).
                return;
            }
        }
    });
    let worker = thread::spawn(move || parser.run());

    let header = header_future.get();

    let mut entities = Vec::new();
    let mut failure = None;
    for future in buffer_rx {
        match future.get() {
            Ok(buffer) => entities.extend(buffer),
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    producer.join().unwrap();
    worker.join().unwrap();

    let result = match failure {
        Some(err) => Err(err),
        None => Ok(entities),
    };
    (header, result)
}

/// Shorthand for a run with the default configuration.
pub fn run_with_defaults(format: FileFormat, data: Vec<u8>) -> (Result<Header>, Result<Vec<Entity>>) {
    run_parser(format, data, ParserConfig::default())
}
