//! Queues and single-shot promises connecting the pipeline stages.
//!
//! The input stage feeds a parser through a bounded channel of byte
//! chunks; the parser feeds the consumer through a bounded channel of
//! buffer futures. Bounded channels block on both ends, which gives
//! end-to-end backpressure. A closed channel (all senders dropped) is the
//! end-of-stream sentinel; an `Err` item is the failure sentinel.

use std::io;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::buffer::Buffer;
use crate::error::{new_error, ErrorKind, Result};
use crate::header::Header;

/// Default capacity for the input and output queues.
const DEFAULT_QUEUE_SIZE: usize = 10;

/// Sending half of the input queue, used by the byte-chunk producer.
pub type ChunkSender = Sender<io::Result<Vec<u8>>>;
/// Receiving half of the input queue, owned by the parser.
pub type ChunkReceiver = Receiver<io::Result<Vec<u8>>>;

/// Sending half of the output queue, owned by the parser.
pub type BufferQueueSender = Sender<BufferFuture>;
/// Receiving half of the output queue, used by the consumer.
pub type BufferQueueReceiver = Receiver<BufferFuture>;

/// Creates the bounded input queue for raw byte chunks.
pub fn chunk_queue() -> (ChunkSender, ChunkReceiver) {
    bounded(DEFAULT_QUEUE_SIZE)
}

/// Creates the bounded output queue for decoded buffers.
pub fn buffer_queue() -> (BufferQueueSender, BufferQueueReceiver) {
    bounded(DEFAULT_QUEUE_SIZE)
}

/// The fulfilling half of a single-shot buffer slot.
///
/// Fulfillment is infallible: if the matching future was dropped the
/// result is simply discarded.
#[derive(Debug)]
pub(crate) struct BufferPromise {
    tx: Sender<Result<Buffer>>,
}

impl BufferPromise {
    pub(crate) fn fulfill(self, value: Result<Buffer>) {
        let _ = self.tx.send(value);
    }
}

/// A decoded buffer that may still be in flight on a pool worker.
///
/// Futures appear on the output queue in input order, so awaiting them
/// sequentially yields entities in input order no matter which worker
/// finishes first.
#[derive(Debug)]
pub struct BufferFuture {
    rx: Receiver<Result<Buffer>>,
}

impl BufferFuture {
    /// Blocks until the buffer is decoded. A future whose producer was
    /// dropped without a result reports cancellation.
    pub fn get(self) -> Result<Buffer> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(new_error(ErrorKind::Cancelled)))
    }

    /// Wraps an already decoded result.
    pub(crate) fn ready(value: Result<Buffer>) -> BufferFuture {
        let (promise, future) = buffer_promise();
        promise.fulfill(value);
        future
    }
}

pub(crate) fn buffer_promise() -> (BufferPromise, BufferFuture) {
    let (tx, rx) = bounded(1);
    (BufferPromise { tx }, BufferFuture { rx })
}

/// The fulfilling half of the per-stream header slot.
#[derive(Debug)]
pub struct HeaderPromise {
    tx: Sender<Result<Header>>,
    fulfilled: bool,
}

impl HeaderPromise {
    /// Fulfills the promise. Later calls are ignored; the header is
    /// published at most once.
    pub(crate) fn fulfill(&mut self, value: Result<Header>) {
        if !self.fulfilled {
            self.fulfilled = true;
            let _ = self.tx.send(value);
        }
    }

    pub(crate) fn is_fulfilled(&self) -> bool {
        self.fulfilled
    }
}

/// The consumer's handle on the per-stream header.
#[derive(Debug)]
pub struct HeaderFuture {
    rx: Receiver<Result<Header>>,
}

impl HeaderFuture {
    /// Blocks until the header is published or the parser terminated
    /// without publishing one.
    pub fn get(self) -> Result<Header> {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(new_error(ErrorKind::Cancelled)))
    }
}

/// Creates the single-shot header promise/future pair.
pub fn header_promise() -> (HeaderPromise, HeaderFuture) {
    let (tx, rx) = bounded(1);
    (
        HeaderPromise {
            tx,
            fulfilled: false,
        },
        HeaderFuture { rx },
    )
}
