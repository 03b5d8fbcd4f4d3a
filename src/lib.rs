/*!
A streaming reader for the OpenStreetMap o5m/o5c and PBF binary formats.

The crate is built around a three-stage pipeline per input stream: an
external producer pushes raw byte chunks into a bounded input queue, a
format-specific [`Parser`] decodes them on its own thread, and the consumer
drains decoded entity [`Buffer`]s from a bounded output queue. Stream-level
metadata arrives separately through a single-shot [`HeaderFuture`], always
before the first buffer.

For PBF input the parser additionally fans blob decoding out to a worker
pool while keeping the output in input order; o5m decoding is inherently
serial because of its delta coding and string reference table.

## Example: count tagged nodes in an o5m stream

```
use std::thread;

use osmstream::{
    buffer_queue, chunk_queue, header_promise, Entity, FileFormat, ParserConfig, ParserFactory,
};

// A minimal o5m stream: the prologue followed by a reset dataset.
let data = vec![0xff, 0xe0, 0x04, b'o', b'5', b'm', b'2', 0xff];

let factory = ParserFactory::with_builtin_formats();
let (chunk_tx, chunk_rx) = chunk_queue();
let (buffer_tx, buffer_rx) = buffer_queue();
let (promise, header_future) = header_promise();

let mut parser = factory
    .open_parser(FileFormat::O5m, chunk_rx, buffer_tx, promise, ParserConfig::default())
    .unwrap();

chunk_tx.send(Ok(data)).unwrap();
drop(chunk_tx); // end-of-stream

let worker = thread::spawn(move || parser.run());

let header = header_future.get().unwrap();
assert!(!header.has_multiple_object_versions());

let mut tagged_nodes = 0;
for future in buffer_rx {
    for entity in future.get().unwrap() {
        if let Entity::Node(node) = entity {
            if node.tags().count() > 0 {
                tagged_nodes += 1;
            }
        }
    }
}
assert_eq!(tagged_nodes, 0);

worker.join().unwrap();
```
*/

pub use crate::buffer::Buffer;
pub use crate::entity::{
    Entity, EntityMask, Location, MemberType, Metadata, Node, RelMember, Relation, Way,
};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::factory::{
    CancelToken, FileFormat, Parser, ParserConfig, ParserConstructor, ParserContext, ParserFactory,
};
pub use crate::header::{BoundingBox, Header};
pub use crate::o5m::O5mParser;
pub use crate::pbf::PbfParser;
pub use crate::queue::{
    buffer_queue, chunk_queue, header_promise, BufferFuture, BufferQueueReceiver,
    BufferQueueSender, ChunkReceiver, ChunkSender, HeaderFuture, HeaderPromise,
};

pub mod buffer;
pub mod entity;
mod error;
pub mod factory;
pub mod header;
pub mod o5m;
pub mod pbf;
pub mod queue;
pub mod varint;

// Generated protobuf messages for the PBF format. Public so test code can
// encode streams with them, but not part of the stable API.
#[doc(hidden)]
pub mod proto {
    include!(concat!(env!("OUT_DIR"), "/proto/mod.rs"));
}
