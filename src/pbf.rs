//! Streaming decoder for the OSM PBF format.
//!
//! The outer framing (`BlobHeader`/`Blob` pairs) is read serially on the
//! parser thread. Every OSMData blob is a self-contained decode job that
//! can run on the worker pool; job futures are pushed to the output queue
//! in submission order, so the consumer sees entities in input order no
//! matter which worker finishes first.

use std::io::Read;

use byteorder::{BigEndian, ByteOrder};
use flate2::read::ZlibDecoder;
use protobuf::Message;
use tracing::{debug_span, trace};

use crate::buffer::Buffer;
use crate::entity::{
    Entity, EntityMask, Location, MemberType, Metadata, Node, RelMember, Relation, Way,
};
use crate::error::{new_error, new_protobuf_error, ErrorKind, Result};
use crate::factory::{CancelToken, FileFormat, Parser, ParserContext, ParserCore};
use crate::header::{timestamp_to_iso, BoundingBox, Header};
use crate::proto::{fileformat, osmformat};
use crate::queue::{buffer_promise, BufferFuture};
use crate::varint::DeltaDecoder;

/// The parser for PBF streams: a serial outer framer that fans blob
/// decode jobs out to the worker pool.
pub struct PbfParser {
    core: ParserCore,
    input: Vec<u8>,
    pos: usize,
    use_pool: bool,
    max_blob_header_size: u64,
    max_uncompressed_blob_size: u64,
}

impl PbfParser {
    pub fn new(context: ParserContext) -> PbfParser {
        let use_pool = context.config.use_pool_threads_for_pbf_parsing;
        let max_blob_header_size = context.config.max_blob_header_size;
        let max_uncompressed_blob_size = context.config.max_uncompressed_blob_size;
        PbfParser {
            core: ParserCore::new(context),
            input: Vec::new(),
            pos: 0,
            use_pool,
            max_blob_header_size,
            max_uncompressed_blob_size,
        }
    }

    pub(crate) fn boxed(context: ParserContext) -> Box<dyn Parser> {
        Box::new(PbfParser::new(context))
    }

    /// Makes sure at least `need` bytes are buffered, pulling chunks from
    /// the input queue as necessary. Returns false at end-of-stream.
    fn ensure_bytes_available(&mut self, need: usize) -> Result<bool> {
        if self.input.len() - self.pos >= need {
            return Ok(true);
        }
        if self.core.input_done() {
            return Ok(false);
        }

        self.input.drain(..self.pos);
        self.pos = 0;

        while self.input.len() < need {
            match self.core.get_input()? {
                Some(chunk) => self.input.extend_from_slice(&chunk),
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    fn read_bytes(&mut self, size: usize, location: &'static str) -> Result<Vec<u8>> {
        if !self.ensure_bytes_available(size)? {
            return Err(new_error(ErrorKind::Truncated { location }));
        }
        let bytes = self.input[self.pos..self.pos + size].to_vec();
        self.pos += size;
        Ok(bytes)
    }

    /// Reads the 4-byte network-order length of the next `BlobHeader`.
    /// `Ok(None)` is a clean end-of-stream before the next blob.
    fn read_blob_header_size(&mut self) -> Result<Option<u64>> {
        if !self.ensure_bytes_available(4)? {
            if self.input.len() - self.pos == 0 {
                return Ok(None);
            }
            return Err(new_error(ErrorKind::Truncated {
                location: "blob header size",
            }));
        }
        let size = BigEndian::read_u32(&self.input[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(Some(u64::from(size)))
    }

    /// Decodes the next `BlobHeader`, verifies its type and returns the
    /// size of the following `Blob`. `Ok(None)` is end-of-stream.
    fn check_type_and_get_blob_size(&mut self, expected_type: &str) -> Result<Option<usize>> {
        let Some(header_size) = self.read_blob_header_size()? else {
            return Ok(None);
        };

        if header_size > self.max_blob_header_size {
            return Err(new_error(ErrorKind::SizeLimitExceeded {
                what: "blob header",
                size: header_size,
                limit: self.max_blob_header_size,
            }));
        }

        let bytes = self.read_bytes(header_size as usize, "blob header")?;
        let blob_header = fileformat::BlobHeader::parse_from_bytes(&bytes)
            .map_err(|e| new_protobuf_error(e, "blob header"))?;

        let datasize = blob_header.datasize();
        if datasize <= 0 {
            return Err(new_error(ErrorKind::BlobHeaderMissingSize));
        }
        if blob_header.type_() != expected_type {
            return Err(new_error(ErrorKind::FormatMagic {
                format: FileFormat::Pbf,
                detail: "blob does not have expected type \
                         (OSMHeader in first blob, OSMData in following blobs)",
            }));
        }
        if datasize as u64 > self.max_uncompressed_blob_size {
            return Err(new_error(ErrorKind::SizeLimitExceeded {
                what: "blob message",
                size: datasize as u64,
                limit: self.max_uncompressed_blob_size,
            }));
        }

        Ok(Some(datasize as usize))
    }

    fn parse_header_blob(&mut self) -> Result<()> {
        let header = match self.check_type_and_get_blob_size("OSMHeader")? {
            // Completely empty input: a default header and a clean EOS.
            None => Header::new(),
            Some(size) => {
                let data = self.read_bytes(size, "header blob")?;
                let blob = fileformat::Blob::parse_from_bytes(&data)
                    .map_err(|e| new_protobuf_error(e, "header blob"))?;
                let payload = decompress_blob(&blob, self.max_uncompressed_blob_size)?;
                let block = osmformat::HeaderBlock::parse_from_bytes(&payload)
                    .map_err(|e| new_protobuf_error(e, "header block"))?;
                decode_header_block(&block)?
            }
        };
        self.core.set_header(&header);
        Ok(())
    }

    fn parse_data_blobs(&mut self) -> Result<()> {
        while let Some(size) = self.check_type_and_get_blob_size("OSMData")? {
            self.core.check_cancelled()?;
            let data = self.read_bytes(size, "data blob")?;
            trace!(size, "dispatching data blob");

            let job = PbfBlobDecoder {
                data,
                read_types: self.core.read_types,
                read_metadata: self.core.read_metadata,
                max_uncompressed_blob_size: self.max_uncompressed_blob_size,
            };

            let future = if self.use_pool {
                let (promise, future) = buffer_promise();
                rayon::spawn(move || promise.fulfill(job.decode()));
                future
            } else {
                BufferFuture::ready(job.decode())
            };
            self.core.send_to_output_queue(future)?;
        }
        Ok(())
    }

    fn parse(&mut self) -> Result<()> {
        self.parse_header_blob()?;
        if self.core.read_types.is_empty() {
            return Ok(());
        }
        self.parse_data_blobs()
    }
}

impl Parser for PbfParser {
    fn run(&mut self) {
        let _span = debug_span!("pbf_parser").entered();
        let result = self.parse();
        self.core.finish(result);
    }

    fn cancel_token(&self) -> CancelToken {
        self.core.cancel_token()
    }
}

/// A self-contained decode job for one OSMData blob. Pure function of its
/// payload bytes plus the read options, so it can run on any pool worker.
struct PbfBlobDecoder {
    data: Vec<u8>,
    read_types: EntityMask,
    read_metadata: bool,
    max_uncompressed_blob_size: u64,
}

impl PbfBlobDecoder {
    fn decode(self) -> Result<Buffer> {
        let blob = fileformat::Blob::parse_from_bytes(&self.data)
            .map_err(|e| new_protobuf_error(e, "blob"))?;
        let payload = decompress_blob(&blob, self.max_uncompressed_blob_size)?;
        let block = osmformat::PrimitiveBlock::parse_from_bytes(&payload)
            .map_err(|e| new_protobuf_error(e, "primitive block"))?;
        decode_primitive_block(&block, self.read_types, self.read_metadata)
    }
}

/// Extracts the inner payload of a blob, inflating it if necessary.
fn decompress_blob(blob: &fileformat::Blob, limit: u64) -> Result<Vec<u8>> {
    if blob.has_raw() {
        Ok(blob.raw().to_vec())
    } else if blob.has_zlib_data() {
        let declared = blob.raw_size() as u64;
        if declared > limit {
            return Err(new_error(ErrorKind::SizeLimitExceeded {
                what: "uncompressed blob",
                size: declared,
                limit,
            }));
        }
        let mut decoder = ZlibDecoder::new(blob.zlib_data());
        let mut payload = Vec::with_capacity(declared as usize);
        decoder.read_to_end(&mut payload)?;
        if payload.len() as u64 != declared {
            return Err(new_error(ErrorKind::UncompressedSizeMismatch {
                declared,
                actual: payload.len() as u64,
            }));
        }
        Ok(payload)
    } else if blob.has_lzma_data() {
        Err(new_error(ErrorKind::UnsupportedCompression { codec: "lzma" }))
    } else if blob.has_OBSOLETE_bzip2_data() {
        Err(new_error(ErrorKind::UnsupportedCompression { codec: "bzip2" }))
    } else if blob.has_lz4_data() {
        Err(new_error(ErrorKind::UnsupportedCompression { codec: "lz4" }))
    } else if blob.has_zstd_data() {
        Err(new_error(ErrorKind::UnsupportedCompression { codec: "zstd" }))
    } else {
        Err(new_error(ErrorKind::MalformedBlock {
            location: "blob is missing the raw and zlib_data fields",
        }))
    }
}

/// The features this reader can handle when listed as required.
fn decode_header_block(block: &osmformat::HeaderBlock) -> Result<Header> {
    let mut header = Header::new();

    for feature in &block.required_features {
        match feature.as_str() {
            "OsmSchema-V0.6" | "DenseNodes" => {}
            "HistoricalInformation" => header.has_multiple_object_versions = true,
            _ => {
                return Err(new_error(ErrorKind::UnsupportedFeature {
                    feature: feature.clone(),
                }))
            }
        }
    }

    header.optional_features = block.optional_features.clone();

    if let Some(bbox) = block.bbox.as_ref() {
        header.add_box(BoundingBox::new(
            Location::from_nano(bbox.left(), bbox.bottom()),
            Location::from_nano(bbox.right(), bbox.top()),
        ));
    }

    if block.has_writingprogram() {
        header.set("generator", block.writingprogram());
    }
    if block.has_source() {
        header.set("source", block.source());
    }
    if block.has_osmosis_replication_timestamp() {
        header.set(
            "osmosis_replication_timestamp",
            timestamp_to_iso(block.osmosis_replication_timestamp()),
        );
    }
    if block.has_osmosis_replication_sequence_number() {
        header.set(
            "osmosis_replication_sequence_number",
            block.osmosis_replication_sequence_number().to_string(),
        );
    }
    if block.has_osmosis_replication_base_url() {
        header.set(
            "osmosis_replication_base_url",
            block.osmosis_replication_base_url(),
        );
    }

    Ok(header)
}

fn str_from_stringtable(block: &osmformat::PrimitiveBlock, index: usize) -> Result<&str> {
    match block.stringtable.s.get(index) {
        Some(bytes) => std::str::from_utf8(bytes)
            .map_err(|err| new_error(ErrorKind::StringtableUtf8 { err, index })),
        None => Err(new_error(ErrorKind::StringtableIndexOutOfBounds { index })),
    }
}

fn nano_location(block: &osmformat::PrimitiveBlock, raw_lon: i64, raw_lat: i64) -> Location {
    let granularity = i64::from(block.granularity());
    Location::from_nano(
        block.lon_offset() + granularity * raw_lon,
        block.lat_offset() + granularity * raw_lat,
    )
}

fn timestamp_seconds(block: &osmformat::PrimitiveBlock, raw: i64) -> i64 {
    raw * i64::from(block.date_granularity()) / 1000
}

fn decode_tags_from_indices(
    block: &osmformat::PrimitiveBlock,
    keys: &[u32],
    vals: &[u32],
) -> Result<Vec<(String, String)>> {
    if keys.len() != vals.len() {
        return Err(new_error(ErrorKind::MalformedBlock {
            location: "keys and vals arrays differ in length",
        }));
    }
    keys.iter()
        .zip(vals.iter())
        .map(|(&k, &v)| {
            Ok((
                str_from_stringtable(block, k as usize)?.to_string(),
                str_from_stringtable(block, v as usize)?.to_string(),
            ))
        })
        .collect()
}

/// Decodes a sparse `Info` block into metadata plus the visible flag.
fn decode_entity_info(
    block: &osmformat::PrimitiveBlock,
    info: Option<&osmformat::Info>,
    read_metadata: bool,
) -> Result<(Metadata, bool)> {
    let Some(info) = info else {
        return Ok((Metadata::default(), true));
    };
    if !read_metadata {
        return Ok((Metadata::default(), true));
    }

    let user = if info.has_user_sid() {
        str_from_stringtable(block, info.user_sid() as usize)?.to_string()
    } else {
        String::new()
    };

    let metadata = Metadata {
        version: info.version().max(0) as u32,
        timestamp: timestamp_seconds(block, info.timestamp()),
        changeset: info.changeset() as u64,
        uid: info.uid() as u32,
        user,
    };
    // If the visible flag is not present it must be assumed to be true.
    Ok((metadata, info.visible.unwrap_or(true)))
}

fn decode_primitive_block(
    block: &osmformat::PrimitiveBlock,
    read_types: EntityMask,
    read_metadata: bool,
) -> Result<Buffer> {
    let mut buffer = Buffer::new();

    for group in &block.primitivegroup {
        if group.dense.is_some() {
            if read_types.contains(EntityMask::NODE) {
                decode_dense_nodes(block, &group.dense, read_metadata, &mut buffer)?;
            }
        } else if !group.nodes.is_empty() {
            if read_types.contains(EntityMask::NODE) {
                decode_nodes(block, &group.nodes, read_metadata, &mut buffer)?;
            }
        } else if !group.ways.is_empty() {
            if read_types.contains(EntityMask::WAY) {
                decode_ways(block, &group.ways, read_metadata, &mut buffer)?;
            }
        } else if !group.relations.is_empty() {
            if read_types.contains(EntityMask::RELATION) {
                decode_relations(block, &group.relations, read_metadata, &mut buffer)?;
            }
        }
        // Changeset groups and empty groups are ignored.
    }

    Ok(buffer)
}

fn decode_nodes(
    block: &osmformat::PrimitiveBlock,
    nodes: &[osmformat::Node],
    read_metadata: bool,
    buffer: &mut Buffer,
) -> Result<()> {
    for node in nodes {
        let (metadata, visible) = decode_entity_info(block, node.info.as_ref(), read_metadata)?;
        buffer.push(Entity::Node(Node {
            id: node.id(),
            metadata,
            visible,
            location: Some(nano_location(block, node.lon(), node.lat())),
            tags: decode_tags_from_indices(block, &node.keys, &node.vals)?,
        }));
    }
    Ok(())
}

fn decode_dense_nodes(
    block: &osmformat::PrimitiveBlock,
    dense: &osmformat::DenseNodes,
    read_metadata: bool,
    buffer: &mut Buffer,
) -> Result<()> {
    let count = dense.id.len();
    if dense.lat.len() != count || dense.lon.len() != count {
        return Err(new_error(ErrorKind::MalformedBlock {
            location: "dense node coordinate arrays differ in length",
        }));
    }

    let info = if read_metadata {
        dense.denseinfo.as_ref()
    } else {
        None
    };
    if let Some(info) = info {
        if info.version.len() != count
            || info.timestamp.len() != count
            || info.changeset.len() != count
            || info.uid.len() != count
            || info.user_sid.len() != count
        {
            return Err(new_error(ErrorKind::MalformedBlock {
                location: "DenseInfo arrays differ in length",
            }));
        }
        if !info.visible.is_empty() && info.visible.len() != count {
            return Err(new_error(ErrorKind::MalformedBlock {
                location: "DenseInfo visible array differs in length",
            }));
        }
    }

    // All delta accumulators are local to this group.
    let mut delta_id = DeltaDecoder::new();
    let mut delta_lat = DeltaDecoder::new();
    let mut delta_lon = DeltaDecoder::new();
    let mut delta_timestamp = DeltaDecoder::new();
    let mut delta_changeset = DeltaDecoder::new();
    let mut delta_uid = DeltaDecoder::new();
    let mut delta_user_sid = DeltaDecoder::new();

    let keys_vals = &dense.keys_vals;
    let mut kv_pos = 0usize;

    for i in 0..count {
        let id = delta_id.update(dense.id[i]);
        let lat = delta_lat.update(dense.lat[i]);
        let lon = delta_lon.update(dense.lon[i]);

        // An empty keys_vals array means no node in this group has tags;
        // otherwise every node's tags end with a single 0 index.
        let mut tags = Vec::new();
        if !keys_vals.is_empty() {
            loop {
                match keys_vals.get(kv_pos) {
                    None => {
                        return Err(new_error(ErrorKind::MalformedBlock {
                            location: "dense node tags are not terminated",
                        }))
                    }
                    Some(0) => {
                        kv_pos += 1;
                        break;
                    }
                    Some(&key) => {
                        let Some(&value) = keys_vals.get(kv_pos + 1) else {
                            return Err(new_error(ErrorKind::MalformedBlock {
                                location: "dense node tag key without value",
                            }));
                        };
                        tags.push((
                            str_from_stringtable(block, key as usize)?.to_string(),
                            str_from_stringtable(block, value as usize)?.to_string(),
                        ));
                        kv_pos += 2;
                    }
                }
            }
        }

        let (metadata, visible) = match info {
            Some(info) => {
                let timestamp = delta_timestamp.update(info.timestamp[i]);
                let changeset = delta_changeset.update(info.changeset[i]);
                let uid = delta_uid.update(i64::from(info.uid[i]));
                let user_sid = delta_user_sid.update(i64::from(info.user_sid[i]));
                let metadata = Metadata {
                    version: info.version[i].max(0) as u32,
                    timestamp: timestamp_seconds(block, timestamp),
                    changeset: changeset as u64,
                    uid: uid as u32,
                    user: str_from_stringtable(block, user_sid as usize)?.to_string(),
                };
                let visible = info.visible.get(i).copied().unwrap_or(true);
                (metadata, visible)
            }
            None => (Metadata::default(), true),
        };

        buffer.push(Entity::Node(Node {
            id,
            metadata,
            visible,
            location: Some(nano_location(block, lon, lat)),
            tags,
        }));
    }

    if kv_pos != keys_vals.len() {
        return Err(new_error(ErrorKind::MalformedBlock {
            location: "dense node tags exceed the number of nodes",
        }));
    }

    Ok(())
}

fn decode_ways(
    block: &osmformat::PrimitiveBlock,
    ways: &[osmformat::Way],
    read_metadata: bool,
    buffer: &mut Buffer,
) -> Result<()> {
    for way in ways {
        let (metadata, visible) = decode_entity_info(block, way.info.as_ref(), read_metadata)?;

        let mut delta_ref = DeltaDecoder::new();
        let refs = way.refs.iter().map(|&d| delta_ref.update(d)).collect();

        buffer.push(Entity::Way(Way {
            id: way.id(),
            metadata,
            visible,
            refs,
            tags: decode_tags_from_indices(block, &way.keys, &way.vals)?,
        }));
    }
    Ok(())
}

fn decode_relations(
    block: &osmformat::PrimitiveBlock,
    relations: &[osmformat::Relation],
    read_metadata: bool,
    buffer: &mut Buffer,
) -> Result<()> {
    use osmformat::relation::MemberType as PbfMemberType;

    for relation in relations {
        let (metadata, visible) =
            decode_entity_info(block, relation.info.as_ref(), read_metadata)?;

        if relation.memids.len() != relation.roles_sid.len()
            || relation.memids.len() != relation.types.len()
        {
            return Err(new_error(ErrorKind::MalformedBlock {
                location: "relation member arrays differ in length",
            }));
        }

        let mut delta_memid = DeltaDecoder::new();
        let mut members = Vec::with_capacity(relation.memids.len());
        for i in 0..relation.memids.len() {
            let member_type = match relation.types[i].enum_value() {
                Ok(PbfMemberType::NODE) => MemberType::Node,
                Ok(PbfMemberType::WAY) => MemberType::Way,
                Ok(PbfMemberType::RELATION) => MemberType::Relation,
                Err(value) => {
                    return Err(new_error(ErrorKind::UnknownMemberType {
                        byte: value as u8,
                    }))
                }
            };
            members.push(RelMember {
                member_type,
                member_id: delta_memid.update(relation.memids[i]),
                role: str_from_stringtable(block, relation.roles_sid[i] as usize)?.to_string(),
            });
        }

        buffer.push(Entity::Relation(Relation {
            id: relation.id(),
            metadata,
            visible,
            members,
            tags: decode_tags_from_indices(block, &relation.keys, &relation.vals)?,
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_with_strings(strings: &[&str]) -> osmformat::PrimitiveBlock {
        let mut block = osmformat::PrimitiveBlock::new();
        let mut table = osmformat::StringTable::new();
        for s in strings {
            table.s.push(s.as_bytes().to_vec());
        }
        block.stringtable = protobuf::MessageField::some(table);
        block
    }

    #[test]
    fn stringtable_lookup() {
        let block = block_with_strings(&["", "highway", "primary"]);
        assert_eq!(str_from_stringtable(&block, 1).unwrap(), "highway");
        assert!(matches!(
            str_from_stringtable(&block, 3).unwrap_err().into_kind(),
            ErrorKind::StringtableIndexOutOfBounds { index: 3 }
        ));
    }

    #[test]
    fn coordinate_conversion_uses_granularity_and_offset() {
        let mut block = block_with_strings(&[""]);
        block.set_granularity(1000);
        block.set_lat_offset(500);
        block.set_lon_offset(-500);

        let loc = nano_location(&block, 1_000_000, 2_000_000);
        // lon_nd = -500 + 1000 * 1_000_000, lat_nd = 500 + 1000 * 2_000_000
        assert_eq!(loc.decimicro_lon(), 9_999_995);
        assert_eq!(loc.decimicro_lat(), 20_000_005);
    }

    #[test]
    fn dense_nodes_group_local_deltas_and_tags() {
        let mut block = block_with_strings(&["", "amenity", "cafe"]);
        let mut dense = osmformat::DenseNodes::new();
        dense.id = vec![100, 1, 1];
        dense.lat = vec![50, 5, -10];
        dense.lon = vec![60, 0, 1];
        // First node tagged amenity=cafe, others untagged.
        dense.keys_vals = vec![1, 2, 0, 0, 0];

        let mut buffer = Buffer::new();
        decode_dense_nodes(&block, &dense, true, &mut buffer).unwrap();
        let entities: Vec<_> = buffer.into_iter().collect();
        assert_eq!(entities.len(), 3);

        let ids: Vec<i64> = entities.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![100, 101, 102]);

        match &entities[0] {
            Entity::Node(node) => {
                assert_eq!(node.tags().collect::<Vec<_>>(), vec![("amenity", "cafe")]);
                let loc = node.location().unwrap();
                assert_eq!(loc.decimicro_lon(), 60);
                assert_eq!(loc.decimicro_lat(), 50);
            }
            other => panic!("expected node, got {other:?}"),
        }
        match &entities[2] {
            Entity::Node(node) => {
                assert_eq!(node.tags().count(), 0);
                let loc = node.location().unwrap();
                assert_eq!(loc.decimicro_lon(), 61);
                assert_eq!(loc.decimicro_lat(), 45);
            }
            other => panic!("expected node, got {other:?}"),
        }

        // A second group starts its accumulators from zero again.
        let mut buffer = Buffer::new();
        decode_dense_nodes(&block, &dense, true, &mut buffer).unwrap();
        assert_eq!(buffer.iter().next().unwrap().id(), 100);
    }

    #[test]
    fn dense_nodes_terminator_count_must_match() {
        let block = block_with_strings(&["", "k", "v"]);
        let mut dense = osmformat::DenseNodes::new();
        dense.id = vec![1, 1];
        dense.lat = vec![0, 0];
        dense.lon = vec![0, 0];
        // Only one terminator for two nodes.
        dense.keys_vals = vec![1, 2, 0];

        let mut buffer = Buffer::new();
        let err = decode_dense_nodes(&block, &dense, true, &mut buffer).unwrap_err();
        assert!(matches!(
            err.into_kind(),
            ErrorKind::MalformedBlock { .. }
        ));

        // Trailing terminators beyond the node count are also rejected.
        let mut dense_extra = osmformat::DenseNodes::new();
        dense_extra.id = vec![1];
        dense_extra.lat = vec![0];
        dense_extra.lon = vec![0];
        dense_extra.keys_vals = vec![0, 0];
        let mut buffer = Buffer::new();
        assert!(decode_dense_nodes(&block, &dense_extra, true, &mut buffer).is_err());
    }

    #[test]
    fn way_refs_are_delta_decoded() {
        let block = block_with_strings(&[""]);
        let mut way = osmformat::Way::new();
        way.set_id(42);
        way.refs = vec![100, 1, 1, -50];

        let mut buffer = Buffer::new();
        decode_ways(&block, &[way], true, &mut buffer).unwrap();
        match buffer.iter().next().unwrap() {
            Entity::Way(way) => {
                assert_eq!(way.id(), 42);
                assert_eq!(way.refs(), &[100, 101, 102, 52]);
                assert!(way.visible());
            }
            other => panic!("expected way, got {other:?}"),
        }
    }

    #[test]
    fn relation_members_delta_and_roles() {
        use osmformat::relation::MemberType as PbfMemberType;

        let block = block_with_strings(&["", "outer", "inner"]);
        let mut relation = osmformat::Relation::new();
        relation.set_id(7);
        relation.roles_sid = vec![1, 2];
        relation.memids = vec![10, -3];
        relation.types = vec![
            protobuf::EnumOrUnknown::new(PbfMemberType::WAY),
            protobuf::EnumOrUnknown::new(PbfMemberType::NODE),
        ];

        let mut buffer = Buffer::new();
        decode_relations(&block, &[relation], true, &mut buffer).unwrap();
        match buffer.iter().next().unwrap() {
            Entity::Relation(relation) => {
                let members = relation.members();
                assert_eq!(members.len(), 2);
                assert_eq!(members[0].member_type(), MemberType::Way);
                assert_eq!(members[0].member_id(), 10);
                assert_eq!(members[0].role(), "outer");
                assert_eq!(members[1].member_type(), MemberType::Node);
                assert_eq!(members[1].member_id(), 7);
                assert_eq!(members[1].role(), "inner");
            }
            other => panic!("expected relation, got {other:?}"),
        }
    }

    #[test]
    fn read_metadata_false_yields_default_info() {
        let mut block = block_with_strings(&["", "user"]);
        block.set_date_granularity(1000);

        let mut info = osmformat::Info::new();
        info.set_version(3);
        info.set_timestamp(1_000_000);
        info.set_changeset(77);
        info.set_uid(42);
        info.set_user_sid(1);

        let (metadata, visible) = decode_entity_info(&block, Some(&info), false).unwrap();
        assert_eq!(metadata, Metadata::default());
        assert!(visible);

        let (metadata, _) = decode_entity_info(&block, Some(&info), true).unwrap();
        assert_eq!(metadata.version(), 3);
        assert_eq!(metadata.timestamp(), 1_000_000);
        assert_eq!(metadata.changeset(), 77);
        assert_eq!(metadata.uid(), 42);
        assert_eq!(metadata.user(), "user");
    }

    #[test]
    fn unsupported_required_feature_is_rejected() {
        let mut block = osmformat::HeaderBlock::new();
        block.required_features.push("OsmSchema-V0.6".to_string());
        block.required_features.push("MadeUpFeature".to_string());

        let err = decode_header_block(&block).unwrap_err();
        match err.into_kind() {
            ErrorKind::UnsupportedFeature { feature } => assert_eq!(feature, "MadeUpFeature"),
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn historical_information_sets_multiple_versions() {
        let mut block = osmformat::HeaderBlock::new();
        block
            .required_features
            .push("HistoricalInformation".to_string());
        let header = decode_header_block(&block).unwrap();
        assert!(header.has_multiple_object_versions());
    }
}
