//! Streaming decoder for the o5m/o5c format.
//!
//! Implemented according to the format description at
//! <https://wiki.openstreetmap.org/wiki/O5m>. The format is a sequence of
//! length-prefixed datasets whose integers are delta-coded against running
//! accumulators and whose strings go through a ring-buffered reference
//! table, so decoding is strictly serial.

use tracing::{debug, debug_span, trace};

use crate::buffer::Buffer;
use crate::entity::{
    Entity, EntityMask, Location, MemberType, Metadata, Node, RelMember, Relation, Way,
};
use crate::error::{new_error, ErrorKind, Result};
use crate::factory::{CancelToken, FileFormat, Parser, ParserContext, ParserCore};
use crate::header::{timestamp_to_iso, BoundingBox, Header};
use crate::queue::BufferFuture;
use crate::varint::{decode_svarint, decode_uvarint, DeltaDecoder, MAX_VARINT_LEN};

// Dataset type codes.
const DS_NODE: u8 = 0x10;
const DS_WAY: u8 = 0x11;
const DS_RELATION: u8 = 0x12;
const DS_BOUNDING_BOX: u8 = 0xdb;
const DS_TIMESTAMP: u8 = 0xdc;
const DS_JUMP: u8 = 0xef;
const DS_RESET: u8 = 0xff;

/// The maximum number of entries in the reference table.
const TABLE_ENTRIES: usize = 15_000;

/// The maximum length of a stored string including two NUL bytes.
const MAX_ENTRY_LEN: usize = 250 + 2;

/// The ring buffer of recently seen strings.
///
/// Entries are referenced by a 1-based index counted backwards from the
/// most recent insertion. A `clear` invalidates every index until new
/// strings have been added; storage is only allocated on the first `add`
/// because the parser owning this table may be moved across threads
/// before it runs.
struct ReferenceTable {
    entries: Vec<Vec<u8>>,
    cursor: usize,
    live: usize,
}

impl ReferenceTable {
    fn new() -> ReferenceTable {
        ReferenceTable {
            entries: Vec::new(),
            cursor: 0,
            live: 0,
        }
    }

    fn clear(&mut self) {
        self.cursor = 0;
        self.live = 0;
    }

    fn add(&mut self, string: &[u8]) {
        if string.len() > MAX_ENTRY_LEN {
            // Overlong strings are used but never stored.
            return;
        }
        if self.entries.is_empty() {
            self.entries = vec![Vec::new(); TABLE_ENTRIES];
        }
        self.entries[self.cursor].clear();
        self.entries[self.cursor].extend_from_slice(string);
        self.cursor = (self.cursor + 1) % TABLE_ENTRIES;
        if self.live < TABLE_ENTRIES {
            self.live += 1;
        }
    }

    fn get(&self, index: u64) -> Result<&[u8]> {
        if index == 0 || index > self.live as u64 {
            return Err(new_error(ErrorKind::BadStringSlot { index }));
        }
        let entry = (self.cursor + TABLE_ENTRIES - index as usize) % TABLE_ENTRIES;
        Ok(&self.entries[entry])
    }
}

fn read_cstr(data: &mut &[u8], location: &'static str) -> Result<String> {
    match data.iter().position(|&byte| byte == 0) {
        Some(pos) => {
            let string = std::str::from_utf8(&data[..pos])
                .map_err(|err| new_error(ErrorKind::Utf8 { err, location }))?
                .to_string();
            *data = &data[pos + 1..];
            Ok(string)
        }
        None => Err(new_error(ErrorKind::MissingNul { location })),
    }
}

fn member_type_from_byte(byte: u8) -> Result<MemberType> {
    match byte {
        b'0' => Ok(MemberType::Node),
        b'1' => Ok(MemberType::Way),
        b'2' => Ok(MemberType::Relation),
        _ => Err(new_error(ErrorKind::UnknownMemberType { byte })),
    }
}

/// Delta and string-table state plus the per-dataset decode functions.
///
/// Kept separate from the I/O side of [`O5mParser`] so dataset payloads
/// borrowed from the input buffer can be decoded while this state is
/// mutated.
struct O5mDecoder {
    reference_table: ReferenceTable,
    delta_id: DeltaDecoder,
    delta_timestamp: DeltaDecoder,
    delta_changeset: DeltaDecoder,
    delta_lon: DeltaDecoder,
    delta_lat: DeltaDecoder,
    delta_way_node_id: DeltaDecoder,
    delta_member_ids: [DeltaDecoder; 3],
    read_metadata: bool,
}

impl O5mDecoder {
    fn new(read_metadata: bool) -> O5mDecoder {
        O5mDecoder {
            reference_table: ReferenceTable::new(),
            delta_id: DeltaDecoder::new(),
            delta_timestamp: DeltaDecoder::new(),
            delta_changeset: DeltaDecoder::new(),
            delta_lon: DeltaDecoder::new(),
            delta_lat: DeltaDecoder::new(),
            delta_way_node_id: DeltaDecoder::new(),
            delta_member_ids: [DeltaDecoder::new(); 3],
            read_metadata,
        }
    }

    fn reset(&mut self) {
        self.reference_table.clear();

        self.delta_id.clear();
        self.delta_timestamp.clear();
        self.delta_changeset.clear();
        self.delta_lon.clear();
        self.delta_lat.clear();

        self.delta_way_node_id.clear();
        self.delta_member_ids[0].clear();
        self.delta_member_ids[1].clear();
        self.delta_member_ids[2].clear();
    }

    /// Decodes a uid + user name string pair, updating the reference table
    /// for inline slots. The anonymous user (uid 0) is stored as the
    /// two-NUL literal and decodes to an empty name.
    fn decode_user(&mut self, data: &mut &[u8]) -> Result<(u32, String)> {
        if data.first() == Some(&0x00) {
            *data = &data[1..];
            if data.is_empty() {
                return Err(new_error(ErrorKind::Truncated {
                    location: "user string slot",
                }));
            }
            let start = *data;
            let uid = decode_uvarint(data)?;
            if data.is_empty() {
                return Err(new_error(ErrorKind::Truncated {
                    location: "user name",
                }));
            }
            // Skip the NUL separating the uid from the name.
            *data = &data[1..];

            if uid == 0 {
                self.reference_table.add(b"\0\0");
                return Ok((0, String::new()));
            }

            let user = read_cstr(data, "user name")?;
            let consumed = start.len() - data.len();
            self.reference_table.add(&start[..consumed]);
            Ok((uid as u32, user))
        } else {
            let index = decode_uvarint(data)?;
            let mut slot = self.reference_table.get(index)?;
            let uid = decode_uvarint(&mut slot)?;
            if !slot.is_empty() {
                slot = &slot[1..];
            }
            let user = if slot.is_empty() {
                String::new()
            } else {
                read_cstr(&mut slot, "user name")?
            };
            Ok((uid as u32, user))
        }
    }

    /// Decodes the metadata section of an entity. The changeset and user
    /// follow only when the updated timestamp accumulator is nonzero.
    fn decode_info(&mut self, data: &mut &[u8]) -> Result<Metadata> {
        let mut metadata = Metadata::default();

        match data.first() {
            None => {
                return Err(new_error(ErrorKind::Truncated {
                    location: "info section",
                }))
            }
            Some(&0x00) => {
                // No info section.
                *data = &data[1..];
                return Ok(metadata);
            }
            Some(_) => {}
        }

        metadata.version = decode_uvarint(data)? as u32;
        let timestamp = self.delta_timestamp.update(decode_svarint(data)?);
        if timestamp != 0 {
            metadata.timestamp = timestamp;
            metadata.changeset = self.delta_changeset.update(decode_svarint(data)?) as u64;
            if !data.is_empty() {
                let (uid, user) = self.decode_user(data)?;
                metadata.uid = uid;
                metadata.user = user;
            }
        }

        if self.read_metadata {
            Ok(metadata)
        } else {
            Ok(Metadata::default())
        }
    }

    /// Decodes one tag string pair (inline or referenced).
    fn decode_tag(&mut self, data: &mut &[u8]) -> Result<(String, String)> {
        if data.first() == Some(&0x00) {
            *data = &data[1..];
            if data.is_empty() {
                return Err(new_error(ErrorKind::Truncated {
                    location: "tag string slot",
                }));
            }
            let start = *data;
            let key = read_cstr(data, "tag key")?;
            let value = read_cstr(data, "tag value")?;
            let consumed = start.len() - data.len();
            self.reference_table.add(&start[..consumed]);
            Ok((key, value))
        } else {
            let index = decode_uvarint(data)?;
            let mut slot = self.reference_table.get(index)?;
            let key = read_cstr(&mut slot, "tag key")?;
            let value = read_cstr(&mut slot, "tag value")?;
            Ok((key, value))
        }
    }

    fn decode_tags(&mut self, data: &mut &[u8]) -> Result<Vec<(String, String)>> {
        let mut tags = Vec::new();
        while !data.is_empty() {
            tags.push(self.decode_tag(data)?);
        }
        Ok(tags)
    }

    fn decode_node(&mut self, mut payload: &[u8]) -> Result<Node> {
        let data = &mut payload;

        let id = self.delta_id.update(decode_svarint(data)?);
        let metadata = self.decode_info(data)?;

        if data.is_empty() {
            // No location, the record encodes a deletion.
            return Ok(Node {
                id,
                metadata,
                visible: false,
                location: None,
                tags: Vec::new(),
            });
        }

        let lon = self.delta_lon.update(decode_svarint(data)?);
        let lat = self.delta_lat.update(decode_svarint(data)?);
        let location = Location::new(lon as i32, lat as i32);
        let tags = self.decode_tags(data)?;

        Ok(Node {
            id,
            metadata,
            visible: true,
            location: Some(location),
            tags,
        })
    }

    fn decode_way(&mut self, mut payload: &[u8]) -> Result<Way> {
        let data = &mut payload;

        let id = self.delta_id.update(decode_svarint(data)?);
        let metadata = self.decode_info(data)?;

        if data.is_empty() {
            // No reference section, the record encodes a deletion.
            return Ok(Way {
                id,
                metadata,
                visible: false,
                refs: Vec::new(),
                tags: Vec::new(),
            });
        }

        let refs_len = decode_uvarint(data)? as usize;
        let mut refs = Vec::new();
        if refs_len > 0 {
            if refs_len > data.len() {
                return Err(new_error(ErrorKind::Truncated {
                    location: "way node refs",
                }));
            }
            let (mut refs_data, rest) = data.split_at(refs_len);
            while !refs_data.is_empty() {
                refs.push(
                    self.delta_way_node_id
                        .update(decode_svarint(&mut refs_data)?),
                );
            }
            *data = rest;
        }

        let tags = self.decode_tags(data)?;

        Ok(Way {
            id,
            metadata,
            visible: true,
            refs,
            tags,
        })
    }

    /// Decodes one relation member: an id delta applied to the per-type
    /// accumulator plus a string slot holding the type byte and role.
    fn decode_member(&mut self, data: &mut &[u8]) -> Result<RelMember> {
        let delta = decode_svarint(data)?;
        if data.is_empty() {
            return Err(new_error(ErrorKind::Truncated {
                location: "relation member",
            }));
        }

        let (member_type, role) = if data.first() == Some(&0x00) {
            *data = &data[1..];
            if data.is_empty() {
                return Err(new_error(ErrorKind::Truncated {
                    location: "member string slot",
                }));
            }
            let start = *data;
            let member_type = member_type_from_byte(data[0])?;
            *data = &data[1..];
            if data.is_empty() {
                return Err(new_error(ErrorKind::Truncated { location: "role" }));
            }
            let role = read_cstr(data, "role")?;
            let consumed = start.len() - data.len();
            self.reference_table.add(&start[..consumed]);
            (member_type, role)
        } else {
            let index = decode_uvarint(data)?;
            let mut slot = self.reference_table.get(index)?;
            if slot.is_empty() {
                return Err(new_error(ErrorKind::MissingNul { location: "role" }));
            }
            let member_type = member_type_from_byte(slot[0])?;
            slot = &slot[1..];
            let role = if slot.is_empty() {
                String::new()
            } else {
                read_cstr(&mut slot, "role")?
            };
            (member_type, role)
        };

        let member_id = self.delta_member_ids[member_type.index()].update(delta);
        Ok(RelMember {
            member_type,
            member_id,
            role,
        })
    }

    fn decode_relation(&mut self, mut payload: &[u8]) -> Result<Relation> {
        let data = &mut payload;

        let id = self.delta_id.update(decode_svarint(data)?);
        let metadata = self.decode_info(data)?;

        if data.is_empty() {
            // No member section, the record encodes a deletion.
            return Ok(Relation {
                id,
                metadata,
                visible: false,
                members: Vec::new(),
                tags: Vec::new(),
            });
        }

        let members_len = decode_uvarint(data)? as usize;
        let mut members = Vec::new();
        if members_len > 0 {
            if members_len > data.len() {
                return Err(new_error(ErrorKind::Truncated {
                    location: "relation members",
                }));
            }
            let (mut members_data, rest) = data.split_at(members_len);
            while !members_data.is_empty() {
                members.push(self.decode_member(&mut members_data)?);
            }
            *data = rest;
        }

        let tags = self.decode_tags(data)?;

        Ok(Relation {
            id,
            metadata,
            visible: true,
            members,
            tags,
        })
    }
}

/// The serial parser for o5m/o5c streams.
pub struct O5mParser {
    core: ParserCore,
    header: Header,
    buffer: Buffer,
    decoder: O5mDecoder,
    input: Vec<u8>,
    pos: usize,
}

impl O5mParser {
    pub fn new(context: ParserContext) -> O5mParser {
        let read_metadata = context.config.read_metadata;
        O5mParser {
            core: ParserCore::new(context),
            header: Header::new(),
            buffer: Buffer::new(),
            decoder: O5mDecoder::new(read_metadata),
            input: Vec::new(),
            pos: 0,
        }
    }

    pub(crate) fn boxed(context: ParserContext) -> Box<dyn Parser> {
        Box::new(O5mParser::new(context))
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

    fn decode_header(&mut self) -> Result<()> {
        const HEADER_MAGIC: [u8; 5] = [0xff, 0xe0, 0x04, b'o', b'5'];

        if !self.ensure_bytes_available(7)? {
            return Err(new_error(ErrorKind::Truncated {
                location: "o5m prologue",
            }));
        }

        let wrong_magic = new_error(ErrorKind::FormatMagic {
            format: FileFormat::O5m,
            detail: "wrong header magic",
        });

        let prologue = &self.input[self.pos..self.pos + 7];
        if prologue[..5] != HEADER_MAGIC {
            return Err(wrong_magic);
        }
        match prologue[5] {
            b'm' => self.header.has_multiple_object_versions = false,
            b'c' => self.header.has_multiple_object_versions = true,
            _ => return Err(wrong_magic),
        }
        if prologue[6] != b'2' {
            return Err(wrong_magic);
        }

        self.pos += 7;
        Ok(())
    }

    fn mark_header_as_done(&mut self) {
        self.core.set_header(&self.header);
    }

    fn decode_bbox(header: &mut Header, mut payload: &[u8]) -> Result<()> {
        let data = &mut payload;
        let sw_lon = decode_svarint(data)?;
        let sw_lat = decode_svarint(data)?;
        let ne_lon = decode_svarint(data)?;
        let ne_lat = decode_svarint(data)?;

        header.add_box(BoundingBox::new(
            Location::new(sw_lon as i32, sw_lat as i32),
            Location::new(ne_lon as i32, ne_lat as i32),
        ));
        Ok(())
    }

    fn decode_timestamp(header: &mut Header, mut payload: &[u8]) -> Result<()> {
        let timestamp = timestamp_to_iso(decode_svarint(&mut payload)?);
        header.set("o5m_timestamp", timestamp.clone());
        header.set("timestamp", timestamp);
        Ok(())
    }

    /// Decodes the dataset length that follows every type byte ≤ 0xef.
    fn decode_dataset_length(&mut self) -> Result<usize> {
        // The varint may be complete even when fewer than its maximum
        // length is left in the stream.
        self.ensure_bytes_available(MAX_VARINT_LEN)?;

        let available = self.input.len() - self.pos;
        let mut cursor = &self.input[self.pos..];
        match decode_uvarint(&mut cursor) {
            Ok(length) => {
                self.pos += available - cursor.len();
                Ok(length as usize)
            }
            Err(err) => {
                if available >= MAX_VARINT_LEN {
                    Err(err)
                } else {
                    Err(new_error(ErrorKind::Truncated {
                        location: "dataset length",
                    }))
                }
            }
        }
    }

    fn decode_data(&mut self) -> Result<()> {
        loop {
            self.core.check_cancelled()?;
            if !self.ensure_bytes_available(1)? {
                break;
            }

            let ds_type = self.input[self.pos];
            self.pos += 1;

            if ds_type > DS_JUMP {
                if ds_type == DS_RESET {
                    trace!("reset dataset");
                    self.decoder.reset();
                }
                continue;
            }

            let length = self.decode_dataset_length()?;
            if !self.ensure_bytes_available(length)? {
                return Err(new_error(ErrorKind::Truncated { location: "dataset" }));
            }

            match ds_type {
                DS_NODE | DS_WAY | DS_RELATION => {
                    self.mark_header_as_done();
                    let wanted = match ds_type {
                        DS_NODE => EntityMask::NODE,
                        DS_WAY => EntityMask::WAY,
                        _ => EntityMask::RELATION,
                    };
                    if self.core.read_types.contains(wanted) {
                        let payload = &self.input[self.pos..self.pos + length];
                        let entity = match ds_type {
                            DS_NODE => Entity::Node(self.decoder.decode_node(payload)?),
                            DS_WAY => Entity::Way(self.decoder.decode_way(payload)?),
                            _ => Entity::Relation(self.decoder.decode_relation(payload)?),
                        };
                        self.buffer.push(entity);
                    }
                }
                DS_BOUNDING_BOX => {
                    let payload = &self.input[self.pos..self.pos + length];
                    Self::decode_bbox(&mut self.header, payload)?;
                }
                DS_TIMESTAMP => {
                    let payload = &self.input[self.pos..self.pos + length];
                    Self::decode_timestamp(&mut self.header, payload)?;
                }
                _ => {
                    // Ignore unknown datasets.
                    trace!(ds_type, length, "skipping unknown dataset");
                }
            }

            self.pos += length;

            if self.core.read_types.is_empty() && self.core.header_is_done() {
                break;
            }

            if self.buffer.is_nearly_full() {
                self.flush()?;
            }
        }

        if !self.buffer.is_empty() {
            self.flush()?;
        }
        self.mark_header_as_done();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let full = self.buffer.take();
        debug!(entities = full.len(), "flushing buffer");
        self.core.send_to_output_queue(BufferFuture::ready(Ok(full)))
    }

    fn parse(&mut self) -> Result<()> {
        self.decode_header()?;
        self.decode_data()
    }
}

impl Parser for O5mParser {
    fn run(&mut self) {
        let _span = debug_span!("o5m_parser").entered();
        let result = self.parse();
        self.core.finish(result);
    }

    fn cancel_token(&self) -> CancelToken {
        self.core.cancel_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_table_indexes_backwards() {
        let mut table = ReferenceTable::new();
        table.add(b"first\0x\0");
        table.add(b"second\0y\0");
        assert_eq!(table.get(1).unwrap(), b"second\0y\0");
        assert_eq!(table.get(2).unwrap(), b"first\0x\0");
    }

    #[test]
    fn reference_table_rejects_invalid_indices() {
        let mut table = ReferenceTable::new();
        assert!(table.get(1).is_err());
        table.add(b"a\0b\0");
        assert!(table.get(0).is_err());
        assert!(table.get(2).is_err());
        assert!(matches!(
            table.get(TABLE_ENTRIES as u64 + 1).unwrap_err().into_kind(),
            ErrorKind::BadStringSlot { .. }
        ));
    }

    #[test]
    fn reference_table_clear_invalidates_entries() {
        let mut table = ReferenceTable::new();
        table.add(b"a\0b\0");
        assert!(table.get(1).is_ok());

        table.clear();
        assert!(table.get(1).is_err());

        table.add(b"c\0d\0");
        assert_eq!(table.get(1).unwrap(), b"c\0d\0");
        assert!(table.get(2).is_err());
    }

    #[test]
    fn reference_table_wraps_around() {
        let mut table = ReferenceTable::new();
        for i in 0..TABLE_ENTRIES + 10 {
            table.add(format!("entry-{i}\0v\0").as_bytes());
        }
        // Index 1 is the most recent entry, index N the oldest live one.
        let newest = format!("entry-{}\0v\0", TABLE_ENTRIES + 9);
        let oldest = format!("entry-{}\0v\0", 10);
        assert_eq!(table.get(1).unwrap(), newest.as_bytes());
        assert_eq!(table.get(TABLE_ENTRIES as u64).unwrap(), oldest.as_bytes());
        assert!(table.get(TABLE_ENTRIES as u64 + 1).is_err());
    }

    #[test]
    fn reference_table_entry_size_limit() {
        let mut table = ReferenceTable::new();

        let mut exact = vec![b'k'; MAX_ENTRY_LEN - 2];
        exact.extend_from_slice(b"\0\0");
        assert_eq!(exact.len(), 252);
        table.add(&exact);
        assert_eq!(table.get(1).unwrap(), exact.as_slice());

        let mut too_long = vec![b'k'; MAX_ENTRY_LEN - 1];
        too_long.extend_from_slice(b"\0\0");
        assert_eq!(too_long.len(), 253);
        table.add(&too_long);
        // The overlong string was not stored, index 1 is unchanged.
        assert_eq!(table.get(1).unwrap(), exact.as_slice());
    }

    fn svarint_bytes(value: i64) -> Vec<u8> {
        let mut raw = ((value << 1) ^ (value >> 63)) as u64;
        let mut bytes = Vec::new();
        loop {
            let byte = (raw & 0x7f) as u8;
            raw >>= 7;
            if raw == 0 {
                bytes.push(byte);
                break;
            }
            bytes.push(byte | 0x80);
        }
        bytes
    }

    #[test]
    fn decode_tag_inline_and_reference() {
        let mut decoder = O5mDecoder::new(true);

        let mut inline = vec![0x00];
        inline.extend_from_slice(b"highway\0primary\0");
        let mut cursor = inline.as_slice();
        let tag = decoder.decode_tag(&mut cursor).unwrap();
        assert_eq!(tag, ("highway".to_string(), "primary".to_string()));
        assert!(cursor.is_empty());

        let reference = [0x01];
        let mut cursor = reference.as_slice();
        let tag = decoder.decode_tag(&mut cursor).unwrap();
        assert_eq!(tag, ("highway".to_string(), "primary".to_string()));
    }

    #[test]
    fn decode_member_updates_per_type_accumulators() {
        let mut decoder = O5mDecoder::new(true);

        let mut first = svarint_bytes(7);
        first.push(0x00);
        first.extend_from_slice(b"1outer\0");
        let mut cursor = first.as_slice();
        let member = decoder.decode_member(&mut cursor).unwrap();
        assert_eq!(member.member_type(), MemberType::Way);
        assert_eq!(member.member_id(), 7);
        assert_eq!(member.role(), "outer");

        // A node member has its own accumulator.
        let mut second = svarint_bytes(3);
        second.push(0x00);
        second.extend_from_slice(b"0stop\0");
        let mut cursor = second.as_slice();
        let member = decoder.decode_member(&mut cursor).unwrap();
        assert_eq!(member.member_type(), MemberType::Node);
        assert_eq!(member.member_id(), 3);

        // A second node member referencing the stored "0stop" slot
        // continues from the node accumulator, not the way one.
        let mut third = svarint_bytes(-2);
        third.push(0x01);
        let mut cursor = third.as_slice();
        let member = decoder.decode_member(&mut cursor).unwrap();
        assert_eq!(member.member_type(), MemberType::Node);
        assert_eq!(member.member_id(), 1);
        assert_eq!(member.role(), "stop");
    }

    #[test]
    fn decode_member_rejects_unknown_type() {
        let mut decoder = O5mDecoder::new(true);
        let mut data = svarint_bytes(1);
        data.push(0x00);
        data.extend_from_slice(b"3role\0");
        let mut cursor = data.as_slice();
        assert!(matches!(
            decoder.decode_member(&mut cursor).unwrap_err().into_kind(),
            ErrorKind::UnknownMemberType { byte: b'3' }
        ));
    }

    #[test]
    fn decode_user_anonymous() {
        let mut decoder = O5mDecoder::new(true);

        // uid 0: the stored slot is exactly two NUL bytes.
        let data = [0x00, 0x00, 0x00];
        let mut cursor = &data[..];
        let (uid, user) = decoder.decode_user(&mut cursor).unwrap();
        assert_eq!(uid, 0);
        assert_eq!(user, "");
        assert_eq!(decoder.reference_table.get(1).unwrap(), b"\0\0");

        // Referencing the anonymous slot decodes the same way.
        let reference = [0x01];
        let mut cursor = &reference[..];
        let (uid, user) = decoder.decode_user(&mut cursor).unwrap();
        assert_eq!(uid, 0);
        assert_eq!(user, "");
    }

    #[test]
    fn decode_info_zero_timestamp_skips_changeset() {
        let mut decoder = O5mDecoder::new(true);

        // version 2, timestamp delta 0: no changeset or user follows.
        let data = [0x02, 0x00];
        let mut cursor = &data[..];
        let metadata = decoder.decode_info(&mut cursor).unwrap();
        assert_eq!(metadata.version(), 2);
        assert_eq!(metadata.timestamp(), 0);
        assert_eq!(metadata.changeset(), 0);
        assert!(cursor.is_empty());
    }

    #[test]
    fn decode_info_timestamp_accumulator_is_the_predicate() {
        let mut decoder = O5mDecoder::new(true);

        // First entity: timestamp delta 100, changeset delta 5, no user.
        let mut data = vec![0x01];
        data.extend_from_slice(&svarint_bytes(100));
        data.extend_from_slice(&svarint_bytes(5));
        let mut cursor = data.as_slice();
        let metadata = decoder.decode_info(&mut cursor).unwrap();
        assert_eq!(metadata.timestamp(), 100);
        assert_eq!(metadata.changeset(), 5);

        // Second entity: a zero delta keeps the accumulator at 100, so the
        // changeset is still decoded.
        let mut data = vec![0x01];
        data.extend_from_slice(&svarint_bytes(0));
        data.extend_from_slice(&svarint_bytes(1));
        let mut cursor = data.as_slice();
        let metadata = decoder.decode_info(&mut cursor).unwrap();
        assert_eq!(metadata.timestamp(), 100);
        assert_eq!(metadata.changeset(), 6);
    }
}
