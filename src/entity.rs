//! Nodes, ways and relations as owned values.
//!
//! Decoded entities are owned by the [`Buffer`](crate::buffer::Buffer) they
//! were committed to and cross thread boundaries with it, so unlike
//! borrowed-view readers everything here is a plain value type.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A geographic coordinate pair in fixed-point units of 1e-7 degrees.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Location {
    lon: i32,
    lat: i32,
}

impl Location {
    pub fn new(lon: i32, lat: i32) -> Location {
        Location { lon, lat }
    }

    /// Builds a location from nanodegree (10⁻⁹) coordinates.
    pub fn from_nano(lon: i64, lat: i64) -> Location {
        Location {
            lon: (lon / 100) as i32,
            lat: (lat / 100) as i32,
        }
    }

    /// Returns the longitude coordinate in degrees.
    pub fn lon(&self) -> f64 {
        1e-7 * f64::from(self.lon)
    }

    /// Returns the latitude coordinate in degrees.
    pub fn lat(&self) -> f64 {
        1e-7 * f64::from(self.lat)
    }

    /// Returns the longitude coordinate in decimicrodegrees (10⁻⁷).
    pub fn decimicro_lon(&self) -> i32 {
        self.lon
    }

    /// Returns the latitude coordinate in decimicrodegrees (10⁻⁷).
    pub fn decimicro_lat(&self) -> i32 {
        self.lat
    }

    /// Returns true if the coordinates are inside the valid -180/180 and
    /// -90/90 degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lon >= -1_800_000_000
            && self.lon <= 1_800_000_000
            && self.lat >= -900_000_000
            && self.lat <= 900_000_000
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.7},{:.7})", self.lon(), self.lat())
    }
}

/// Additional metadata that might be included in each entity.
///
/// All fields default to their "absent" value: a timestamp of 0 means no
/// timestamp, a uid of 0 means anonymous.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Metadata {
    pub(crate) version: u32,
    pub(crate) timestamp: i64,
    pub(crate) changeset: u64,
    pub(crate) uid: u32,
    pub(crate) user: String,
}

impl Metadata {
    /// Returns the version of this entity.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the time stamp in seconds since the epoch (0 if absent).
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Returns the changeset id.
    pub fn changeset(&self) -> u64 {
        self.changeset
    }

    /// Returns the user id (0 for anonymous).
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Returns the user name.
    pub fn user(&self) -> &str {
        &self.user
    }

    fn byte_size(&self) -> usize {
        std::mem::size_of::<Metadata>() + self.user.len()
    }
}

fn tags_byte_size(tags: &[(String, String)]) -> usize {
    tags.iter()
        .map(|(k, v)| k.len() + v.len() + 2 * std::mem::size_of::<String>())
        .sum()
}

/// An OpenStreetMap node (see [OSM wiki](https://wiki.openstreetmap.org/wiki/Node)).
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub(crate) id: i64,
    pub(crate) metadata: Metadata,
    pub(crate) visible: bool,
    pub(crate) location: Option<Location>,
    pub(crate) tags: Vec<(String, String)>,
}

impl Node {
    /// Returns the node id. Might be negative to indicate that the entity
    /// has not yet been uploaded to a server.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Returns additional metadata for this entity.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns false if this record encodes a deletion.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Returns the node location. Deleted nodes have none.
    pub fn location(&self) -> Option<Location> {
        self.location
    }

    /// Returns an iterator over the tags of this node as key/value pairs.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn byte_size(&self) -> usize {
        std::mem::size_of::<Node>() + self.metadata.byte_size() + tags_byte_size(&self.tags)
    }
}

/// An OpenStreetMap way (see [OSM wiki](https://wiki.openstreetmap.org/wiki/Way)).
///
/// A way contains an ordered list of node references.
#[derive(Clone, Debug, PartialEq)]
pub struct Way {
    pub(crate) id: i64,
    pub(crate) metadata: Metadata,
    pub(crate) visible: bool,
    pub(crate) refs: Vec<i64>,
    pub(crate) tags: Vec<(String, String)>,
}

impl Way {
    /// Returns the way id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Returns additional metadata for this entity.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns false if this record encodes a deletion.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Returns the referenced node ids. Deleted ways have none.
    pub fn refs(&self) -> &[i64] {
        &self.refs
    }

    /// Returns an iterator over the tags of this way as key/value pairs.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn byte_size(&self) -> usize {
        std::mem::size_of::<Way>()
            + self.metadata.byte_size()
            + self.refs.len() * std::mem::size_of::<i64>()
            + tags_byte_size(&self.tags)
    }
}

/// The entity type of a relation member.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

impl MemberType {
    /// Index into per-type state arrays (node 0, way 1, relation 2).
    pub(crate) fn index(self) -> usize {
        match self {
            MemberType::Node => 0,
            MemberType::Way => 1,
            MemberType::Relation => 2,
        }
    }
}

/// A member of a relation: a typed reference to another entity plus a role.
#[derive(Clone, Debug, PartialEq)]
pub struct RelMember {
    pub(crate) member_type: MemberType,
    pub(crate) member_id: i64,
    pub(crate) role: String,
}

impl RelMember {
    /// Returns the type of the referenced entity.
    pub fn member_type(&self) -> MemberType {
        self.member_type
    }

    /// Returns the id of the referenced entity.
    pub fn member_id(&self) -> i64 {
        self.member_id
    }

    /// Returns the role of this member.
    pub fn role(&self) -> &str {
        &self.role
    }
}

/// An OpenStreetMap relation (see [OSM wiki](https://wiki.openstreetmap.org/wiki/Relation)).
///
/// A relation contains an ordered list of members that can be of any
/// entity type.
#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    pub(crate) id: i64,
    pub(crate) metadata: Metadata,
    pub(crate) visible: bool,
    pub(crate) members: Vec<RelMember>,
    pub(crate) tags: Vec<(String, String)>,
}

impl Relation {
    /// Returns the relation id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Returns additional metadata for this entity.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns false if this record encodes a deletion.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Returns the members of this relation. Deleted relations have none.
    pub fn members(&self) -> &[RelMember] {
        &self.members
    }

    /// Returns an iterator over the tags of this relation as key/value
    /// pairs.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn byte_size(&self) -> usize {
        std::mem::size_of::<Relation>()
            + self.metadata.byte_size()
            + self
                .members
                .iter()
                .map(|m| std::mem::size_of::<RelMember>() + m.role.len())
                .sum::<usize>()
            + tags_byte_size(&self.tags)
    }
}

/// An enum with the OSM core entities: nodes, ways and relations.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Entity {
    /// Returns the entity id.
    pub fn id(&self) -> i64 {
        match self {
            Entity::Node(n) => n.id,
            Entity::Way(w) => w.id,
            Entity::Relation(r) => r.id,
        }
    }

    /// Returns additional metadata for this entity.
    pub fn metadata(&self) -> &Metadata {
        match self {
            Entity::Node(n) => &n.metadata,
            Entity::Way(w) => &w.metadata,
            Entity::Relation(r) => &r.metadata,
        }
    }

    /// Returns false if this record encodes a deletion.
    pub fn visible(&self) -> bool {
        match self {
            Entity::Node(n) => n.visible,
            Entity::Way(w) => w.visible,
            Entity::Relation(r) => r.visible,
        }
    }

    /// Approximate in-memory size, used for buffer capacity accounting.
    pub(crate) fn byte_size(&self) -> usize {
        match self {
            Entity::Node(n) => n.byte_size(),
            Entity::Way(w) => w.byte_size(),
            Entity::Relation(r) => r.byte_size(),
        }
    }
}

/// A bit set selecting which entity types a parser should deliver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EntityMask(u8);

impl EntityMask {
    pub const NOTHING: EntityMask = EntityMask(0);
    pub const NODE: EntityMask = EntityMask(0x01);
    pub const WAY: EntityMask = EntityMask(0x02);
    pub const RELATION: EntityMask = EntityMask(0x04);
    pub const CHANGESET: EntityMask = EntityMask(0x08);
    pub const ALL: EntityMask = EntityMask(0x0f);

    /// Returns true if every type in `other` is also selected in `self`.
    pub fn contains(self, other: EntityMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no entity type is selected.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for EntityMask {
    fn default() -> EntityMask {
        EntityMask::ALL
    }
}

impl BitOr for EntityMask {
    type Output = EntityMask;

    fn bitor(self, rhs: EntityMask) -> EntityMask {
        EntityMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for EntityMask {
    fn bitor_assign(&mut self, rhs: EntityMask) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_conversions() {
        let loc = Location::new(1_162_564_468, 521_199_235);
        assert!((loc.lon() - 116.2564468).abs() < 1e-7);
        assert!((loc.lat() - 52.1199235).abs() < 1e-7);
        assert_eq!(loc.decimicro_lon(), 1_162_564_468);

        let from_nano = Location::from_nano(116_256_446_800, 52_119_923_500);
        assert_eq!(from_nano, loc);
    }

    #[test]
    fn location_validity() {
        assert!(Location::new(1_800_000_000, 900_000_000).is_valid());
        assert!(!Location::new(1_800_000_001, 0).is_valid());
        assert!(!Location::new(0, -900_000_001).is_valid());
    }

    #[test]
    fn mask_algebra() {
        let mask = EntityMask::NODE | EntityMask::WAY;
        assert!(mask.contains(EntityMask::NODE));
        assert!(mask.contains(EntityMask::WAY));
        assert!(!mask.contains(EntityMask::RELATION));
        assert!(EntityMask::ALL.contains(mask));
        assert!(EntityMask::NOTHING.is_empty());
        assert!(!mask.is_empty());
        assert!(mask.contains(EntityMask::NOTHING));
    }
}
