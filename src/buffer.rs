//! Output buffers holding decoded entities.

use crate::entity::Entity;

/// Default buffer capacity in bytes.
const DEFAULT_CAPACITY: usize = 2 * 1000 * 1000;

/// An append-only collection of decoded entities.
///
/// Parsers fill a buffer and move it to the output queue once it is nearly
/// full; committed entities never move afterwards. Capacity is tracked as
/// an estimate of the entities' in-memory size, not as an element count.
#[derive(Debug, Default)]
pub struct Buffer {
    entities: Vec<Entity>,
    committed: usize,
    capacity: usize,
}

impl Buffer {
    pub fn new() -> Buffer {
        Buffer::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Buffer {
        Buffer {
            entities: Vec::new(),
            committed: 0,
            capacity,
        }
    }

    /// Appends an entity. The entity is committed immediately; there is no
    /// way to remove it again.
    pub(crate) fn push(&mut self, entity: Entity) {
        self.committed += entity.byte_size();
        self.entities.push(entity);
    }

    /// Returns the estimated size in bytes of all committed entities.
    pub fn committed(&self) -> usize {
        self.committed
    }

    /// Returns the number of committed entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns true once the buffer has reached 90% of its capacity and
    /// should be handed to the consumer.
    pub(crate) fn is_nearly_full(&self) -> bool {
        self.committed >= self.capacity / 10 * 9
    }

    /// Returns an iterator over the committed entities in commit order.
    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    /// Replaces this buffer with an empty one of the same capacity and
    /// returns the filled buffer.
    pub(crate) fn take(&mut self) -> Buffer {
        std::mem::replace(self, Buffer::with_capacity(self.capacity))
    }
}

impl IntoIterator for Buffer {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

impl<'a> IntoIterator for &'a Buffer {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Metadata, Node};

    fn test_node(id: i64) -> Entity {
        Entity::Node(Node {
            id,
            metadata: Metadata::default(),
            visible: true,
            location: None,
            tags: Vec::new(),
        })
    }

    #[test]
    fn flush_threshold() {
        let mut buffer = Buffer::with_capacity(1000);
        assert!(!buffer.is_nearly_full());

        while buffer.committed() < 900 {
            assert!(!buffer.is_nearly_full());
            buffer.push(test_node(1));
        }
        assert!(buffer.is_nearly_full());
    }

    #[test]
    fn take_resets_but_keeps_capacity() {
        let mut buffer = Buffer::with_capacity(64);
        buffer.push(test_node(1));
        buffer.push(test_node(2));

        let full = buffer.take();
        assert_eq!(full.len(), 2);
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity, 64);

        let ids: Vec<i64> = full.into_iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
