//! Ping-pong double buffer
//!
//! Two named slots, `read` and `write`. [`DoubleBuffer::swap`] flips which
//! slot is which with an exclusive-or on the read index, so no pass ever
//! reads and writes the same slot.

/// Two slots alternating between "current" and "being written" roles.
#[derive(Debug, Clone)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    read_index: usize,
}

impl<T: PartialEq> DoubleBuffer<T> {
    pub fn new(read: T, write: T) -> Self {
        debug_assert!(read != write, "double buffer slots must be distinct");
        Self {
            slots: [read, write],
            read_index: 0,
        }
    }
}

impl<T> DoubleBuffer<T> {
    /// Slot holding the authoritative current value.
    pub fn read(&self) -> &T {
        &self.slots[self.read_index]
    }

    /// Slot the next pass writes into.
    pub fn write(&self) -> &T {
        &self.slots[self.read_index ^ 1]
    }

    /// Exchange roles: the previous `write` becomes `read`.
    pub fn swap(&mut self) {
        self.read_index ^= 1;
    }

    /// Replace both slots, returning the old `(read, write)` pair.
    pub fn replace(&mut self, read: T, write: T) -> (T, T) {
        let old_read = std::mem::replace(&mut self.slots[self.read_index], read);
        let old_write = std::mem::replace(&mut self.slots[self.read_index ^ 1], write);
        (old_read, old_write)
    }

    /// Both slots, `read` first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        [self.read(), self.write()].into_iter()
    }
}
