//! Single-slot broadcast channels.
//!
//! A channel buffers at most one element. Every registered reader must consume
//! the buffered element before the producer may write the next one, so all
//! readers observe the same elements in the same order.

use contracts::debug_requires;
use std::task::Poll;

use crate::lang::svcode::Elem;

#[derive(Copy, Clone, Debug, PartialEq)]
enum Slot {
    Empty,
    Full(Elem),
    Ended,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Reader {
    /// Has not yet consumed the buffered element.
    Unread,
    /// Has consumed the buffered element.
    Read,
    /// No longer reads from the channel.
    Detached,
}

/// A reader's handle on a channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Port {
    pub channel: usize,
    pub reader: usize,
}

#[derive(Clone, Debug)]
pub struct Channel {
    slot: Slot,
    readers: Vec<Reader>,
}

impl Channel {
    pub fn new() -> Channel {
        Channel {
            slot: Slot::Empty,
            readers: Vec::new(),
        }
    }

    /// Register a new reader, returning its index.
    pub fn add_reader(&mut self) -> usize {
        self.readers.push(Reader::Read);
        self.readers.len() - 1
    }

    /// Can the producer write another element?
    pub fn is_writable(&self) -> bool {
        self.slot == Slot::Empty
    }

    pub fn is_ended(&self) -> bool {
        self.slot == Slot::Ended
    }

    /// Look at the element waiting for a reader, without consuming it.
    ///
    /// Returns `Poll::Ready(None)` once the producer has finished.
    pub fn peek(&self, reader: usize) -> Poll<Option<Elem>> {
        match (self.slot, self.readers[reader]) {
            (Slot::Ended, _) => Poll::Ready(None),
            (Slot::Full(elem), Reader::Unread) => Poll::Ready(Some(elem)),
            (Slot::Full(_), _) | (Slot::Empty, _) => Poll::Pending,
        }
    }

    /// Acknowledge the buffered element on behalf of a reader.
    #[debug_requires(self.peek(reader).is_ready())]
    pub fn consume(&mut self, reader: usize) {
        if let Slot::Full(_) = self.slot {
            self.readers[reader] = Reader::Read;
            self.release();
        }
    }

    #[debug_requires(self.is_writable())]
    pub fn write(&mut self, elem: Elem) {
        self.slot = Slot::Full(elem);
        for reader in &mut self.readers {
            if *reader == Reader::Read {
                *reader = Reader::Unread;
            }
        }
        self.release();
    }

    /// Mark the end of the stream.
    #[debug_requires(self.is_writable())]
    #[debug_ensures(self.is_ended())]
    pub fn close(&mut self) {
        self.slot = Slot::Ended;
    }

    /// Stop a reader from gating the producer.
    pub fn detach(&mut self, reader: usize) {
        self.readers[reader] = Reader::Detached;
        self.release();
    }

    /// Empty the slot once every attached reader has consumed it.
    fn release(&mut self) {
        if let Slot::Full(_) = self.slot {
            if self.readers.iter().all(|reader| *reader != Reader::Unread) {
                self.slot = Slot::Empty;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_reader_observes_each_element() {
        let mut channel = Channel::new();
        let first = channel.add_reader();
        let second = channel.add_reader();

        channel.write(Elem::num(1.0));
        assert!(!channel.is_writable());
        assert_eq!(channel.peek(first), Poll::Ready(Some(Elem::num(1.0))));

        channel.consume(first);
        assert_eq!(channel.peek(first), Poll::Pending);
        assert!(!channel.is_writable());

        channel.consume(second);
        assert!(channel.is_writable());
        assert_eq!(channel.peek(second), Poll::Pending);
    }

    #[test]
    fn detached_readers_do_not_gate() {
        let mut channel = Channel::new();
        let first = channel.add_reader();
        let second = channel.add_reader();

        channel.write(Elem::num(1.0));
        channel.consume(first);
        channel.detach(second);
        assert!(channel.is_writable());

        channel.write(Elem::num(2.0));
        channel.consume(first);
        assert!(channel.is_writable());
    }

    #[test]
    fn writes_without_readers_are_dropped() {
        let mut channel = Channel::new();
        channel.write(Elem::Pulse);
        assert!(channel.is_writable());
    }

    #[test]
    fn end_is_seen_by_all_readers() {
        let mut channel = Channel::new();
        let first = channel.add_reader();
        let second = channel.add_reader();

        channel.close();
        assert_eq!(channel.peek(first), Poll::Ready(None));
        assert_eq!(channel.peek(second), Poll::Ready(None));
    }
}
