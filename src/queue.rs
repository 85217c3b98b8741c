use std::collections::BTreeMap;

use crate::frame::{Frame, StreamId};

// Front keys live in their own far-negative block so every front insert
// dequeues ahead of every pending back insert, while both sides stay FIFO.
const FRONT_BASE: i64 = i64::MIN / 2;

/// The connection's ordered write queue.
///
/// Normal submissions enter at the back; retries of stalled DATA and error
/// responses enter at the front. Each side preserves submission order, and
/// a pending front insert always dequeues before any pending back insert.
#[derive(Debug, Default)]
pub struct WriteQueue {
    frames: BTreeMap<i64, Frame>,
    next_back: i64,
    next_front: i64,
}

impl WriteQueue {
    pub fn new() -> WriteQueue {
        WriteQueue {
            frames: BTreeMap::new(),
            next_back: 0,
            next_front: FRONT_BASE,
        }
    }

    pub fn enqueue_back(&mut self, frame: Frame) {
        self.frames.insert(self.next_back, frame);
        self.next_back += 1;
    }

    pub fn enqueue_front(&mut self, frame: Frame) {
        self.frames.insert(self.next_front, frame);
        self.next_front += 1;
    }

    pub fn dequeue(&mut self) -> Option<Frame> {
        self.frames.pop_first().map(|(_, frame)| frame)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True when any queued frame still references the stream.
    pub fn has_stream(&self, id: StreamId) -> bool {
        self.frames.values().any(|frame| frame.stream_id() == id)
    }
}

#[cfg(test)]
mod tests {
    use ntex_bytes::Bytes;

    use super::*;
    use crate::frame::{Data, Frame, Ping};

    fn data(tag: u8) -> Frame {
        Data::new(1.into(), Bytes::copy_from_slice(&[tag])).into()
    }

    fn tag(frame: &Frame) -> u8 {
        match frame {
            Frame::Data(d) => d.payload()[0],
            _ => panic!("expected DATA"),
        }
    }

    #[test]
    fn back_inserts_are_fifo() {
        let mut q = WriteQueue::new();
        q.enqueue_back(data(1));
        q.enqueue_back(data(2));
        q.enqueue_back(data(3));

        assert_eq!(tag(&q.dequeue().unwrap()), 1);
        assert_eq!(tag(&q.dequeue().unwrap()), 2);
        assert_eq!(tag(&q.dequeue().unwrap()), 3);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn front_inserts_are_fifo() {
        let mut q = WriteQueue::new();
        q.enqueue_front(data(1));
        q.enqueue_front(data(2));

        assert_eq!(tag(&q.dequeue().unwrap()), 1);
        assert_eq!(tag(&q.dequeue().unwrap()), 2);
    }

    #[test]
    fn front_insert_precedes_earlier_back_insert() {
        let mut q = WriteQueue::new();
        q.enqueue_back(data(1));
        q.enqueue_front(data(2));
        q.enqueue_back(data(3));
        q.enqueue_front(data(4));

        assert_eq!(tag(&q.dequeue().unwrap()), 2);
        assert_eq!(tag(&q.dequeue().unwrap()), 4);
        assert_eq!(tag(&q.dequeue().unwrap()), 1);
        assert_eq!(tag(&q.dequeue().unwrap()), 3);
    }

    #[test]
    fn mixed_order_survives_partial_dequeue() {
        let mut q = WriteQueue::new();
        q.enqueue_back(data(1));
        assert_eq!(tag(&q.dequeue().unwrap()), 1);

        q.enqueue_back(data(2));
        q.enqueue_front(data(3));
        assert_eq!(tag(&q.dequeue().unwrap()), 3);
        assert_eq!(tag(&q.dequeue().unwrap()), 2);
        assert!(q.is_empty());
    }

    #[test]
    fn has_stream_sees_queued_frames() {
        let mut q = WriteQueue::new();
        q.enqueue_back(data(1));
        q.enqueue_back(Ping::new([0; 8]).into());

        assert!(q.has_stream(1.into()));
        assert!(!q.has_stream(3.into()));

        q.dequeue();
        assert!(!q.has_stream(1.into()));
    }
}
