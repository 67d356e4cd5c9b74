//! Sample points for visualization
//!
//! The audio thread stores one [`SamplePoint`] per frame into a preallocated
//! ring of atomic slots ([`PointWriter`]), overwriting the oldest slot once
//! the ring is full. The render side owns a [`PointReader`] that copies the
//! newest slots into a fixed-capacity [`BoundedPointBuffer`] whenever a
//! snapshot is requested. Neither side ever waits on the other.

use std::sync::atomic::{fence, AtomicU64, Ordering};
use std::sync::Arc;

/// Default number of points kept for display
pub const DEFAULT_POINT_CAPACITY: usize = 1024;

/// Ring slots per displayed point. The spare half lets the writer keep going
/// while a reader copies without invalidating the points it needs.
const TRANSPORT_FACTOR: usize = 2;

/// One stereo frame as an (x, y) pair, before mute is applied
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SamplePoint {
    pub x: f32,
    pub y: f32,
}

impl SamplePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Fixed-capacity circular buffer that overwrites its oldest entry when full
#[derive(Debug, Clone)]
pub struct BoundedPointBuffer {
    slots: Box<[SamplePoint]>,
    /// Next slot to write
    write_pos: usize,
    /// Number of slots holding real data (saturates at capacity)
    len: usize,
}

impl BoundedPointBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![SamplePoint::default(); capacity.max(1)].into_boxed_slice(),
            write_pos: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn write(&mut self, point: SamplePoint) {
        self.slots[self.write_pos] = point;
        self.write_pos = (self.write_pos + 1) % self.slots.len();
        if self.len < self.slots.len() {
            self.len += 1;
        }
    }

    /// Written points, oldest first
    pub fn snapshot(&self) -> Vec<SamplePoint> {
        let mut out = Vec::with_capacity(self.len);
        self.snapshot_into(&mut out);
        out
    }

    /// Like [`snapshot`](Self::snapshot) but reuses `out`'s allocation
    pub fn snapshot_into(&self, out: &mut Vec<SamplePoint>) {
        out.clear();
        let capacity = self.slots.len();
        // Before the first wrap the oldest entry is slot 0
        let start = if self.len < capacity { 0 } else { self.write_pos };
        out.extend((0..self.len).map(|i| self.slots[(start + i) % capacity]));
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }
}

#[inline]
fn pack(point: SamplePoint) -> u64 {
    ((point.x.to_bits() as u64) << 32) | point.y.to_bits() as u64
}

#[inline]
fn unpack(bits: u64) -> SamplePoint {
    SamplePoint::new(f32::from_bits((bits >> 32) as u32), f32::from_bits(bits as u32))
}

/// Slots shared by one writer and one reader
struct PointRing {
    slots: Box<[AtomicU64]>,
    /// Index the writer is about to overwrite, plus one
    claimed: AtomicU64,
    /// Points completely stored
    written: AtomicU64,
}

impl PointRing {
    #[inline]
    fn slot(&self, index: u64) -> &AtomicU64 {
        &self.slots[(index % self.slots.len() as u64) as usize]
    }
}

/// Create a connected writer/reader pair keeping `capacity` display points
pub fn point_channel(capacity: usize) -> (PointWriter, PointReader) {
    let capacity = capacity.max(1);
    let ring_len = capacity * TRANSPORT_FACTOR;
    let ring = Arc::new(PointRing {
        slots: (0..ring_len).map(|_| AtomicU64::new(0)).collect(),
        claimed: AtomicU64::new(0),
        written: AtomicU64::new(0),
    });
    (
        PointWriter {
            ring: ring.clone(),
            next: 0,
        },
        PointReader {
            ring,
            seen: 0,
            scratch: Vec::with_capacity(ring_len),
            buffer: BoundedPointBuffer::new(capacity),
        },
    )
}

/// Audio-thread end: wait-free store, never blocks, never allocates
pub struct PointWriter {
    ring: Arc<PointRing>,
    next: u64,
}

impl PointWriter {
    /// Store `point`, overwriting the oldest slot once the ring is full
    #[inline]
    pub fn push(&mut self, point: SamplePoint) {
        let index = self.next;
        let ring = &*self.ring;
        // Announce the overwrite before touching the slot so a concurrent
        // reader can tell the old value may be gone
        ring.claimed.store(index + 1, Ordering::Relaxed);
        fence(Ordering::Release);
        ring.slot(index).store(pack(point), Ordering::Relaxed);
        ring.written.store(index + 1, Ordering::Release);
        self.next = index + 1;
    }
}

/// Display end: copies the newest points into the bounded buffer
pub struct PointReader {
    ring: Arc<PointRing>,
    /// Points already copied
    seen: u64,
    scratch: Vec<SamplePoint>,
    buffer: BoundedPointBuffer,
}

impl PointReader {
    /// Copy everything written since the last call into the bounded buffer.
    ///
    /// Returns the number of points moved.
    pub fn drain(&mut self) -> usize {
        let ring = &*self.ring;
        let ring_len = ring.slots.len() as u64;

        let written = ring.written.load(Ordering::Acquire);
        let start = self.seen.max(written.saturating_sub(ring_len));

        self.scratch.clear();
        for index in start..written {
            self.scratch.push(unpack(ring.slot(index).load(Ordering::Relaxed)));
        }

        // Anything the writer claimed meanwhile may have replaced the oldest
        // slots we just copied
        fence(Ordering::Acquire);
        let claimed = ring.claimed.load(Ordering::Relaxed);
        let valid_from = claimed.saturating_sub(ring_len);
        let skip = (valid_from.saturating_sub(start) as usize).min(self.scratch.len());

        if start > self.seen || skip > 0 {
            // Older points were overwritten before we got to them
            self.buffer.clear();
        }
        for &point in &self.scratch[skip..] {
            self.buffer.write(point);
        }
        self.seen = written;
        self.scratch.len() - skip
    }

    /// The most recent points, oldest first
    pub fn snapshot(&mut self) -> Vec<SamplePoint> {
        self.drain();
        self.buffer.snapshot()
    }

    pub fn snapshot_into(&mut self, out: &mut Vec<SamplePoint>) {
        self.drain();
        self.buffer.snapshot_into(out);
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(i: usize) -> SamplePoint {
        SamplePoint::new(i as f32, -(i as f32))
    }

    #[test]
    fn test_empty_snapshot() {
        let buffer = BoundedPointBuffer::new(8);
        assert!(buffer.snapshot().is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_fill_exposes_only_written() {
        let mut buffer = BoundedPointBuffer::new(8);
        for i in 0..3 {
            buffer.write(p(i));
        }
        assert_eq!(buffer.snapshot(), vec![p(0), p(1), p(2)]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_exactly_full_in_write_order() {
        let n = 16;
        let mut buffer = BoundedPointBuffer::new(n);
        for i in 0..n {
            buffer.write(p(i));
        }
        let expected: Vec<_> = (0..n).map(p).collect();
        assert_eq!(buffer.snapshot(), expected);
    }

    #[test]
    fn test_overwrite_keeps_last_n_oldest_first() {
        let n = 16;
        for k in [1, 5, 16, 37] {
            let mut buffer = BoundedPointBuffer::new(n);
            for i in 0..n + k {
                buffer.write(p(i));
            }
            let expected: Vec<_> = (k..n + k).map(p).collect();
            assert_eq!(buffer.snapshot(), expected, "after {} extra writes", k);
            assert_eq!(buffer.len(), n);
        }
    }

    #[test]
    fn test_snapshot_into_reuses_vec() {
        let mut buffer = BoundedPointBuffer::new(4);
        buffer.write(p(1));
        let mut out = vec![p(99); 10];
        buffer.snapshot_into(&mut out);
        assert_eq!(out, vec![p(1)]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = BoundedPointBuffer::new(4);
        for i in 0..6 {
            buffer.write(p(i));
        }
        buffer.clear();
        assert!(buffer.snapshot().is_empty());
        buffer.write(p(7));
        assert_eq!(buffer.snapshot(), vec![p(7)]);
    }

    #[test]
    fn test_channel_delivers_last_capacity_points() {
        let (mut writer, mut reader) = point_channel(8);
        for i in 0..12 {
            writer.push(p(i));
        }
        let expected: Vec<_> = (4..12).map(p).collect();
        assert_eq!(reader.snapshot(), expected);

        writer.push(p(12));
        let snapshot = reader.snapshot();
        assert_eq!(snapshot.len(), 8);
        assert_eq!(snapshot[0], p(5));
        assert_eq!(snapshot.last(), Some(&p(12)));
    }

    #[test]
    fn test_stalled_reader_sees_newest_points() {
        let (mut writer, mut reader) = point_channel(8);
        writer.push(p(0));
        assert_eq!(reader.snapshot(), vec![p(0)]);

        // Far more than the ring holds while nobody reads
        for i in 1..228 {
            writer.push(p(i));
        }
        let expected: Vec<_> = (220..228).map(p).collect();
        assert_eq!(reader.snapshot(), expected);
        assert_eq!(reader.drain(), 0);
    }

    #[test]
    fn test_partial_drains_accumulate() {
        let (mut writer, mut reader) = point_channel(4);
        writer.push(p(0));
        writer.push(p(1));
        assert_eq!(reader.drain(), 2);
        writer.push(p(2));
        writer.push(p(3));
        writer.push(p(4));
        assert_eq!(reader.drain(), 3);
        assert_eq!(reader.snapshot(), vec![p(1), p(2), p(3), p(4)]);
    }

    #[test]
    fn test_concurrent_snapshots_are_contiguous() {
        let (mut writer, mut reader) = point_channel(64);
        let total = 200_000;
        let producer = std::thread::spawn(move || {
            for i in 0..total {
                writer.push(p(i));
            }
        });

        let mut out = Vec::new();
        while !producer.is_finished() {
            reader.snapshot_into(&mut out);
            for pair in out.windows(2) {
                assert_eq!(pair[1].x, pair[0].x + 1.0, "gap or reorder in {:?}", pair);
            }
        }
        producer.join().unwrap();

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.len(), 64);
        assert_eq!(snapshot[0], p(total - 64));
        assert_eq!(snapshot[63], p(total - 1));
    }
}
