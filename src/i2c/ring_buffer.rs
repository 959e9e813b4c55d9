// Licensed under the Apache-2.0 license

//! Byte FIFOs backing buffered transfers.
//!
//! The driver does not own an allocator. It asks a [`RingBufferProvider`]
//! for an RX and a TX buffer when entering buffered mode and hands both back
//! when leaving it. [`HeaplessProvider`] serves fixed-capacity buffers from
//! `heapless` storage.

use heapless::Deque;

/// Single-producer single-consumer byte queue.
pub trait RingBuffer {
    /// Capacity requested when the buffer was created.
    fn capacity(&self) -> usize;

    /// Bytes currently queued.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn free(&self) -> usize {
        self.capacity().saturating_sub(self.len())
    }

    /// Append a byte, handing it back if the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns the rejected byte when the buffer is full.
    fn push(&mut self, byte: u8) -> Result<(), u8>;

    fn pop(&mut self) -> Option<u8>;

    fn clear(&mut self);
}

/// Creates and destroys ring buffers.
pub trait RingBufferProvider {
    type Buffer: RingBuffer;

    /// New empty buffer holding `capacity` bytes, or `None` if it cannot be made.
    fn create(&mut self, capacity: usize) -> Option<Self::Buffer>;

    fn destroy(&mut self, buffer: Self::Buffer);
}

/// Ring buffer with `N` bytes of inline storage and a runtime capacity up to `N`.
pub struct HeaplessRingBuffer<const N: usize> {
    queue: Deque<u8, N>,
    capacity: usize,
}

impl<const N: usize> RingBuffer for HeaplessRingBuffer<N> {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn push(&mut self, byte: u8) -> Result<(), u8> {
        if self.queue.len() >= self.capacity {
            return Err(byte);
        }
        self.queue.push_back(byte)
    }

    fn pop(&mut self) -> Option<u8> {
        self.queue.pop_front()
    }

    fn clear(&mut self) {
        self.queue.clear();
    }
}

/// Provider of [`HeaplessRingBuffer`]s. Requests above `N` bytes fail.
#[derive(Copy, Clone, Debug, Default)]
pub struct HeaplessProvider<const N: usize>;

impl<const N: usize> RingBufferProvider for HeaplessProvider<N> {
    type Buffer = HeaplessRingBuffer<N>;

    fn create(&mut self, capacity: usize) -> Option<Self::Buffer> {
        (capacity > 0 && capacity <= N).then(|| HeaplessRingBuffer {
            queue: Deque::new(),
            capacity,
        })
    }

    fn destroy(&mut self, _buffer: Self::Buffer) {}
}
