// Fixed-size ring buffer without allocations

/// Ring buffer over a fixed array; writing past the end wraps to slot 0
///
/// Slots that were never written hold `T::default()`.
pub struct RingBuffer<T, const N: usize> {
    buffer: [T; N],
    head: usize,
    len: usize,
}

impl<T: Default + Copy, const N: usize> RingBuffer<T, N> {
    pub fn new() -> Self {
        Self {
            buffer: [T::default(); N],
            head: 0,
            len: 0,
        }
    }

    /// Push a new value, overwriting the oldest if full
    pub fn push(&mut self, value: T) {
        self.buffer[self.head] = value;
        self.head = (self.head + 1) % N;
        if self.len < N {
            self.len += 1;
        }
    }

    /// Number of slots written so far (at most N)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot the next push writes to
    pub fn cursor(&self) -> usize {
        self.head
    }

    /// All N slots in storage order, including never-written ones
    pub fn slots(&self) -> &[T; N] {
        &self.buffer
    }

    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T: Default + Copy, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
