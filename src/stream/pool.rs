//! Reusable outgoing packet buffers
//!
//! Buffers are sized for one max-size packet. A buffer goes back into the
//! pool only once the sink has returned, so nothing still reads from it.

use std::sync::{Mutex, PoisonError};

pub const DEFAULT_POOL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct BufferPool {
    buffer_size: usize,
    capacity: usize,
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new(buffer_size: usize) -> Self {
        Self::with_capacity(buffer_size, DEFAULT_POOL_CAPACITY)
    }

    pub fn with_capacity(buffer_size: usize, capacity: usize) -> Self {
        Self {
            buffer_size,
            capacity,
            free: Mutex::new(Vec::new()),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// An empty buffer with room for one full packet.
    pub fn acquire(&self) -> Vec<u8> {
        let reused = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match reused {
            Some(mut buf) => {
                buf.clear();
                buf
            }
            None => Vec::with_capacity(self.buffer_size),
        }
    }

    /// Return buffers after the sink is done with them. Undersized buffers
    /// and anything past the pool capacity are freed.
    pub fn release<I>(&self, buffers: I)
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        for buf in buffers {
            if free.len() >= self.capacity {
                break;
            }
            if buf.capacity() >= self.buffer_size {
                free.push(buf);
            }
        }
    }

    pub fn available(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_has_packet_capacity() {
        let pool = BufferPool::new(1200);
        let buf = pool.acquire();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 1200);
    }

    #[test]
    fn test_released_buffers_are_reused_empty() {
        let pool = BufferPool::new(64);
        let mut buf = pool.acquire();
        buf.extend_from_slice(&[7; 40]);
        let ptr = buf.as_ptr();

        pool.release([buf]);
        assert_eq!(pool.available(), 1);

        let again = pool.acquire();
        assert!(again.is_empty());
        assert_eq!(again.as_ptr(), ptr);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = BufferPool::with_capacity(16, 2);
        pool.release((0..5).map(|_| Vec::with_capacity(16)));
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn test_undersized_buffers_are_not_pooled() {
        let pool = BufferPool::new(1200);
        pool.release([Vec::with_capacity(10)]);
        assert_eq!(pool.available(), 0);
    }
}
