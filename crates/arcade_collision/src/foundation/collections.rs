//! Specialized collection types

pub use slotmap::{new_key_type, Key, SlotMap};

/// Pool of released values kept around for reuse
///
/// Grid buckets and scratch buffers are cleared and parked here instead of
/// being dropped, so steady-state ticks do not allocate.
#[derive(Debug)]
pub struct RecyclePool<T> {
    free: Vec<T>,
    max_parked: usize,
}

impl<T> RecyclePool<T> {
    /// Create a pool that parks at most `max_parked` values
    pub fn new(max_parked: usize) -> Self {
        Self {
            free: Vec::new(),
            max_parked,
        }
    }

    /// Take a parked value, or build a fresh one
    pub fn acquire_or_else(&mut self, make: impl FnOnce() -> T) -> T {
        self.free.pop().unwrap_or_else(make)
    }

    /// Park a value for reuse; dropped if the pool is full
    pub fn release(&mut self, item: T) {
        if self.free.len() < self.max_parked {
            self.free.push(item);
        }
    }

    /// Number of parked values
    pub fn parked(&self) -> usize {
        self.free.len()
    }

    /// Drop every parked value
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

impl<T> Default for RecyclePool<T> {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recycle_pool_reuses_released_values() {
        let mut pool: RecyclePool<Vec<u32>> = RecyclePool::new(2);
        let mut bucket = pool.acquire_or_else(Vec::new);
        bucket.reserve(16);
        let capacity = bucket.capacity();
        bucket.clear();
        pool.release(bucket);

        let reused = pool.acquire_or_else(Vec::new);
        assert_eq!(reused.capacity(), capacity);
        assert_eq!(pool.parked(), 0);
    }

    #[test]
    fn test_recycle_pool_respects_limit() {
        let mut pool = RecyclePool::new(1);
        pool.release(1);
        pool.release(2);
        assert_eq!(pool.parked(), 1);
    }
}
