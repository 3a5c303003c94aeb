//! Object Recycler
//!
//! A lock-free pool of reusable objects for short-lived scratch values
//! (decode buffers, transient DTOs) that would otherwise be allocated and
//! dropped on every request crossing the store boundary.
//!
//! ## Design
//!
//! - Backed by a fixed-capacity `crossbeam` `ArrayQueue`, so concurrent
//!   `get`/`put` need no external locking.
//! - `get` never fails: an empty pool just allocates a fresh object.
//! - `put` resets the object before it is pooled, so a recycled object can
//!   never resurface carrying data from a previous use.
//! - A `put` into a full pool drops the object. The pool provides no
//!   existence guarantee; it is an allocation-pressure valve, not a cache.
//!
//! Only pool objects that are stateless after reset. Anything with
//! externally-visible identity, an open connection, or a tracked lifetime
//! does not belong here.

use crossbeam::queue::ArrayQueue;

/// A type that can be returned to a [`Recycler`].
///
/// `reset` must clear every field back to its zero value; the recycler calls
/// it on every `put`, so forgetting to implement it correctly is the only way
/// to leak request data between borrows.
pub trait Recycle: Default {
    /// Clears the object back to its freshly-constructed state.
    fn reset(&mut self);
}

impl Recycle for bytes::BytesMut {
    fn reset(&mut self) {
        self.clear();
    }
}

impl Recycle for Vec<u8> {
    fn reset(&mut self) {
        self.clear();
    }
}

impl Recycle for String {
    fn reset(&mut self) {
        self.clear();
    }
}

/// A fixed-capacity, lock-free pool of reusable objects.
///
/// # Example
///
/// ```
/// use vitalgrid::recycler::Recycler;
/// use bytes::BytesMut;
///
/// let pool: Recycler<BytesMut> = Recycler::new(32);
///
/// let mut buf = pool.get();
/// buf.extend_from_slice(b"scratch data");
/// pool.put(buf); // reset and pooled for the next caller
///
/// assert!(pool.get().is_empty());
/// ```
pub struct Recycler<T: Recycle> {
    pool: ArrayQueue<T>,
}

impl<T: Recycle> Recycler<T> {
    /// Creates a recycler that retains at most `capacity` idle objects.
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Borrows an object from the pool, allocating a fresh one if the pool
    /// is empty. Never fails.
    pub fn get(&self) -> T {
        self.pool.pop().unwrap_or_default()
    }

    /// Returns an object to the pool.
    ///
    /// The object is reset first; if the pool is already full it is simply
    /// dropped.
    pub fn put(&self, mut obj: T) {
        obj.reset();
        let _ = self.pool.push(obj);
    }

    /// Number of idle objects currently held.
    pub fn idle(&self) -> usize {
        self.pool.len()
    }
}

impl<T: Recycle> std::fmt::Debug for Recycler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recycler")
            .field("idle", &self.pool.len())
            .field("capacity", &self.pool.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_get_from_empty_pool_allocates() {
        let pool: Recycler<Vec<u8>> = Recycler::new(4);
        let buf = pool.get();
        assert!(buf.is_empty());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_recycled_object_has_no_stale_data() {
        let pool: Recycler<BytesMut> = Recycler::new(4);

        let mut buf = pool.get();
        buf.extend_from_slice(b"patient-payload");
        pool.put(buf);
        assert_eq!(pool.idle(), 1);

        // The same backing object comes back, but cleared
        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= b"patient-payload".len());
    }

    #[test]
    fn test_put_over_capacity_drops() {
        let pool: Recycler<String> = Recycler::new(2);

        pool.put(String::from("a"));
        pool.put(String::from("b"));
        pool.put(String::from("c")); // dropped

        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_concurrent_get_put() {
        use std::sync::Arc;
        use std::thread;

        let pool: Arc<Recycler<Vec<u8>>> = Arc::new(Recycler::new(16));
        let mut handles = vec![];

        for i in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(thread::spawn(move || {
                for j in 0..1000 {
                    let mut buf = pool.get();
                    assert!(buf.is_empty(), "recycled buffer carried stale data");
                    buf.extend_from_slice(format!("{}-{}", i, j).as_bytes());
                    pool.put(buf);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(pool.idle() <= 16);
    }
}
