//! Working-buffer acquisition for decode sessions.
//!
//! A decode call needs a handful of scratch buffers: the active palette, the
//! pixel index buffer and the LZW dictionary storage. All of them are
//! obtained through a [`BufferPool`] so callers can plug in pooling or
//! accounting; [`HeapPool`] is the ambient default. Every buffer acquired
//! during a decode call is released before the call returns, on success and
//! on every failure path.

/// Capability for acquiring and releasing working buffers.
pub trait BufferPool {
    /// Acquire a zeroed buffer of at least `len` bytes, or `None` when the
    /// pool cannot supply one. Returning `None` aborts the decode.
    fn acquire(&mut self, len: usize) -> Option<Vec<u8>>;

    /// Release a buffer previously returned by [`acquire`](Self::acquire).
    fn release(&mut self, buf: Vec<u8>);
}

/// The default pool: plain heap allocation, buffers dropped on release.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapPool;

impl BufferPool for HeapPool {
    fn acquire(&mut self, len: usize) -> Option<Vec<u8>> {
        Some(vec![0; len])
    }

    fn release(&mut self, _buf: Vec<u8>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_pool_zeroed() {
        let buf = HeapPool.acquire(64).unwrap();
        assert_eq!(buf.len(), 64);
        assert!(buf.iter().all(|&b| b == 0));
    }
}
