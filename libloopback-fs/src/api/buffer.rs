use bytes::BytesMut;

/// Source of read buffers, supplied by the protocol layer.
pub trait BufferPool: Send + Sync {
    /// Returns a buffer whose length is at least `size`.
    fn alloc_buffer(&self, size: usize) -> BytesMut;
}

/// Allocates a fresh zeroed buffer for every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapBufferPool;

impl BufferPool for HeapBufferPool {
    fn alloc_buffer(&self, size: usize) -> BytesMut {
        BytesMut::zeroed(size)
    }
}
