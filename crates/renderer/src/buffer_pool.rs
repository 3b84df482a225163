//! GPU buffer pool for attribute storage
//!
//! Attribute buffers are destroyed and reallocated whenever a channel's
//! capacity changes. Instead of handing freed buffers back to the driver,
//! the pool keeps them in size buckets and gives them out again to the next
//! allocation of a compatible size.

use std::collections::HashMap;
use wgpu::{Buffer, Device};

/// Size buckets for buffer pooling (in bytes)
const SIZE_BUCKETS: &[u64] = &[
    256,      // 64 floats
    1024,     // 256 floats
    4096,     // 1K floats
    16384,    // 4K floats
    65536,    // 16K floats
    262144,   // 64K floats
    1048576,  // 256K floats
    4194304,  // 1M floats
    16777216, // 4M floats
];

/// Free buffer waiting in the pool
struct PooledBuffer {
    buffer: Buffer,
    released_frame: u64,
}

/// Pool of storage buffers, owned by the wgpu backend
pub struct BufferPool {
    usage: wgpu::BufferUsages,
    pools: HashMap<u64, Vec<PooledBuffer>>,
    current_frame: u64,
    max_unused_frames: u64,
    created: u64,
    reused: u64,
}

impl BufferPool {
    pub fn new(usage: wgpu::BufferUsages) -> Self {
        let mut pools = HashMap::new();
        for &size in SIZE_BUCKETS {
            pools.insert(size, Vec::new());
        }

        Self {
            usage,
            pools,
            current_frame: 0,
            max_unused_frames: 60, // Drop buffers unused for 60 frames (~1 second at 60fps)
            created: 0,
            reused: 0,
        }
    }

    /// Get the appropriate bucket size for a requested size
    fn get_bucket_size(requested_size: u64) -> u64 {
        for &bucket_size in SIZE_BUCKETS {
            if requested_size <= bucket_size {
                return bucket_size;
            }
        }
        // For very large buffers, round up to nearest MB
        requested_size.div_ceil(1048576) * 1048576
    }

    /// Take a buffer of at least `size` bytes from the pool or create one
    pub fn acquire(&mut self, device: &Device, size: u64, label: Option<&str>) -> Buffer {
        let bucket_size = Self::get_bucket_size(size);

        if let Some(entry) = self.pools.get_mut(&bucket_size).and_then(Vec::pop) {
            self.reused += 1;
            return entry.buffer;
        }

        self.created += 1;
        device.create_buffer(&wgpu::BufferDescriptor {
            label,
            size: bucket_size,
            usage: self.usage,
            mapped_at_creation: false,
        })
    }

    /// Hand a buffer back to the pool
    pub fn release(&mut self, buffer: Buffer) {
        let bucket_size = Self::get_bucket_size(buffer.size());
        self.pools.entry(bucket_size).or_default().push(PooledBuffer {
            buffer,
            released_frame: self.current_frame,
        });
    }

    /// Destroy buffers that stayed unused for too long; called once per frame
    pub fn cleanup(&mut self) {
        let cleanup_threshold = self.current_frame.saturating_sub(self.max_unused_frames);

        for pool in self.pools.values_mut() {
            pool.retain(|entry| {
                let keep = entry.released_frame > cleanup_threshold;
                if !keep {
                    entry.buffer.destroy();
                }
                keep
            });
        }

        self.current_frame += 1;
    }

    /// Get statistics about the buffer pool
    pub fn get_stats(&self) -> BufferPoolStats {
        let mut buffers_available = 0;
        let mut available_memory = 0;

        for (size, pool) in &self.pools {
            buffers_available += pool.len();
            available_memory += size * pool.len() as u64;
        }

        BufferPoolStats {
            buffers_available,
            available_memory_bytes: available_memory,
            buffers_created: self.created,
            buffers_reused: self.reused,
        }
    }
}

/// Statistics about buffer pool usage
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    pub buffers_available: usize,
    pub available_memory_bytes: u64,
    pub buffers_created: u64,
    pub buffers_reused: u64,
}
