//! 缓存常量定义
//!
//! 块大小与池容量都是进程级固定常量，不支持运行时配置。

//=============================================================================
// 块与缓存池
//=============================================================================

/// 块大小（4096 字节），同时是直接 I/O 的内存与偏移对齐粒度
pub const BLOCK_SIZE: usize = 4096;

/// 缓存池槽位数量（1024 个块 ≈ 4 MiB）
pub const CACHE_CAPACITY: usize = 1024;

//=============================================================================
// 句柄表
//=============================================================================

/// 同时打开的逻辑句柄上限
pub const MAX_OPEN_FILES: usize = 128;

/// 字节偏移所在的块号
#[inline]
pub const fn block_index(offset: u64) -> u64 {
    offset / BLOCK_SIZE as u64
}

/// 字节偏移在块内的偏移
#[inline]
pub const fn offset_in_block(offset: u64) -> usize {
    (offset % BLOCK_SIZE as u64) as usize
}
