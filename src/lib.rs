//! vtpc_core: 直接 I/O 文件的用户态块缓存
//!
//! 以 `O_DIRECT` 打开的文件绕过了内核页缓存，本库在用户态模拟页缓存：
//! - 固定数量、固定大小、按块对齐的缓冲区池
//! - 命中/未命中查找、脏块跟踪、写回与驱逐
//! - 模仿文件描述符语义的 open/close/read/write/seek/sync 原语
//!
//! # 示例
//!
//! ```rust,ignore
//! use std::io::SeekFrom;
//! use vtpc_core::{CacheManager, DirectStorage, OpenFlags, Result};
//!
//! fn main() -> Result<()> {
//!     let mut cache = CacheManager::new(DirectStorage::new());
//!     let fd = cache.open("bench.bin", OpenFlags::RDWR | OpenFlags::CREAT, 0o644)?;
//!
//!     cache.write(fd, &[0xAB; 5000])?;
//!     cache.seek(fd, SeekFrom::Start(0))?;
//!
//!     let mut buf = vec![0u8; 5000];
//!     cache.read(fd, &mut buf)?;
//!
//!     cache.close(fd)?;
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`consts`] - 块大小、池容量等常量
//! - [`block`] - 底层存储抽象与直接 I/O 实现
//! - [`cache`] - 槽位池与驱逐策略
//! - [`fs`] - 句柄表与缓存管理器
//! - [`c_api`] - C API 兼容层（可选）

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 常量定义
pub mod consts;

/// 底层存储抽象
pub mod block;

/// 块缓存
pub mod cache;

/// 文件级 API
pub mod fs;

// ===== C API 兼容层（可选）=====

/// C API 兼容层
///
/// 导出与 `open/close/read/write/lseek/fsync` 同签名的 `vtpc_*` 函数，
/// 可在构建时直接替换原始文件 I/O 调用。
#[cfg(feature = "c-api")]
pub mod c_api;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 常量
pub use consts::{BLOCK_SIZE, CACHE_CAPACITY, MAX_OPEN_FILES};

// 底层存储
pub use block::{AlignedBlock, BlockFile, Descriptor, DirectFile, DirectStorage, OpenFlags, Storage};

// 缓存
pub use cache::{BlockKey, CacheStats, LinearScan, Slot, SlotLookup, SlotPool, EVICT_MOST_FREQUENT};

// 文件级 API
pub use fs::{CacheManager, Handle, HandleTable, OpenFile};

// C API（当启用时）
#[cfg(feature = "c-api")]
pub use c_api::file::{vtpc_close, vtpc_fsync, vtpc_lseek, vtpc_open, vtpc_read, vtpc_write};
