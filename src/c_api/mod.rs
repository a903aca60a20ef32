//! C API 兼容层
//!
//! 提供与原始文件 I/O 同签名的 `vtpc_*` 函数，失败时返回 -1 并设置 `errno`。
//! 所有函数都是进程级 [`CacheManager`](crate::CacheManager) 方法的简单包装。

pub mod file;
