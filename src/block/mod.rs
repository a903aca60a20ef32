//! 底层存储抽象
//!
//! 缓存层只通过这里的 trait 访问底层文件。
//! block/device.rs 定义存储接口：定位读、定位写、大小查询、持久化同步、截断
//! block/aligned.rs 提供按块对齐的缓冲区，直接 I/O 要求内存地址与文件偏移都按块对齐
//! block/direct.rs 是基于 std::fs 的实现，默认以 O_DIRECT 打开，绕过内核页缓存

mod aligned;
mod device;
mod direct;

#[cfg(test)]
pub(crate) mod mock;

pub use aligned::AlignedBlock;
pub use device::{BlockFile, Descriptor, OpenFlags, Storage};
pub use direct::{DirectFile, DirectStorage};
