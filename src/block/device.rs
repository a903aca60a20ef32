//! 存储接口核心类型

use crate::error::Result;
use bitflags::bitflags;
use std::path::Path;

/// 底层文件描述符
///
/// 缓存槽位用它标记所属文件，与返回给调用者的逻辑句柄不同。
pub type Descriptor = i32;

bitflags! {
    /// 打开标志
    ///
    /// 取值与 `open(2)` 的 `O_*` 常量一致，可以直接由 C 调用方的 `int` 转换。
    /// 只读模式（`O_RDONLY`）值为 0，即不含 `WRONLY` 与 `RDWR`。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: libc::c_int {
        /// 只写
        const WRONLY = libc::O_WRONLY;
        /// 读写
        const RDWR   = libc::O_RDWR;
        /// 不存在时创建
        const CREAT  = libc::O_CREAT;
        /// 与 CREAT 一起使用，文件已存在时失败
        const EXCL   = libc::O_EXCL;
        /// 打开时截断为 0
        const TRUNC  = libc::O_TRUNC;
        /// 追加写
        const APPEND = libc::O_APPEND;
        /// 同步写
        const SYNC   = libc::O_SYNC;
        /// 绕过内核页缓存
        #[cfg(any(target_os = "linux", target_os = "android"))]
        const DIRECT = libc::O_DIRECT;

        // 其余位（如 O_CLOEXEC）原样保留并转交给底层 open
        const _ = !0;
    }
}

impl OpenFlags {
    /// 只读打开
    pub const RDONLY: Self = Self::empty();

    /// 由 C 风格的 `int` 标志构造，保留所有位
    pub const fn from_raw(flags: libc::c_int) -> Self {
        Self::from_bits_retain(flags)
    }

    /// 是否可读
    pub fn is_readable(&self) -> bool {
        !self.contains(Self::WRONLY) || self.contains(Self::RDWR)
    }

    /// 是否可写
    pub fn is_writable(&self) -> bool {
        self.intersects(Self::WRONLY | Self::RDWR)
    }
}

/// 已打开的底层文件
///
/// 对应缓存层需要的全部底层操作。实现必须是定位 I/O，不能依赖内核维护的文件偏移。
///
/// # 示例
///
/// ```rust,ignore
/// impl BlockFile for MyFile {
///     fn descriptor(&self) -> Descriptor { self.fd }
///     fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> { ... }
///     fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> { ... }
///     fn size(&self) -> Result<u64> { ... }
///     fn sync(&mut self) -> Result<()> { ... }
///     fn set_len(&mut self, len: u64) -> Result<()> { ... }
/// }
/// ```
pub trait BlockFile {
    /// 底层描述符
    fn descriptor(&self) -> Descriptor;

    /// 定位读
    ///
    /// # 返回
    ///
    /// 实际读取的字节数，接近文件末尾时可能小于 `buf.len()`
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// 定位写
    ///
    /// # 返回
    ///
    /// 实际写入的字节数
    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize>;

    /// 当前文件大小（字节）
    fn size(&self) -> Result<u64>;

    /// 持久化同步（fsync）
    fn sync(&mut self) -> Result<()>;

    /// 调整文件长度（扩展或截断）
    fn set_len(&mut self, len: u64) -> Result<()>;
}

/// 底层存储
///
/// 负责按路径打开文件，产出 [`BlockFile`]。
pub trait Storage {
    /// 打开后的文件类型
    type File: BlockFile;

    /// 打开文件
    ///
    /// # 参数
    ///
    /// * `path` - 文件路径
    /// * `flags` - 调用者给出的打开标志
    /// * `mode` - 创建文件时的权限位
    fn open(&mut self, path: &Path, flags: OpenFlags, mode: u32) -> Result<Self::File>;
}
