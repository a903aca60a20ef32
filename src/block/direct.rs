//! 基于 std::fs 的直接 I/O 存储

use super::device::{BlockFile, Descriptor, OpenFlags, Storage};
use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::{FileExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::Path;

#[cfg(any(target_os = "linux", target_os = "android"))]
const DIRECT_FLAG: libc::c_int = OpenFlags::DIRECT.bits();

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const DIRECT_FLAG: libc::c_int = 0;

/// 直接 I/O 存储
///
/// 默认在调用者的标志上强制追加 `O_DIRECT`，所有传输都绕过内核页缓存，
/// 这正是缓存层要模拟的场景。
///
/// tmpfs 等文件系统不支持 `O_DIRECT`（open 返回 `EINVAL`），
/// 此时可以用 [`DirectStorage::buffered`] 退化为普通缓冲 I/O。
#[derive(Debug, Clone, Copy)]
pub struct DirectStorage {
    direct: bool,
}

impl DirectStorage {
    /// 创建直接 I/O 存储
    pub const fn new() -> Self {
        Self { direct: true }
    }

    /// 创建不附加 `O_DIRECT` 的存储
    pub const fn buffered() -> Self {
        Self { direct: false }
    }

    /// 是否附加 `O_DIRECT`
    pub const fn is_direct(&self) -> bool {
        self.direct
    }

    fn os_flags(&self, flags: OpenFlags) -> libc::c_int {
        // 访问模式交给 OpenOptions 的 read/write；APPEND 由缓存层自己实现，
        // 转交给内核会让 pwrite 忽略偏移
        let passthrough = flags.bits() & !(libc::O_ACCMODE | libc::O_APPEND);
        if self.direct {
            passthrough | DIRECT_FLAG
        } else {
            passthrough
        }
    }
}

impl Default for DirectStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for DirectStorage {
    type File = DirectFile;

    fn open(&mut self, path: &Path, flags: OpenFlags, mode: u32) -> Result<DirectFile> {
        let file = OpenOptions::new()
            .read(flags.is_readable())
            .write(flags.is_writable())
            .custom_flags(self.os_flags(flags))
            .mode(mode)
            .open(path)?;

        log::debug!(
            "[VTPC] opened {} fd={} flags={:#o} direct={}",
            path.display(),
            file.as_raw_fd(),
            flags.bits(),
            self.direct
        );
        Ok(DirectFile { file })
    }
}

/// [`DirectStorage`] 打开的文件
#[derive(Debug)]
pub struct DirectFile {
    file: File,
}

impl BlockFile for DirectFile {
    fn descriptor(&self) -> Descriptor {
        self.file.as_raw_fd()
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        Ok(FileExt::read_at(&self.file, buf, offset)?)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        Ok(FileExt::write_at(&self.file, buf, offset)?)
    }

    fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(self.file.sync_all()?)
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        Ok(self.file.set_len(len)?)
    }
}
