//! C API 兼容层 - 文件操作
//!
//! 函数签名与 `open/close/read/write/lseek/fsync` 一致，可在构建时整体替换。
//! 内部共用一个进程级管理器，第一次 `vtpc_open` 时创建。
//!
//! 管理器本身不支持并发，这里的互斥锁只负责把调用串行化。

use crate::error::{Error, ErrorKind, Result};
use crate::{CacheManager, DirectStorage, Handle, OpenFlags};
use libc::{c_char, c_int, c_void, off_t, size_t, ssize_t};
use std::ffi::{CStr, OsStr};
use std::io::SeekFrom;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

static MANAGER: Mutex<Option<CacheManager<DirectStorage>>> = Mutex::new(None);

fn with_manager<T>(f: impl FnOnce(&mut CacheManager<DirectStorage>) -> Result<T>) -> Result<T> {
    let mut guard = MANAGER.lock().unwrap_or_else(PoisonError::into_inner);
    let manager = guard.get_or_insert_with(|| CacheManager::new(DirectStorage::new()));
    f(manager)
}

#[cfg(target_os = "linux")]
fn set_errno(code: c_int) {
    // SAFETY: errno 位置由 libc 为当前线程提供，始终有效
    unsafe { *libc::__errno_location() = code }
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
fn set_errno(code: c_int) {
    // SAFETY: 同上
    unsafe { *libc::__error() = code }
}

/// 成功返回结果，失败设置 errno 并返回 `failure`
fn report<T>(result: Result<T>, failure: T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::debug!("[VTPC] c api call failed: {}", e);
            set_errno(e.errno());
            failure
        }
    }
}

fn handle(fd: c_int) -> Result<Handle> {
    Handle::from_raw(fd).ok_or(Error::new(ErrorKind::BadHandle, "negative handle"))
}

fn seek_from(offset: off_t, whence: c_int) -> Result<SeekFrom> {
    let offset = offset as i64;
    match whence {
        libc::SEEK_SET if offset < 0 => {
            Err(Error::new(ErrorKind::InvalidInput, "seek to a negative offset"))
        }
        libc::SEEK_SET => Ok(SeekFrom::Start(offset as u64)),
        libc::SEEK_CUR => Ok(SeekFrom::Current(offset)),
        libc::SEEK_END => Ok(SeekFrom::End(offset)),
        _ => Err(Error::new(ErrorKind::InvalidInput, "unknown whence")),
    }
}

fn transfer_len(count: size_t) -> Result<usize> {
    if count > isize::MAX as usize {
        return Err(Error::new(ErrorKind::InvalidInput, "count exceeds ssize_t"));
    }
    Ok(count)
}

/// C API: vtpc_open
///
/// 打开文件，返回逻辑句柄；失败返回 -1 并设置 errno。
///
/// # Safety
///
/// `path` 必须为空指针或指向以 NUL 结尾的有效字符串
#[no_mangle]
pub unsafe extern "C" fn vtpc_open(path: *const c_char, flags: c_int, mode: c_int) -> c_int {
    if path.is_null() {
        set_errno(libc::EFAULT);
        return -1;
    }
    // SAFETY: 调用者保证 path 有效
    let path = unsafe { CStr::from_ptr(path) };
    let path = Path::new(OsStr::from_bytes(path.to_bytes()));

    let result = with_manager(|m| m.open(path, OpenFlags::from_raw(flags), mode as u32));
    report(result.map(|h| h.as_raw()), -1)
}

/// C API: vtpc_close
///
/// 同步并关闭句柄。
#[no_mangle]
pub extern "C" fn vtpc_close(fd: c_int) -> c_int {
    report(with_manager(|m| m.close(handle(fd)?)).map(|()| 0), -1)
}

/// C API: vtpc_read
///
/// 从句柄游标处读取最多 `count` 字节。
///
/// # Safety
///
/// `buf` 必须指向至少 `count` 字节的可写内存（`count` 为 0 时可为空指针）
#[no_mangle]
pub unsafe extern "C" fn vtpc_read(fd: c_int, buf: *mut c_void, count: size_t) -> ssize_t {
    let result = with_manager(|m| {
        let h = handle(fd)?;
        let len = transfer_len(count)?;
        if len == 0 {
            return m.read(h, &mut []);
        }
        if buf.is_null() {
            return Err(Error::new(ErrorKind::InvalidInput, "null buffer"));
        }
        // SAFETY: 调用者保证 buf 指向 count 字节的可写内存
        let buf = unsafe { core::slice::from_raw_parts_mut(buf.cast::<u8>(), len) };
        m.read(h, buf)
    });
    report(result.map(|n| n as ssize_t), -1)
}

/// C API: vtpc_write
///
/// 从句柄游标处写入 `count` 字节。
///
/// # Safety
///
/// `buf` 必须指向至少 `count` 字节的可读内存（`count` 为 0 时可为空指针）
#[no_mangle]
pub unsafe extern "C" fn vtpc_write(fd: c_int, buf: *const c_void, count: size_t) -> ssize_t {
    let result = with_manager(|m| {
        let h = handle(fd)?;
        let len = transfer_len(count)?;
        if len == 0 {
            return m.write(h, &[]);
        }
        if buf.is_null() {
            return Err(Error::new(ErrorKind::InvalidInput, "null buffer"));
        }
        // SAFETY: 调用者保证 buf 指向 count 字节的可读内存
        let buf = unsafe { core::slice::from_raw_parts(buf.cast::<u8>(), len) };
        m.write(h, buf)
    });
    report(result.map(|n| n as ssize_t), -1)
}

/// C API: vtpc_lseek
///
/// 移动游标，不做 I/O。
#[no_mangle]
pub extern "C" fn vtpc_lseek(fd: c_int, offset: off_t, whence: c_int) -> off_t {
    let result = with_manager(|m| {
        let h = handle(fd)?;
        // 先校验句柄，再校验 whence
        m.position(h)?;
        m.seek(h, seek_from(offset, whence)?)
    });
    report(result.map(|pos| pos as off_t), -1)
}

/// C API: vtpc_fsync
///
/// 写回脏块并持久化。
#[no_mangle]
pub extern "C" fn vtpc_fsync(fd: c_int) -> c_int {
    report(with_manager(|m| m.sync(handle(fd)?)).map(|()| 0), -1)
}
