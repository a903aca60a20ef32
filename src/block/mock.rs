//! 测试用内存存储
//!
//! 记录每一次底层操作，并可以注入读写失败。

use super::device::{BlockFile, Descriptor, OpenFlags, Storage};
use crate::error::Result;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Default)]
struct Inner {
    files: RefCell<HashMap<PathBuf, Vec<u8>>>,
    next_fd: Cell<Descriptor>,
    reads: Cell<u64>,
    writes: Cell<u64>,
    syncs: Cell<u64>,
    resizes: Cell<u64>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
    fail_resize: Cell<bool>,
    fail_sync: Cell<bool>,
}

fn eio() -> std::io::Error {
    std::io::Error::from_raw_os_error(libc::EIO)
}

/// 内存存储，克隆后共享同一份文件与计数
#[derive(Debug, Clone, Default)]
pub(crate) struct MockStorage {
    inner: Rc<Inner>,
}

impl MockStorage {
    pub(crate) fn new() -> Self {
        let storage = Self::default();
        storage.inner.next_fd.set(3);
        storage
    }

    /// 预置文件内容
    pub(crate) fn insert(&self, path: &str, data: Vec<u8>) {
        self.inner.files.borrow_mut().insert(PathBuf::from(path), data);
    }

    /// 读取文件当前内容
    pub(crate) fn contents(&self, path: &str) -> Vec<u8> {
        self.inner
            .files
            .borrow()
            .get(Path::new(path))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn reads(&self) -> u64 {
        self.inner.reads.get()
    }

    pub(crate) fn writes(&self) -> u64 {
        self.inner.writes.get()
    }

    pub(crate) fn syncs(&self) -> u64 {
        self.inner.syncs.get()
    }

    pub(crate) fn resizes(&self) -> u64 {
        self.inner.resizes.get()
    }

    pub(crate) fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.set(fail);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.set(fail);
    }

    pub(crate) fn fail_resize(&self, fail: bool) {
        self.inner.fail_resize.set(fail);
    }

    pub(crate) fn fail_sync(&self, fail: bool) {
        self.inner.fail_sync.set(fail);
    }
}

impl Storage for MockStorage {
    type File = MockFile;

    fn open(&mut self, path: &Path, flags: OpenFlags, _mode: u32) -> Result<MockFile> {
        let mut files = self.inner.files.borrow_mut();
        let exists = files.contains_key(path);
        if exists && flags.contains(OpenFlags::CREAT | OpenFlags::EXCL) {
            return Err(std::io::Error::from_raw_os_error(libc::EEXIST).into());
        }
        if !exists && !flags.contains(OpenFlags::CREAT) {
            return Err(std::io::Error::from_raw_os_error(libc::ENOENT).into());
        }
        let data = files.entry(path.to_path_buf()).or_default();
        if flags.contains(OpenFlags::TRUNC) {
            data.clear();
        }
        drop(files);

        let fd = self.inner.next_fd.get();
        self.inner.next_fd.set(fd + 1);
        Ok(MockFile {
            inner: self.inner.clone(),
            path: path.to_path_buf(),
            fd,
        })
    }
}

#[derive(Debug)]
pub(crate) struct MockFile {
    inner: Rc<Inner>,
    path: PathBuf,
    fd: Descriptor,
}

impl MockFile {
    fn with_data<T>(&self, f: impl FnOnce(&mut Vec<u8>) -> T) -> T {
        let mut files = self.inner.files.borrow_mut();
        let data = files.entry(self.path.clone()).or_default();
        f(data)
    }
}

impl BlockFile for MockFile {
    fn descriptor(&self) -> Descriptor {
        self.fd
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        self.inner.reads.set(self.inner.reads.get() + 1);
        if self.inner.fail_reads.get() {
            return Err(eio().into());
        }
        Ok(self.with_data(|data| {
            let start = (offset as usize).min(data.len());
            let n = buf.len().min(data.len() - start);
            buf[..n].copy_from_slice(&data[start..start + n]);
            n
        }))
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize> {
        self.inner.writes.set(self.inner.writes.get() + 1);
        if self.inner.fail_writes.get() {
            return Err(eio().into());
        }
        Ok(self.with_data(|data| {
            let start = offset as usize;
            if data.len() < start + buf.len() {
                data.resize(start + buf.len(), 0);
            }
            data[start..start + buf.len()].copy_from_slice(buf);
            buf.len()
        }))
    }

    fn size(&self) -> Result<u64> {
        Ok(self.with_data(|data| data.len() as u64))
    }

    fn sync(&mut self) -> Result<()> {
        self.inner.syncs.set(self.inner.syncs.get() + 1);
        if self.inner.fail_sync.get() {
            return Err(eio().into());
        }
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.inner.resizes.set(self.inner.resizes.get() + 1);
        if self.inner.fail_resize.get() {
            return Err(eio().into());
        }
        self.with_data(|data| data.resize(len as usize, 0));
        Ok(())
    }
}
