//! 逻辑句柄表
//!
//! 句柄下标返回给调用者，与底层描述符相互独立；下标只在显式关闭后才会复用。

use crate::block::{BlockFile, Descriptor, OpenFlags};
use crate::error::{Error, ErrorKind, Result};
use std::io::SeekFrom;

/// 逻辑文件句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(usize);

impl Handle {
    /// 由 C 风格的整数句柄构造，负数返回 `None`
    pub fn from_raw(raw: i32) -> Option<Self> {
        usize::try_from(raw).ok().map(Self)
    }

    /// 句柄下标
    pub const fn index(&self) -> usize {
        self.0
    }

    /// 转换为 C 风格的整数句柄
    pub fn as_raw(&self) -> i32 {
        // 句柄表容量远小于 i32::MAX
        self.0 as i32
    }
}

/// 已绑定句柄的状态
#[derive(Debug)]
pub struct OpenFile<F> {
    pub(crate) file: F,
    descriptor: Descriptor,
    cursor: u64,
    size: u64,
    flags: OpenFlags,
}

impl<F: BlockFile> OpenFile<F> {
    /// 绑定刚打开的底层文件，游标归零，大小取文件当前长度
    pub fn new(file: F, flags: OpenFlags) -> Result<Self> {
        let size = file.size()?;
        Ok(Self {
            descriptor: file.descriptor(),
            file,
            cursor: 0,
            size,
            flags,
        })
    }
}

impl<F> OpenFile<F> {
    /// 底层描述符
    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    /// 当前游标
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// 跟踪的逻辑文件大小
    pub fn size(&self) -> u64 {
        self.size
    }

    /// 打开标志
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    /// 游标前移 `n` 字节，越过逻辑大小时扩展大小
    pub(crate) fn advance(&mut self, n: usize, extend: bool) {
        self.cursor += n as u64;
        if extend && self.cursor > self.size {
            self.size = self.cursor;
        }
    }

    pub(crate) fn set_cursor(&mut self, cursor: u64) {
        self.cursor = cursor;
    }

    /// 计算新游标并更新，不做任何 I/O
    ///
    /// 结果为负时返回 `InvalidInput`，游标保持不变。
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(offset) => (0i128, offset as i128),
            SeekFrom::Current(delta) => (self.cursor as i128, delta as i128),
            SeekFrom::End(delta) => (self.size as i128, delta as i128),
        };
        let target = base + delta;

        if target < 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "seek to a negative offset"));
        }
        if target > i64::MAX as i128 {
            return Err(Error::new(ErrorKind::InvalidInput, "seek offset overflows off_t"));
        }

        self.cursor = target as u64;
        Ok(self.cursor)
    }
}

/// 句柄表
///
/// 固定容量，下标空闲时为 `None`。
#[derive(Debug)]
pub struct HandleTable<F> {
    entries: Vec<Option<OpenFile<F>>>,
}

impl<F> HandleTable<F> {
    /// 创建全空闲的句柄表
    pub fn new(capacity: usize) -> Self {
        let mut entries = Vec::with_capacity(capacity);
        entries.resize_with(capacity, || None);
        Self { entries }
    }

    /// 容量
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// 已绑定的句柄数
    pub fn open_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// 第一个空闲下标
    pub fn first_free(&self) -> Option<usize> {
        self.entries.iter().position(|e| e.is_none())
    }

    /// 绑定到第一个空闲下标
    ///
    /// # 错误
    ///
    /// 没有空闲下标时返回 `TooManyOpenFiles`
    pub fn bind(&mut self, open: OpenFile<F>) -> Result<Handle> {
        let index = self.first_free().ok_or(Error::new(
            ErrorKind::TooManyOpenFiles,
            "handle table is full",
        ))?;
        self.entries[index] = Some(open);
        Ok(Handle(index))
    }

    /// 查询已绑定句柄
    pub fn get(&self, handle: Handle) -> Result<&OpenFile<F>> {
        self.entries
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(Error::new(ErrorKind::BadHandle, "handle is not open"))
    }

    /// 查询已绑定句柄（可写）
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut OpenFile<F>> {
        self.entries
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(Error::new(ErrorKind::BadHandle, "handle is not open"))
    }

    /// 按底层描述符查找
    pub fn by_descriptor_mut(&mut self, descriptor: Descriptor) -> Option<&mut OpenFile<F>> {
        self.entries
            .iter_mut()
            .flatten()
            .find(|open| open.descriptor == descriptor)
    }

    /// 释放句柄，返回其状态
    pub fn release(&mut self, handle: Handle) -> Result<OpenFile<F>> {
        self.entries
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(Error::new(ErrorKind::BadHandle, "handle is not open"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::mock::MockStorage;
    use crate::block::Storage;
    use std::path::Path;

    fn open_file(storage: &mut MockStorage, path: &str) -> OpenFile<crate::block::mock::MockFile> {
        let file = storage
            .open(Path::new(path), OpenFlags::RDWR | OpenFlags::CREAT, 0o644)
            .unwrap();
        OpenFile::new(file, OpenFlags::RDWR).unwrap()
    }

    #[test]
    fn test_bind_and_release() {
        let mut storage = MockStorage::new();
        let mut table = HandleTable::new(2);

        let a = table.bind(open_file(&mut storage, "/a")).unwrap();
        let b = table.bind(open_file(&mut storage, "/b")).unwrap();
        assert_eq!((a.index(), b.index()), (0, 1));
        assert_eq!(table.open_count(), 2);

        let err = table.bind(open_file(&mut storage, "/c")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyOpenFiles);

        table.release(a).unwrap();
        assert_eq!(table.get(a).unwrap_err().kind(), ErrorKind::BadHandle);
        assert_eq!(table.release(a).unwrap_err().kind(), ErrorKind::BadHandle);

        // 释放后的下标被复用
        let c = table.bind(open_file(&mut storage, "/c")).unwrap();
        assert_eq!(c.index(), 0);
    }

    #[test]
    fn test_initial_size_from_file() {
        let mut storage = MockStorage::new();
        storage.insert("/data", vec![7u8; 5000]);
        let open = open_file(&mut storage, "/data");
        assert_eq!(open.size(), 5000);
        assert_eq!(open.cursor(), 0);
    }

    #[test]
    fn test_by_descriptor() {
        let mut storage = MockStorage::new();
        let mut table = HandleTable::new(4);
        table.bind(open_file(&mut storage, "/a")).unwrap();
        let b = table.bind(open_file(&mut storage, "/b")).unwrap();

        let fd = table.get(b).unwrap().descriptor();
        assert_eq!(table.by_descriptor_mut(fd).unwrap().descriptor(), fd);
        assert!(table.by_descriptor_mut(-1).is_none());
    }

    #[test]
    fn test_seek_modes() {
        let mut storage = MockStorage::new();
        storage.insert("/data", vec![0u8; 100]);
        let mut open = open_file(&mut storage, "/data");

        assert_eq!(open.seek(SeekFrom::Start(10)).unwrap(), 10);
        assert_eq!(open.seek(SeekFrom::Current(5)).unwrap(), 15);
        assert_eq!(open.seek(SeekFrom::Current(-15)).unwrap(), 0);
        assert_eq!(open.seek(SeekFrom::End(0)).unwrap(), 100);
        assert_eq!(open.seek(SeekFrom::End(50)).unwrap(), 150);

        let err = open.seek(SeekFrom::End(-101)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(open.cursor(), 150);
    }

    #[test]
    fn test_raw_handle() {
        assert_eq!(Handle::from_raw(-1), None);
        assert_eq!(Handle::from_raw(3).unwrap().index(), 3);
        assert_eq!(Handle::from_raw(3).unwrap().as_raw(), 3);
    }
}
