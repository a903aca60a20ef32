//! 缓存管理器
//!
//! 对外提供 open/close/read/write/seek/sync 六个原语，语义模仿文件描述符，
//! 内部把每次读写拆成按块对齐的槽位池操作。
//!
//! 槽位池和句柄表彼此不引用，只有管理器负责把句柄的底层描述符
//! 与标记了该描述符的槽位对应起来。

use super::handle::{Handle, HandleTable, OpenFile};
use crate::block::{BlockFile, OpenFlags, Storage};
use crate::cache::{BlockKey, CacheStats, SlotPool};
use crate::consts::{BLOCK_SIZE, CACHE_CAPACITY, MAX_OPEN_FILES};
use crate::error::{Error, ErrorKind, Result};
use std::io::SeekFrom;
use std::path::Path;

/// 缓存管理器
///
/// 槽位池与句柄表在第一次 `open` 时才分配，此后一直保留到管理器被丢弃。
///
/// # 并发使用
///
/// 管理器不含任何内部锁，所有调用都是同步阻塞的。
/// 多线程环境下调用者必须自行串行化访问，例如包在 `Mutex` 里。
///
/// # 示例
///
/// ```rust,ignore
/// use std::io::SeekFrom;
/// use vtpc_core::{CacheManager, DirectStorage, OpenFlags};
///
/// let mut cache = CacheManager::new(DirectStorage::new());
/// let fd = cache.open("/data/bench.bin", OpenFlags::RDWR | OpenFlags::CREAT, 0o644)?;
/// cache.write(fd, b"hello")?;
/// cache.seek(fd, SeekFrom::Start(0))?;
/// let mut buf = [0u8; 5];
/// cache.read(fd, &mut buf)?;
/// cache.close(fd)?;
/// ```
pub struct CacheManager<S: Storage> {
    storage: S,
    capacity: usize,
    pub(super) pool: Option<SlotPool>,
    pub(super) handles: Option<HandleTable<S::File>>,
}

impl<S: Storage> CacheManager<S> {
    /// 创建管理器（不分配槽位池）
    pub fn new(storage: S) -> Self {
        Self::with_pool_capacity(storage, CACHE_CAPACITY)
    }

    /// 使用非默认池容量创建管理器，仅供测试构造小池
    pub(crate) fn with_pool_capacity(storage: S, capacity: usize) -> Self {
        Self {
            storage,
            capacity,
            pool: None,
            handles: None,
        }
    }

    /// 底层存储
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if self.pool.is_none() {
            let pool = SlotPool::new(self.capacity).map_err(|e| {
                log::error!("[VTPC] slot pool allocation failed: {}", e);
                Error::new(ErrorKind::OutOfMemory, "failed to allocate slot pool")
            })?;
            self.pool = Some(pool);
        }
        if self.handles.is_none() {
            self.handles = Some(HandleTable::new(MAX_OPEN_FILES));
        }
        Ok(())
    }

    /// 同时借出槽位池与句柄表
    ///
    /// 尚未初始化说明从未成功打开过文件，任何句柄都无效。
    pub(super) fn parts(&mut self) -> Result<(&mut SlotPool, &mut HandleTable<S::File>)> {
        match (self.pool.as_mut(), self.handles.as_mut()) {
            (Some(pool), Some(handles)) => Ok((pool, handles)),
            _ => Err(Error::new(ErrorKind::BadHandle, "handle is not open")),
        }
    }

    fn handles(&self) -> Result<&HandleTable<S::File>> {
        self.handles
            .as_ref()
            .ok_or(Error::new(ErrorKind::BadHandle, "handle is not open"))
    }

    /// 打开文件
    ///
    /// 绑定第一个空闲句柄，游标归零，逻辑大小取文件当前长度。
    /// 第一次调用时分配槽位池与句柄表。
    ///
    /// # 错误
    ///
    /// - 槽位池分配失败：`OutOfMemory`
    /// - 没有空闲句柄：`TooManyOpenFiles`
    /// - 底层 open 或大小查询失败：原样返回
    pub fn open(&mut self, path: impl AsRef<Path>, flags: OpenFlags, mode: u32) -> Result<Handle> {
        self.ensure_initialized()?;
        let path = path.as_ref();

        // 先确认有空闲句柄再打开底层文件
        if self.handles()?.first_free().is_none() {
            log::warn!("[VTPC] open {}: handle table is full", path.display());
            return Err(Error::new(ErrorKind::TooManyOpenFiles, "handle table is full"));
        }

        let file = self.storage.open(path, flags, mode)?;
        let open = OpenFile::new(file, flags)?;
        let (descriptor, size) = (open.descriptor(), open.size());

        let (_, handles) = self.parts()?;
        let handle = handles.bind(open)?;
        log::debug!(
            "[VTPC] open {} -> handle={} fd={} size={}",
            path.display(),
            handle.index(),
            descriptor,
            size
        );
        Ok(handle)
    }

    /// 关闭句柄
    ///
    /// 先对该句柄执行完整的 [`sync`](Self::sync)，无论结果如何都会使其所有槽位失效、
    /// 关闭底层描述符并释放句柄。同步失败的错误在释放之后返回。
    ///
    /// 底层描述符随文件对象一起丢弃，操作系统 `close` 的错误不会上报。
    pub fn close(&mut self, handle: Handle) -> Result<()> {
        self.handles()?.get(handle)?;

        let synced = self.sync(handle);
        if let Err(e) = &synced {
            log::warn!("[VTPC] close handle={}: sync failed: {}", handle.index(), e);
        }

        let (pool, handles) = self.parts()?;
        let open = handles.release(handle)?;
        let invalidated = pool.invalidate_owner(open.descriptor());
        log::debug!(
            "[VTPC] close handle={} fd={}, {} slots invalidated",
            handle.index(),
            open.descriptor(),
            invalidated
        );
        // 丢弃底层文件即关闭描述符
        drop(open);

        synced
    }

    /// 移动游标
    ///
    /// 只更新整数游标，不做任何 I/O。允许越过逻辑大小，
    /// 之后的读取返回 0，直到写入扩展了大小。
    ///
    /// # 错误
    ///
    /// 结果为负时返回 `InvalidInput`，游标保持不变
    pub fn seek(&mut self, handle: Handle, pos: SeekFrom) -> Result<u64> {
        let (_, handles) = self.parts()?;
        handles.get_mut(handle)?.seek(pos)
    }

    /// 同步句柄
    ///
    /// 1. 写回该描述符的所有脏槽位，单块失败只记录日志并继续
    /// 2. 对描述符执行持久化同步
    /// 3. 把底层文件长度调整为跟踪的逻辑大小，失败只记录日志
    ///
    /// 没有脏槽位时不产生任何写回 I/O。
    ///
    /// # 错误
    ///
    /// 任一块写回失败或持久化同步失败时返回错误
    pub fn sync(&mut self, handle: Handle) -> Result<()> {
        let (pool, handles) = self.parts()?;
        let open = handles.get_mut(handle)?;
        let descriptor = open.descriptor();

        let outcome = pool.flush_owner(descriptor, |key, data| write_block(&mut open.file, key, data));

        open.file.sync()?;

        let size = open.size();
        if let Err(e) = open.file.set_len(size) {
            log::error!("[VTPC] resize fd={} to {} failed: {}", descriptor, size, e);
        }

        if outcome.failed > 0 {
            return Err(Error::new(ErrorKind::Io, "failed to write back dirty blocks"));
        }
        Ok(())
    }

    /// 当前游标
    pub fn position(&self, handle: Handle) -> Result<u64> {
        Ok(self.handles()?.get(handle)?.cursor())
    }

    /// 跟踪的逻辑文件大小
    pub fn len(&self, handle: Handle) -> Result<u64> {
        Ok(self.handles()?.get(handle)?.size())
    }

    /// 打开时给出的标志
    pub fn flags(&self, handle: Handle) -> Result<OpenFlags> {
        Ok(self.handles()?.get(handle)?.flags())
    }

    /// 块 `block` 当前是否在缓存中
    pub fn is_resident(&self, handle: Handle, block: u64) -> Result<bool> {
        let descriptor = self.handles()?.get(handle)?.descriptor();
        Ok(self.pool.as_ref().map_or(false, |pool| {
            pool.slots()
                .iter()
                .any(|slot| slot.key() == Some(BlockKey::new(descriptor, block)))
        }))
    }

    /// 已打开的句柄数
    pub fn open_count(&self) -> usize {
        self.handles.as_ref().map_or(0, HandleTable::open_count)
    }

    /// 缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.pool
            .as_ref()
            .map(|pool| pool.stats().clone())
            .unwrap_or_default()
    }
}

impl<S: Storage> core::fmt::Debug for CacheManager<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CacheManager")
            .field("capacity", &self.capacity)
            .field("initialized", &self.pool.is_some())
            .field("open_count", &self.open_count())
            .field("pool", &self.pool)
            .finish()
    }
}

/// 把一个完整块写回到块对齐的偏移
pub(super) fn write_block<F: BlockFile>(file: &mut F, key: BlockKey, data: &[u8]) -> Result<()> {
    let written = file.write_at(data, key.byte_offset())?;
    if written != BLOCK_SIZE {
        return Err(Error::new(ErrorKind::Io, "short block write"));
    }
    Ok(())
}

/// 回收一个槽位，脏块写回到其所属文件
pub(super) fn reclaim_slot<F: BlockFile>(pool: &mut SlotPool, handles: &mut HandleTable<F>) -> usize {
    pool.reclaim(|key, data| match handles.by_descriptor_mut(key.owner) {
        Some(open) => write_block(&mut open.file, key, data),
        None => Err(Error::new(ErrorKind::BadHandle, "evicted block has no open owner")),
    })
}
