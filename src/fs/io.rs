//! 读写路径
//!
//! 读写都按块拆分：每一段先在槽位池中查找 (描述符, 块号)，
//! 未命中时回收一个槽位并按需从底层存储填充，然后在槽位与用户缓冲区之间复制。

use super::manager::{reclaim_slot, CacheManager};
use super::handle::Handle;
use crate::block::{BlockFile, OpenFlags, Storage};
use crate::cache::BlockKey;
use crate::consts::{block_index, offset_in_block, BLOCK_SIZE};
use crate::error::{Error, ErrorKind, Result};

impl<S: Storage> CacheManager<S> {
    /// 从游标处读取，最多 `buf.len()` 字节
    ///
    /// 读取范围被截断在跟踪的逻辑大小之内；游标位于文件末尾或之后时返回 0。
    ///
    /// # 返回
    ///
    /// 实际复制的字节数，游标前移同样的量
    ///
    /// # 错误
    ///
    /// 任一块的底层读取失败都会中止整个调用，游标不移动
    pub fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        let (pool, handles) = self.parts()?;
        let open = handles.get(handle)?;
        let (descriptor, cursor, size) = (open.descriptor(), open.cursor(), open.size());

        if cursor >= size {
            return Ok(0);
        }
        let count = (buf.len() as u64).min(size - cursor) as usize;

        let mut done = 0;
        while done < count {
            let pos = cursor + done as u64;
            let key = BlockKey::new(descriptor, block_index(pos));
            let start = offset_in_block(pos);
            let len = (BLOCK_SIZE - start).min(count - done);

            let index = match pool.lookup(key) {
                Some(index) => index,
                None => {
                    let index = reclaim_slot(pool, handles);
                    let file = &mut handles.get_mut(handle)?.file;
                    pool.load(index, key, |data| file.read_at(data, key.byte_offset()))
                        .map_err(|e| {
                            log::error!(
                                "[VTPC] read fd={} block={} failed: {}",
                                descriptor,
                                key.index,
                                e
                            );
                            e
                        })?;
                    index
                }
            };

            buf[done..done + len].copy_from_slice(&pool.slot(index).data()[start..start + len]);
            done += len;
        }

        handles.get_mut(handle)?.advance(done, false);
        log::trace!("[VTPC] read fd={} offset={} len={}", descriptor, cursor, done);
        Ok(done)
    }

    /// 从游标处写入 `buf`
    ///
    /// 数据只写进槽位并标记为脏，写回发生在同步、关闭或驱逐时。
    /// 游标越过逻辑大小时扩展大小。以 `APPEND` 打开的句柄先把游标移到逻辑末尾。
    ///
    /// 未命中时：
    /// - 只覆盖块的一部分：先读入原有内容，保留未覆盖的字节；读取失败则整块清零
    /// - 覆盖整个块：跳过读取，槽位中的旧数据马上被完整替换
    ///
    /// 扩展区域内的块如果在写入前就被驱逐，之后读到的内容取决于驱逐时机
    /// （落盘时的零填充或底层文件的空洞），并不保证一定为零。这是已知行为。
    ///
    /// # 返回
    ///
    /// 写入的字节数
    pub fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        let (pool, handles) = self.parts()?;
        let open = handles.get_mut(handle)?;
        if open.flags().contains(OpenFlags::APPEND) {
            let end = open.size();
            open.set_cursor(end);
        }
        let (descriptor, cursor) = (open.descriptor(), open.cursor());

        if cursor.checked_add(buf.len() as u64).map_or(true, |end| end > i64::MAX as u64) {
            return Err(Error::new(ErrorKind::InvalidInput, "write would overflow off_t"));
        }

        let mut done = 0;
        while done < buf.len() {
            let pos = cursor + done as u64;
            let key = BlockKey::new(descriptor, block_index(pos));
            let start = offset_in_block(pos);
            let len = (BLOCK_SIZE - start).min(buf.len() - done);

            let index = match pool.lookup(key) {
                Some(index) => index,
                None => {
                    let index = reclaim_slot(pool, handles);
                    if len < BLOCK_SIZE {
                        let file = &mut handles.get_mut(handle)?.file;
                        pool.load_or_zero(index, key, |data| file.read_at(data, key.byte_offset()));
                    } else {
                        // 整块覆盖，无需预读
                        pool.claim(index, key);
                    }
                    index
                }
            };

            let slot = pool.slot_mut(index);
            slot.data_mut()[start..start + len].copy_from_slice(&buf[done..done + len]);
            slot.mark_dirty();
            done += len;
        }

        handles.get_mut(handle)?.advance(done, true);
        log::trace!("[VTPC] write fd={} offset={} len={}", descriptor, cursor, done);
        Ok(done)
    }
}
