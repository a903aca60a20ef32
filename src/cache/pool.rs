//! 槽位池实现
//!
//! 池在构造时一次性分配所有块缓冲区，之后槽位只在空闲与有效之间切换，
//! 缓冲区本身从不重新分配。

use super::slot::{BlockKey, Slot};
use crate::block::Descriptor;
use crate::consts::BLOCK_SIZE;
use crate::error::{Error, ErrorKind, Result};

/// 驱逐时选择访问频率最高的槽位
///
/// 与 LFU 相反：池满时被回收的是最常被访问的块。
/// 这是缓存对外约定的一部分，压力测试依赖这一行为。
pub const EVICT_MOST_FREQUENT: bool = true;

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 总查找次数
    pub total_accesses: u64,
    /// 命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 从底层存储填充槽位的次数
    pub fills: u64,
    /// 回收有效槽位的次数
    pub evictions: u64,
    /// 脏块写回次数（驱逐与同步）
    pub writebacks: u64,
    /// 写回失败次数
    pub writeback_failures: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_accesses as f64
        }
    }
}

/// 槽位查找接口
///
/// 池在每次填充和释放槽位时通知实现，方便替换成带索引的查找结构。
pub trait SlotLookup {
    /// 查找缓存了 `key` 的有效槽位
    fn find(&self, slots: &[Slot], key: BlockKey) -> Option<usize>;

    /// 槽位 `index` 开始缓存 `key`
    fn filled(&mut self, _index: usize, _key: BlockKey) {}

    /// 槽位 `index` 不再缓存 `key`
    fn released(&mut self, _index: usize, _key: BlockKey) {}
}

/// 线性扫描整个池，O(容量)
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScan;

impl SlotLookup for LinearScan {
    fn find(&self, slots: &[Slot], key: BlockKey) -> Option<usize> {
        slots.iter().position(|slot| slot.key() == Some(key))
    }
}

/// 同步结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    /// 成功写回的块数
    pub written: usize,
    /// 写回失败的块数
    pub failed: usize,
}

/// 槽位池
pub struct SlotPool<L: SlotLookup = LinearScan> {
    slots: Vec<Slot>,
    lookup: L,
    stats: CacheStats,
}

impl SlotPool<LinearScan> {
    /// 创建使用线性扫描的槽位池
    ///
    /// # 错误
    ///
    /// 任一缓冲区分配失败时返回 `OutOfMemory`
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_lookup(capacity, LinearScan)
    }
}

impl<L: SlotLookup> SlotPool<L> {
    /// 使用指定查找实现创建槽位池
    pub fn with_lookup(capacity: usize, lookup: L) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "slot pool capacity must be non-zero",
            ));
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| Error::new(ErrorKind::OutOfMemory, "failed to allocate slot table"))?;
        for _ in 0..capacity {
            slots.push(Slot::new()?);
        }

        log::debug!(
            "[CACHE] slot pool ready: {} slots x {} bytes",
            capacity,
            BLOCK_SIZE
        );
        Ok(Self {
            slots,
            lookup,
            stats: CacheStats::default(),
        })
    }

    /// 槽位总数
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 有效槽位数
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_valid()).count()
    }

    /// 是否没有任何有效槽位
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 脏槽位数
    pub fn dirty_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_dirty()).count()
    }

    /// 所有槽位
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// 第 `index` 个槽位
    pub fn slot(&self, index: usize) -> &Slot {
        &self.slots[index]
    }

    /// 第 `index` 个槽位（可写）
    pub fn slot_mut(&mut self, index: usize) -> &mut Slot {
        &mut self.slots[index]
    }

    /// 统计信息
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// 查找块，命中时访问频率加一
    pub fn lookup(&mut self, key: BlockKey) -> Option<usize> {
        self.stats.total_accesses += 1;
        match self.lookup.find(&self.slots, key) {
            Some(index) => {
                self.stats.hits += 1;
                self.slots[index].touch();
                log::trace!(
                    "[CACHE] hit fd={} block={} slot={} freq={}",
                    key.owner,
                    key.index,
                    index,
                    self.slots[index].frequency()
                );
                Some(index)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// 选出驱逐对象，不修改任何状态
    ///
    /// 第一个空闲槽位优先；池满时取频率最高者，相同频率取下标最小者。
    pub fn select_victim(&self) -> usize {
        let mut victim = 0;
        let mut best = 0;
        for (index, slot) in self.slots.iter().enumerate() {
            if !slot.is_valid() {
                return index;
            }
            let freq = slot.frequency();
            let better = if EVICT_MOST_FREQUENT {
                freq > best
            } else {
                freq < best
            };
            if index == 0 || better {
                victim = index;
                best = freq;
            }
        }
        victim
    }

    /// 回收一个槽位供新块使用
    ///
    /// 被选中的槽位如果是脏的，先交给 `write_back` 写回。
    /// 写回失败只记录日志，槽位照样回收，块中修改随之丢失。
    ///
    /// # 返回
    ///
    /// 已重置为空闲的槽位下标
    pub fn reclaim<W>(&mut self, write_back: W) -> usize
    where
        W: FnOnce(BlockKey, &[u8]) -> Result<()>,
    {
        let index = self.select_victim();
        let slot = &mut self.slots[index];

        if let Some(key) = slot.key() {
            if slot.is_dirty() {
                match write_back(key, slot.data()) {
                    Ok(()) => self.stats.writebacks += 1,
                    Err(e) => {
                        self.stats.writeback_failures += 1;
                        log::error!(
                            "[CACHE] eviction write-back failed fd={} block={}: {}",
                            key.owner,
                            key.index,
                            e
                        );
                    }
                }
            }
            log::debug!(
                "[CACHE] evict slot={} fd={} block={} freq={} dirty={}",
                index,
                key.owner,
                key.index,
                slot.frequency(),
                slot.is_dirty()
            );
            slot.reset();
            self.lookup.released(index, key);
            self.stats.evictions += 1;
        }

        index
    }

    /// 从底层存储填充空闲槽位
    ///
    /// `read` 读到的字节数不足一个块时，剩余部分清零。
    /// 读取失败时槽位保持空闲，错误原样返回。
    pub fn load<R>(&mut self, index: usize, key: BlockKey, read: R) -> Result<()>
    where
        R: FnOnce(&mut [u8]) -> Result<usize>,
    {
        let slot = &mut self.slots[index];
        let n = read(slot.data_mut())?;
        slot.data_mut()[n.min(BLOCK_SIZE)..].fill(0);
        self.occupy(index, key);
        self.stats.fills += 1;
        Ok(())
    }

    /// 为部分块写入填充空闲槽位
    ///
    /// 与 [`SlotPool::load`] 相同，但读取失败时整块清零而不是报错。
    pub fn load_or_zero<R>(&mut self, index: usize, key: BlockKey, read: R)
    where
        R: FnOnce(&mut [u8]) -> Result<usize>,
    {
        let slot = &mut self.slots[index];
        match read(slot.data_mut()) {
            Ok(n) => slot.data_mut()[n.min(BLOCK_SIZE)..].fill(0),
            Err(e) => {
                log::debug!(
                    "[CACHE] pre-read failed fd={} block={}, zero-filling: {}",
                    key.owner,
                    key.index,
                    e
                );
                slot.data_mut().fill(0);
            }
        }
        self.occupy(index, key);
        self.stats.fills += 1;
    }

    /// 不读底层存储直接占用空闲槽位
    ///
    /// 仅用于整块覆盖写：缓冲区里残留的旧数据马上会被完整替换。
    pub fn claim(&mut self, index: usize, key: BlockKey) {
        self.occupy(index, key);
    }

    fn occupy(&mut self, index: usize, key: BlockKey) {
        debug_assert!(!self.slots[index].is_valid());
        self.slots[index].occupy(key);
        self.lookup.filled(index, key);
    }

    /// 写回 `owner` 的所有脏槽位
    ///
    /// 单个块写回失败不会中止，剩余块照常处理；失败的块保持脏状态。
    pub fn flush_owner<W>(&mut self, owner: Descriptor, mut write_back: W) -> FlushOutcome
    where
        W: FnMut(BlockKey, &[u8]) -> Result<()>,
    {
        let mut outcome = FlushOutcome::default();

        for slot in self.slots.iter_mut() {
            let key = match slot.key() {
                Some(key) if key.owner == owner && slot.is_dirty() => key,
                _ => continue,
            };
            match write_back(key, slot.data()) {
                Ok(()) => {
                    slot.mark_clean();
                    outcome.written += 1;
                    self.stats.writebacks += 1;
                }
                Err(e) => {
                    outcome.failed += 1;
                    self.stats.writeback_failures += 1;
                    log::error!(
                        "[CACHE] write-back failed fd={} block={}: {}",
                        key.owner,
                        key.index,
                        e
                    );
                }
            }
        }

        log::debug!(
            "[CACHE] flushed fd={}: {} written, {} failed",
            owner,
            outcome.written,
            outcome.failed
        );
        outcome
    }

    /// 使 `owner` 的所有槽位失效（不写回）
    ///
    /// # 返回
    ///
    /// 失效的槽位数
    pub fn invalidate_owner(&mut self, owner: Descriptor) -> usize {
        let mut invalidated = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(key) = slot.key() {
                if key.owner == owner {
                    slot.reset();
                    self.lookup.released(index, key);
                    invalidated += 1;
                }
            }
        }
        invalidated
    }
}

impl<L: SlotLookup> core::fmt::Debug for SlotPool<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SlotPool")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("dirty_count", &self.dirty_count())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(pool: &mut SlotPool, owner: Descriptor, index: u64) -> usize {
        let slot = pool.reclaim(|_, _| Ok(()));
        pool.load(slot, BlockKey::new(owner, index), |buf| {
            buf.fill(index as u8);
            Ok(BLOCK_SIZE)
        })
        .unwrap();
        slot
    }

    #[test]
    fn test_pool_creation() {
        let pool = SlotPool::new(8).unwrap();
        assert_eq!(pool.capacity(), 8);
        assert!(pool.is_empty());
        assert_eq!(pool.dirty_count(), 0);
        assert!(SlotPool::new(0).is_err());
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let mut pool = SlotPool::new(4).unwrap();
        assert_eq!(pool.lookup(BlockKey::new(3, 0)), None);

        let slot = fill(&mut pool, 3, 0);
        assert_eq!(pool.lookup(BlockKey::new(3, 0)), Some(slot));
        assert_eq!(pool.slot(slot).frequency(), 2);

        // 同块号不同文件不命中
        assert_eq!(pool.lookup(BlockKey::new(4, 0)), None);

        let stats = pool.stats();
        assert_eq!(stats.total_accesses, 3);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_free_slot_preferred() {
        let mut pool = SlotPool::new(4).unwrap();
        assert_eq!(fill(&mut pool, 3, 0), 0);
        assert_eq!(fill(&mut pool, 3, 1), 1);

        // 0 号被访问多次，但仍有空闲槽位，不会被驱逐
        for _ in 0..10 {
            pool.lookup(BlockKey::new(3, 0));
        }
        assert_eq!(pool.select_victim(), 2);
        assert_eq!(pool.stats().evictions, 0);
    }

    #[test]
    fn test_evicts_most_frequent() {
        let mut pool = SlotPool::new(4).unwrap();
        for block in 0..4 {
            fill(&mut pool, 3, block);
        }
        pool.lookup(BlockKey::new(3, 1));
        pool.lookup(BlockKey::new(3, 2));
        pool.lookup(BlockKey::new(3, 2));

        // 频率：[1, 2, 3, 1]，驱逐最热的 2 号块
        assert_eq!(pool.select_victim(), 2);
        let slot = pool.reclaim(|_, _| Ok(()));
        assert_eq!(slot, 2);
        assert!(!pool.slot(2).is_valid());
        assert_eq!(pool.slot(2).frequency(), 0);
        assert_eq!(pool.stats().evictions, 1);
    }

    #[test]
    fn test_eviction_tie_takes_lowest_index() {
        let mut pool = SlotPool::new(3).unwrap();
        for block in 0..3 {
            fill(&mut pool, 3, block);
        }
        assert_eq!(pool.select_victim(), 0);

        pool.lookup(BlockKey::new(3, 1));
        pool.lookup(BlockKey::new(3, 2));
        assert_eq!(pool.select_victim(), 1);
    }

    #[test]
    fn test_dirty_victim_written_back() {
        let mut pool = SlotPool::new(1).unwrap();
        let slot = fill(&mut pool, 3, 9);
        pool.slot_mut(slot).data_mut()[0] = 0xAB;
        pool.slot_mut(slot).mark_dirty();

        let mut written = None;
        pool.reclaim(|key, data| {
            written = Some((key, data[0]));
            Ok(())
        });
        assert_eq!(written, Some((BlockKey::new(3, 9), 0xAB)));
        assert_eq!(pool.stats().writebacks, 1);
    }

    #[test]
    fn test_failed_write_back_still_reclaims() {
        let mut pool = SlotPool::new(1).unwrap();
        let slot = fill(&mut pool, 3, 0);
        pool.slot_mut(slot).mark_dirty();

        let reclaimed =
            pool.reclaim(|_, _| Err(Error::new(ErrorKind::Io, "device gone")));
        assert_eq!(reclaimed, slot);
        assert!(!pool.slot(slot).is_valid());
        assert!(!pool.slot(slot).is_dirty());
        assert_eq!(pool.stats().writeback_failures, 1);
    }

    #[test]
    fn test_short_load_zero_fills() {
        let mut pool = SlotPool::new(1).unwrap();
        pool.slot_mut(0).data_mut().fill(0xEE);

        pool.load(0, BlockKey::new(3, 0), |buf| {
            buf[..10].fill(0x01);
            Ok(10)
        })
        .unwrap();
        let data = pool.slot(0).data();
        assert!(data[..10].iter().all(|&b| b == 0x01));
        assert!(data[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_failed_load_leaves_slot_free() {
        let mut pool = SlotPool::new(1).unwrap();
        let err = pool
            .load(0, BlockKey::new(3, 0), |_| Err(Error::new(ErrorKind::Io, "eio")))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!pool.slot(0).is_valid());

        pool.slot_mut(0).data_mut().fill(0xEE);
        pool.load_or_zero(0, BlockKey::new(3, 0), |_| Err(Error::new(ErrorKind::Io, "eio")));
        assert!(pool.slot(0).is_valid());
        assert!(pool.slot(0).data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_flush_owner_continues_after_failure() {
        let mut pool = SlotPool::new(4).unwrap();
        for block in 0..3 {
            let slot = fill(&mut pool, 3, block);
            pool.slot_mut(slot).mark_dirty();
        }
        let other = fill(&mut pool, 4, 0);
        pool.slot_mut(other).mark_dirty();

        let mut attempted = Vec::new();
        let outcome = pool.flush_owner(3, |key, _| {
            attempted.push(key.index);
            if key.index == 1 {
                Err(Error::new(ErrorKind::Io, "bad sector"))
            } else {
                Ok(())
            }
        });

        assert_eq!(attempted, vec![0, 1, 2]);
        assert_eq!(outcome, FlushOutcome { written: 2, failed: 1 });
        // 失败的块与其他文件的块仍是脏的
        assert_eq!(pool.dirty_count(), 2);
        assert!(pool.slot(1).is_dirty());
        assert!(pool.slot(other).is_dirty());
    }

    #[test]
    fn test_invalidate_owner() {
        let mut pool = SlotPool::new(4).unwrap();
        fill(&mut pool, 3, 0);
        fill(&mut pool, 4, 0);
        let slot = fill(&mut pool, 3, 1);
        pool.slot_mut(slot).mark_dirty();

        assert_eq!(pool.invalidate_owner(3), 2);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.dirty_count(), 0);
        assert_eq!(pool.lookup(BlockKey::new(4, 0)), Some(1));
    }
}
