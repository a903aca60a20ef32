//! 缓存槽位

use crate::block::{AlignedBlock, Descriptor};
use crate::consts::BLOCK_SIZE;
use crate::error::Result;

/// 槽位缓存的是哪个文件的哪个块
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockKey {
    /// 所属文件的底层描述符
    pub owner: Descriptor,
    /// 块号（以 BLOCK_SIZE 为单位）
    pub index: u64,
}

impl BlockKey {
    /// 创建块键
    pub const fn new(owner: Descriptor, index: u64) -> Self {
        Self { owner, index }
    }

    /// 块在文件中的字节偏移
    pub const fn byte_offset(&self) -> u64 {
        self.index * BLOCK_SIZE as u64
    }
}

/// 缓存槽位
///
/// `key` 为 `None` 表示空闲。有效槽位之间 `key` 唯一。
#[derive(Debug)]
pub struct Slot {
    data: AlignedBlock,
    key: Option<BlockKey>,
    dirty: bool,
    frequency: u64,
}

impl Slot {
    pub(super) fn new() -> Result<Self> {
        Ok(Self {
            data: AlignedBlock::new()?,
            key: None,
            dirty: false,
            frequency: 0,
        })
    }

    /// 当前缓存的块，空闲时为 `None`
    pub fn key(&self) -> Option<BlockKey> {
        self.key
    }

    /// 是否持有有效数据
    pub fn is_valid(&self) -> bool {
        self.key.is_some()
    }

    /// 是否为脏块
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 访问频率
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// 块数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 块数据（可写）
    ///
    /// 只改数据，不改脏标志；调用者写入后应调用 [`Slot::mark_dirty`]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// 标记为脏
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(super) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(super) fn occupy(&mut self, key: BlockKey) {
        self.key = Some(key);
        self.dirty = false;
        self.frequency = 1;
    }

    pub(super) fn touch(&mut self) {
        self.frequency += 1;
    }

    pub(super) fn reset(&mut self) {
        self.key = None;
        self.dirty = false;
        self.frequency = 0;
    }
}
