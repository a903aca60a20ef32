//! 按块对齐的缓冲区

use crate::consts::BLOCK_SIZE;
use crate::error::{Error, ErrorKind, Result};
use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;
use std::alloc::{self, Layout};

/// 一个块大小、按块大小对齐的缓冲区
///
/// 直接 I/O 要求传输缓冲区的地址按块对齐，`Vec<u8>` 无法保证这一点，
/// 因此这里直接通过全局分配器按 `BLOCK_SIZE` 对齐分配。
/// 缓冲区在构造时分配一次，之后既不扩容也不移动。
pub struct AlignedBlock {
    ptr: NonNull<u8>,
}

impl AlignedBlock {
    const LAYOUT: Layout = match Layout::from_size_align(BLOCK_SIZE, BLOCK_SIZE) {
        Ok(layout) => layout,
        Err(_) => panic!("BLOCK_SIZE must be a power of two"),
    };

    /// 分配一个清零的块缓冲区
    ///
    /// # 错误
    ///
    /// 分配器返回空指针时返回 `OutOfMemory`
    pub fn new() -> Result<Self> {
        // SAFETY: LAYOUT 的大小非零
        let ptr = unsafe { alloc::alloc_zeroed(Self::LAYOUT) };
        NonNull::new(ptr)
            .map(|ptr| Self { ptr })
            .ok_or(Error::new(ErrorKind::OutOfMemory, "failed to allocate aligned block"))
    }
}

impl Deref for AlignedBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: ptr 指向 BLOCK_SIZE 字节的已初始化内存，生命周期与 self 一致
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), BLOCK_SIZE) }
    }
}

impl DerefMut for AlignedBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: 同上，且 &mut self 保证独占
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), BLOCK_SIZE) }
    }
}

impl Drop for AlignedBlock {
    fn drop(&mut self) {
        // SAFETY: ptr 由 alloc_zeroed(LAYOUT) 分配，且只释放一次
        unsafe { alloc::dealloc(self.ptr.as_ptr(), Self::LAYOUT) }
    }
}

// SAFETY: AlignedBlock 独占其内存，与 Box<[u8]> 语义相同
unsafe impl Send for AlignedBlock {}
unsafe impl Sync for AlignedBlock {}

impl core::fmt::Debug for AlignedBlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AlignedBlock")
            .field("addr", &self.ptr)
            .field("len", &BLOCK_SIZE)
            .finish()
    }
}
