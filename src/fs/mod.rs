//! 文件级 API
//!
//! - [`HandleTable`] - 逻辑句柄到底层文件的映射，带游标与逻辑大小
//! - [`CacheManager`] - open/close/read/write/seek/sync 六个原语

mod handle;
mod io;
mod manager;

pub use handle::{Handle, HandleTable, OpenFile};
pub use manager::CacheManager;
