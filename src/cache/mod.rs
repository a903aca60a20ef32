//! 块缓存模块
//!
//! 固定容量的槽位池，每个槽位持有一个按块对齐的缓冲区和元数据。
//!
//! # 主要组件
//!
//! - [`Slot`] - 单个槽位：块数据、所属块、脏标志、访问频率
//! - [`SlotPool`] - 槽位池：查找、驱逐、写回、失效
//! - [`SlotLookup`] - 查找接口，默认实现 [`LinearScan`] 线性扫描整个池
//! - [`CacheStats`] - 缓存统计信息
//!
//! # 驱逐策略
//!
//! 每次未命中都会调用驱逐：
//!
//! 1. 按下标顺序扫描一次，遇到第一个空闲槽位立即返回
//! 2. 池已满时，选择 `frequency` **最大** 的槽位（相同时取下标最小者）
//! 3. 被选中的槽位如果是脏的，先写回；写回失败只记录日志，槽位照样回收
//! 4. 重置为空闲、干净、频率 0
//!
//! 注意第 2 步驱逐的是访问最 **频繁** 的块，与 LFU 恰好相反。
//! 这是既定行为（见 [`EVICT_MOST_FREQUENT`]），测试覆盖了这一点，不要"修正"。
//!
//! # 槽位状态机
//!
//! ```text
//! 空闲 --(未命中填充)--> 有效/干净 --(写命中)--> 有效/脏
//! 有效/脏 --(同步、关闭、驱逐写回)--> 有效/干净 或 空闲
//! ```

mod pool;
mod slot;

pub use pool::{CacheStats, FlushOutcome, LinearScan, SlotLookup, SlotPool, EVICT_MOST_FREQUENT};
pub use slot::{BlockKey, Slot};
