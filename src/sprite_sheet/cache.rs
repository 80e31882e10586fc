//! # 处理结果缓存
//!
//! ## 设计思路
//!
//! 以规范化参数键缓存整条流水线的输出。缓存对象由宿主服务持有，不做全局单例，
//! 测试可以创建独立实例。
//!
//! ## 实现思路
//!
//! - 每个键对应一个 `tokio::sync::OnceCell`，单元里存的是构建结果（成功或失败）：
//!   并发请求同一键时只有一次构建在执行，其余请求拿到同一个 `Ok` 或 `Err`；
//! - `std::sync::Mutex` 只在“查找或创建槽位”时持有，构建期间不持锁；
//! - 构建失败时移除该槽位（仅当仍是同一个槽位），下次请求重新构建；
//! - 超出容量按插入顺序淘汰（FIFO，不是 LRU）。

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

use super::processor::ProcessedSheet;
use super::SpriteSheetError;

/// 默认容量。
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

type Outcome = Result<Arc<ProcessedSheet>, SpriteSheetError>;
type Slot = Arc<OnceCell<Outcome>>;

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Slot>,
    order: VecDeque<String>,
}

/// 精灵图处理结果缓存。
pub struct ProcessedSheetCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl Default for ProcessedSheetCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl ProcessedSheetCache {
    /// 创建指定容量的缓存，容量至少为 1。
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前槽位数量（含构建中的）。
    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state
            .lock()
            .map(|state| state.entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn clear(&self) -> Result<(), SpriteSheetError> {
        let mut state = self.lock_state()?;
        state.entries.clear();
        state.order.clear();
        Ok(())
    }

    /// 命中则返回缓存结果，否则执行 `builder`；同键并发请求共享同一次构建及其结果。
    ///
    /// 失败结果不会留在缓存里：槽位被移除后，后续请求重新构建。
    pub async fn get_or_build<F, Fut>(
        &self,
        key: &str,
        builder: F,
    ) -> Result<Arc<ProcessedSheet>, SpriteSheetError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ProcessedSheet, SpriteSheetError>>,
    {
        let slot = self.slot_for(key)?;

        let result = slot
            .get_or_init(|| async { builder().await.map(Arc::new) })
            .await
            .clone();

        if let Err(err) = &result {
            // 同一槽位的等待者都会走到这里，只有第一个真正移除并记录
            if self.remove_if_same(key, &slot) {
                log::warn!("⚠️ 精灵图构建失败，移除缓存槽位：{}", err);
            }
        }

        result
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, CacheState>, SpriteSheetError> {
        self.state
            .lock()
            .map_err(|_| SpriteSheetError::ResourceLimit("缓存锁已中毒".to_string()))
    }

    fn slot_for(&self, key: &str) -> Result<Slot, SpriteSheetError> {
        let mut state = self.lock_state()?;
        if let Some(slot) = state.entries.get(key) {
            log::debug!("♻️ 缓存命中");
            return Ok(Arc::clone(slot));
        }

        let slot: Slot = Arc::new(OnceCell::new());
        state.entries.insert(key.to_string(), Arc::clone(&slot));
        state.order.push_back(key.to_string());

        while state.entries.len() > self.capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
            log::debug!("🗑️ 缓存已满，淘汰最早条目");
        }

        Ok(slot)
    }

    /// 仅当键仍指向同一槽位时移除；返回是否真的移除了。
    fn remove_if_same(&self, key: &str, slot: &Slot) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let same = state
            .entries
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, slot));
        if same {
            state.entries.remove(key);
            state.order.retain(|k| k != key);
        }
        same
    }
}
