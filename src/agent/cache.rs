//! 决策缓存：(局面指纹, 模型 ID, 合法走法集合) -> 原始回复 + 走法
//!
//! 键为三者的 SHA-256 摘要；合法走法按集合处理（排序去重后参与摘要），与引擎给出的顺序无关。
//! 合法集合理论上由局面决定，仍放进键里，引擎的走法生成变化时缓存不会给出过期结果。
//!
//! 容量有界，按最近最少访问淘汰。值写入后不再修改，覆盖写入整体替换；多会话共享同一实例。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// 默认容量（条）
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// 缓存的决策（写入后不可变）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDecision {
    pub response: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

/// get 返回的条目：不可变的值 + 访问元数据快照
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Arc<CachedDecision>,
    pub hit_count: u64,
    pub last_access: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
    pub hit_rate: f64,
}

#[derive(Debug)]
struct Slot {
    value: Arc<CachedDecision>,
    hit_count: u64,
    last_access: DateTime<Utc>,
    /// LRU 序号，越大越新
    tick: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    map: HashMap<String, Slot>,
    tick: u64,
}

#[derive(Debug)]
pub struct DecisionCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DecisionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// 计算缓存键；legal 的顺序与重复不影响结果
    pub fn key(fingerprint: &str, model_id: &str, legal: &[String]) -> String {
        let mut moves: Vec<&str> = legal.iter().map(String::as_str).collect();
        moves.sort_unstable();
        moves.dedup();

        let mut hasher = Sha256::new();
        hasher.update(fingerprint.as_bytes());
        hasher.update([0u8]);
        hasher.update(model_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(moves.join(",").as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn get(&self, fingerprint: &str, model_id: &str, legal: &[String]) -> Option<CacheEntry> {
        let key = Self::key(fingerprint, model_id, legal);
        let mut inner = self.inner.lock().await;
        inner.tick += 1;
        let tick = inner.tick;

        match inner.map.get_mut(&key) {
            Some(slot) => {
                slot.hit_count += 1;
                slot.last_access = Utc::now();
                slot.tick = tick;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(CacheEntry {
                    value: slot.value.clone(),
                    hit_count: slot.hit_count,
                    last_access: slot.last_access,
                })
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn set(
        &self,
        fingerprint: &str,
        model_id: &str,
        legal: &[String],
        response: &str,
        action: &str,
    ) {
        let key = Self::key(fingerprint, model_id, legal);
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.map.contains_key(&key) && inner.map.len() >= self.capacity {
            let oldest = inner
                .map
                .iter()
                .min_by_key(|(_, slot)| slot.tick)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.map.remove(&oldest);
                tracing::debug!(capacity = self.capacity, "Decision cache full, evicted LRU entry");
            }
        }

        inner.map.insert(
            key,
            Slot {
                value: Arc::new(CachedDecision {
                    response: response.to_string(),
                    action: action.to_string(),
                    created_at: now,
                }),
                hit_count: 0,
                last_access: now,
                tick,
            },
        );
    }

    pub async fn stats(&self) -> CacheStats {
        let size = self.inner.lock().await.map.len();
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            size,
            capacity: self.capacity,
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }

    pub async fn clear(&self) {
        self.inner.lock().await.map.clear();
    }
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
