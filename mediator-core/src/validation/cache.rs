//! 校验器缓存（双层）
//!
//! - 慢层：`DashMap`，并发写入的权威来源；
//! - 快层：只读快照，每次写入后整体替换。
//!
//! 读取先尝试快照（`try_read`，从不阻塞），未命中或争用时回落到慢层。
//!
use super::metadata::{MetadataKey, ModelMetadata};
use super::validator::Validator;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type Validators = Arc<[Arc<dyn Validator>]>;

#[derive(Default)]
pub struct ValidatorCache {
    entries: DashMap<MetadataKey, Validators>,
    snapshot: RwLock<Arc<HashMap<MetadataKey, Validators>>>,
}

impl ValidatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取或构建；`build` 在锁外执行，并发首次构建时仅保留先插入者
    pub fn get_or_build<F>(&self, metadata: &ModelMetadata, build: F) -> Validators
    where
        F: FnOnce(&ModelMetadata) -> Vec<Arc<dyn Validator>>,
    {
        let key = metadata.key();
        if let Some(found) = self.read_snapshot(&key) {
            return found;
        }
        if let Some(found) = self.entries.get(&key).map(|v| v.clone()) {
            return found;
        }

        let built: Validators = build(metadata).into();
        let winner = self.entries.entry(key).or_insert(built).clone();
        self.publish();
        winner
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 快照中是否已包含该键（测试与诊断用）
    pub fn snapshot_contains(&self, metadata: &ModelMetadata) -> bool {
        self.read_snapshot(&metadata.key()).is_some()
    }

    fn read_snapshot(&self, key: &MetadataKey) -> Option<Validators> {
        match self.snapshot.try_read() {
            Ok(snapshot) => snapshot.get(key).cloned(),
            Err(_) => None,
        }
    }

    fn publish(&self) {
        let fresh: HashMap<MetadataKey, Validators> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        let fresh = Arc::new(fresh);

        match self.snapshot.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
    }
}
