//! 属性袋（PropertyBag）
//!
//! 描述符与请求各持有一份，用于按身份作用域缓存（工厂、实例、过滤器分区等）。
//! 读取无需全局锁；写入采用"先构建、后插入"的竞态容忍策略，
//! 构建过程不持有任何分片锁。
//!
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

pub type Slot = Arc<dyn Any + Send + Sync>;

/// 属性键：名称 + 类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PropertyKey {
    name: &'static str,
    type_id: TypeId,
}

impl PropertyKey {
    pub fn new(name: &'static str, type_id: TypeId) -> Self {
        Self { name, type_id }
    }

    pub fn of<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::new(name, TypeId::of::<T>())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Default)]
pub struct PropertyBag {
    slots: DashMap<PropertyKey, Slot>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取原始槽位
    pub fn get_raw(&self, key: &PropertyKey) -> Option<Slot> {
        self.slots.get(key).map(|slot| slot.clone())
    }

    /// 按类型读取
    pub fn get<T: Any + Send + Sync>(&self, key: &PropertyKey) -> Option<Arc<T>> {
        self.get_raw(key).and_then(|slot| slot.downcast::<T>().ok())
    }

    /// 无条件覆盖
    pub fn insert<T: Any + Send + Sync>(&self, key: PropertyKey, value: Arc<T>) {
        self.slots.insert(key, value);
    }

    /// 若不存在则插入；返回最终生效的值（可能是其他并发写入者的值）
    pub fn insert_if_absent_raw(&self, key: PropertyKey, value: Slot) -> Slot {
        self.slots.entry(key).or_insert(value).clone()
    }

    /// 读取或构建：`build` 在锁外执行，可能被并发执行多次，仅保留先插入者
    pub fn get_or_insert_with<T, F>(&self, key: PropertyKey, build: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.get::<T>(&key) {
            return existing;
        }

        let built = Arc::new(build());
        let winner = self.insert_if_absent_raw(key, built.clone() as Slot);
        // 键已被其他类型占用时保留原槽位，返回本次构建的值
        winner.downcast::<T>().unwrap_or(built)
    }

    pub fn remove(&self, key: &PropertyKey) -> Option<Slot> {
        self.slots.remove(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn get_or_insert_builds_once_when_uncontended() {
        let bag = PropertyBag::new();
        let builds = AtomicUsize::new(0);
        let key = PropertyKey::of::<String>("greeting");

        let a = bag.get_or_insert_with(key, || {
            builds.fetch_add(1, Ordering::SeqCst);
            "hello".to_string()
        });
        let b = bag.get_or_insert_with(key, || {
            builds.fetch_add(1, Ordering::SeqCst);
            "other".to_string()
        });

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(*a, "hello");
    }

    #[test]
    fn keys_are_scoped_by_name_and_type() {
        let bag = PropertyBag::new();
        bag.insert(PropertyKey::of::<u32>("n"), Arc::new(1u32));
        bag.insert(PropertyKey::of::<u64>("n"), Arc::new(2u64));

        assert_eq!(*bag.get::<u32>(&PropertyKey::of::<u32>("n")).unwrap(), 1);
        assert_eq!(*bag.get::<u64>(&PropertyKey::of::<u64>("n")).unwrap(), 2);
        assert!(bag.get::<u64>(&PropertyKey::of::<u32>("n")).is_none());
        assert_eq!(bag.len(), 2);
    }
}
