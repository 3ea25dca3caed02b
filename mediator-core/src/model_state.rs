//! 模型状态（ModelState）
//!
//! 以路径键（如 `order.lines[2].sku`）累积校验错误；
//! 任一键存在错误即视为无效。
//!
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 单条校验错误
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelError {
    message: String,
}

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 路径键 → 错误列表
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelState {
    entries: BTreeMap<String, Vec<ModelError>>,
}

impl ModelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.entries
            .entry(key.into())
            .or_default()
            .push(ModelError::new(message));
    }

    pub fn is_valid(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn has_errors(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|errs| !errs.is_empty())
    }

    /// 键本身或其子路径（`key.` / `key[` 开头）是否存在错误；空前缀匹配全部
    pub fn has_errors_under(&self, prefix: &str) -> bool {
        if prefix.is_empty() {
            return !self.is_valid();
        }
        self.entries
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .any(|(k, errs)| {
                let rest = &k[prefix.len()..];
                (rest.is_empty() || rest.starts_with('.') || rest.starts_with('['))
                    && !errs.is_empty()
            })
    }

    pub fn errors(&self, key: &str) -> &[ModelError] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ModelError])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn error_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 合并另一份模型状态（嵌套请求回传时使用）
    pub fn merge(&mut self, other: ModelState) {
        for (key, errors) in other.entries {
            self.entries.entry(key).or_default().extend(errors);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
