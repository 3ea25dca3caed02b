//! 处理器类型缓存（HandlerTypeCache）
//!
//! 首次选择时扫描一次 [`HandlerTypeProvider`]，构建命令类型 → 描述符映射；
//! 构建完成后只读，读者无锁。
//!
//! 同一命令类型出现多个处理器时不进入描述符映射，只记录候选名单，
//! 在该命令被查询时报告 `Ambiguous`。
//!
use crate::catalog::{CommandBinding, HandlerType};
use crate::config::MediatorConfig;
use crate::descriptor::HandlerDescriptor;
use crate::error::{MediatorError, MediatorResult};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

#[derive(Default)]
struct HandlerMap {
    descriptors: HashMap<TypeId, Arc<HandlerDescriptor>>,
    ambiguous: HashMap<TypeId, Vec<&'static str>>,
}

#[derive(Default)]
pub struct HandlerTypeCache {
    built: OnceLock<HandlerMap>,
}

impl HandlerTypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 选择命令类型对应的唯一描述符
    pub fn select_handler(
        &self,
        config: &MediatorConfig,
        command_type: TypeId,
        command_name: &'static str,
    ) -> MediatorResult<Arc<HandlerDescriptor>> {
        let map = self.built.get_or_init(|| build(config));

        if let Some(descriptor) = map.descriptors.get(&command_type) {
            return Ok(descriptor.clone());
        }
        if let Some(candidates) = map.ambiguous.get(&command_type) {
            return Err(MediatorError::Ambiguous {
                command: command_name,
                candidates: candidates.clone(),
            });
        }
        Err(MediatorError::NotFound {
            command: command_name,
        })
    }

    pub fn is_built(&self) -> bool {
        self.built.get().is_some()
    }

    /// 已构建的描述符数量（未构建时为 0）
    pub fn len(&self) -> usize {
        self.built.get().map_or(0, |m| m.descriptors.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn build(config: &MediatorConfig) -> HandlerMap {
    let types = config.handlers().discover_handler_types();

    let mut candidates: HashMap<TypeId, Vec<(&HandlerType, &CommandBinding)>> = HashMap::new();
    for handler in &types {
        for binding in handler.bindings() {
            candidates
                .entry(binding.command_type())
                .or_default()
                .push((handler, binding));
        }
    }

    let mut map = HandlerMap::default();
    for (command_type, found) in candidates {
        match found.as_slice() {
            [(handler, binding)] => {
                let descriptor =
                    HandlerDescriptor::new(config.id(), config.global_filters(), handler, binding);
                map.descriptors.insert(command_type, Arc::new(descriptor));
            }
            many => {
                let names = many.iter().map(|(h, _)| h.handler_name()).collect();
                map.ambiguous.insert(command_type, names);
            }
        }
    }

    debug!(
        handler_types = types.len(),
        descriptors = map.descriptors.len(),
        ambiguous = map.ambiguous.len(),
        "handler type cache built"
    );
    map
}
