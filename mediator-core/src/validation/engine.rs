//! 校验引擎（ValidationEngine）
//!
//! 对命令图做深度优先、后序遍历：
//! - 对象先校验全部属性，再执行对象自身的节点校验器；
//! - 序列先校验全部元素，再执行集合自身的节点校验器；
//! - 标量与空值仅做节点校验；包装类型透明穿透；
//! - 节点所在键（含子路径）已有错误时跳过其节点校验。
//!
//! 访问集合以（地址，`TypeId`）标识复合节点：进入时标记、退出时移除，
//! 再次进入视为有效，从而保证在环状图上终止。
//!
use super::cache::{ValidatorCache, Validators};
use super::metadata::{AsAny, ModelMetadata, Node, Validate};
use super::validator::{RuleValidatorProvider, ValidationContext, Validator, ValidatorProvider};
use crate::model_state::ModelState;
use crate::request::Request;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;

pub struct ValidationEngine {
    providers: Vec<Arc<dyn ValidatorProvider>>,
    cache: ValidatorCache,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self {
            providers: vec![Arc::new(RuleValidatorProvider)],
            cache: ValidatorCache::new(),
        }
    }
}

impl ValidationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 不含任何提供者的引擎（全部节点视为有效）
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
            cache: ValidatorCache::new(),
        }
    }

    /// 追加一个校验器提供者
    pub fn with_provider(mut self, provider: impl ValidatorProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// 校验请求中的命令，错误写入请求的模型状态
    pub fn validate(&self, request: &Request) -> bool {
        let mut state = request.model_state_mut();
        self.validate_value(request.command(), &mut state)
    }

    /// 校验任意值，错误写入给定模型状态
    pub fn validate_value(&self, value: &dyn Validate, state: &mut ModelState) -> bool {
        let metadata = value.metadata();
        let mut visitor = Visitor {
            engine: self,
            state,
            visited: HashSet::new(),
            keys: KeyBuilder::default(),
        };
        let valid = visitor.visit(&metadata, Some(value));
        tracing::debug!(model = metadata.model_name(), valid, "validated");
        valid
    }

    fn validators_for(&self, metadata: &ModelMetadata) -> Validators {
        self.cache.get_or_build(metadata, |metadata| {
            let mut out = Vec::new();
            for provider in &self.providers {
                provider.validators(metadata, &mut out);
            }
            tracing::debug!(
                model = metadata.model_name(),
                property = metadata.property_name(),
                count = out.len(),
                "validator list built"
            );
            out
        })
    }
}

type Identity = (usize, TypeId);

fn identity(value: &dyn Validate) -> Identity {
    let address = std::ptr::from_ref(value).cast::<()>() as usize;
    (address, AsAny::as_any(value).type_id())
}

struct Visitor<'e> {
    engine: &'e ValidationEngine,
    state: &'e mut ModelState,
    visited: HashSet<Identity>,
    keys: KeyBuilder,
}

impl Visitor<'_> {
    fn visit(&mut self, metadata: &ModelMetadata, value: Option<&dyn Validate>) -> bool {
        let model = unwrap_indirect(value);
        let node = model.map(|m| m.node());

        let mut valid = true;
        match (&node, model) {
            (Some(Node::Object(properties)), Some(m)) => {
                let id = identity(m);
                if !self.visited.insert(id) {
                    return true;
                }
                for property in properties {
                    self.keys.push(Frame::Property(property.metadata().display_name()));
                    valid &= self.visit(property.metadata(), Some(property.value()));
                    self.keys.pop();
                }
                self.visited.remove(&id);
            }
            (Some(Node::Sequence(items)), Some(m)) => {
                let id = identity(m);
                if !self.visited.insert(id) {
                    return true;
                }
                for (index, item) in items.iter().enumerate() {
                    self.keys.push(Frame::Index(index));
                    valid &= self.visit(&item.metadata(), Some(*item));
                    self.keys.pop();
                }
                self.visited.remove(&id);
            }
            _ => {}
        }

        valid &= self.validate_node(metadata, value, model, node.as_ref());
        valid
    }

    fn validate_node(
        &mut self,
        metadata: &ModelMetadata,
        value: Option<&dyn Validate>,
        model: Option<&dyn Validate>,
        node: Option<&Node<'_>>,
    ) -> bool {
        if !self.state.is_empty() && self.state.has_errors_under(&self.keys.render()) {
            return false;
        }

        let mut errors = Vec::new();
        let ctx = ValidationContext {
            metadata,
            value,
            model,
            node,
        };
        run_all(&self.engine.validators_for(metadata), &ctx, &mut errors);

        if let Some(m) = model {
            let type_metadata = m.metadata();
            if type_metadata.key() != metadata.key() {
                let ctx = ValidationContext {
                    metadata: &type_metadata,
                    value: model,
                    model,
                    node,
                };
                run_all(&self.engine.validators_for(&type_metadata), &ctx, &mut errors);
            }
        }

        if errors.is_empty() {
            return true;
        }
        let key = self.keys.render();
        for message in errors {
            self.state.add_error(key.clone(), message);
        }
        false
    }
}

fn run_all(validators: &[Arc<dyn Validator>], ctx: &ValidationContext<'_>, errors: &mut Vec<String>) {
    for validator in validators {
        errors.extend(validator.validate(ctx));
    }
}

fn unwrap_indirect(value: Option<&dyn Validate>) -> Option<&dyn Validate> {
    let mut current = value;
    while let Some(v) = current {
        match v.node() {
            Node::Indirect(inner) => current = inner,
            _ => break,
        }
    }
    current
}

#[derive(Clone, Copy, Debug)]
enum Frame {
    Property(&'static str),
    Index(usize),
}

/// 键帧栈；仅在需要时拼出 `a.b[2].c` 形式的键
#[derive(Default)]
struct KeyBuilder {
    frames: Vec<Frame>,
}

impl KeyBuilder {
    fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn render(&self) -> String {
        let mut key = String::new();
        for frame in &self.frames {
            match frame {
                Frame::Property(name) => {
                    if !key.is_empty() {
                        key.push('.');
                    }
                    key.push_str(name);
                }
                Frame::Index(index) => {
                    let _ = write!(key, "[{index}]");
                }
            }
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_builder_renders_paths() {
        let mut keys = KeyBuilder::default();
        assert_eq!(keys.render(), "");
        keys.push(Frame::Property("order"));
        keys.push(Frame::Property("lines"));
        keys.push(Frame::Index(2));
        keys.push(Frame::Property("sku"));
        assert_eq!(keys.render(), "order.lines[2].sku");
        keys.pop();
        keys.pop();
        assert_eq!(keys.render(), "order.lines");
    }

    #[test]
    fn top_level_index_has_no_leading_dot() {
        let mut keys = KeyBuilder::default();
        keys.push(Frame::Index(0));
        keys.push(Frame::Property("name"));
        assert_eq!(keys.render(), "[0].name");
    }

    #[test]
    fn scalars_without_rules_are_valid() {
        let engine = ValidationEngine::new();
        let mut state = ModelState::new();
        assert!(engine.validate_value(&42u32, &mut state));
        assert!(engine.validate_value(&vec!["a".to_string()], &mut state));
        assert!(state.is_valid());
    }
}
