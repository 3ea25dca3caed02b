//! 校验器与校验器提供者
//!
//! 提供者根据元数据给出校验器列表；内置 [`RuleValidatorProvider`]
//! 把声明式 [`Rule`] 映射为对应的内置校验器。
//!
use super::metadata::{AsAny, CustomRule, ModelMetadata, Node, Rule, Scalar, Validate};
use std::sync::Arc;

/// 一次节点校验的上下文
pub struct ValidationContext<'a> {
    /// 当前元数据（属性级或类型级）
    pub metadata: &'a ModelMetadata,
    /// 声明处的原始值（未穿透包装），空值为 `None`
    pub value: Option<&'a dyn Validate>,
    /// 穿透包装后的值
    pub model: Option<&'a dyn Validate>,
    /// 穿透包装后的节点形态
    pub node: Option<&'a Node<'a>>,
}

/// 节点级校验器：返回错误信息列表
pub trait Validator: Send + Sync {
    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<String>;
}

/// 校验器提供者
pub trait ValidatorProvider: Send + Sync {
    fn validators(&self, metadata: &ModelMetadata, out: &mut Vec<Arc<dyn Validator>>);
}

/// 声明式规则 → 内置校验器
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleValidatorProvider;

impl ValidatorProvider for RuleValidatorProvider {
    fn validators(&self, metadata: &ModelMetadata, out: &mut Vec<Arc<dyn Validator>>) {
        for rule in metadata.rules() {
            let validator: Arc<dyn Validator> = match *rule {
                Rule::Required => Arc::new(RequiredValidator),
                Rule::Length { min, max } => Arc::new(LengthValidator { min, max }),
                Rule::Range { min, max } => Arc::new(RangeValidator { min, max }),
                Rule::Custom(custom) => Arc::new(CustomValidator(custom)),
            };
            out.push(validator);
        }
    }
}

/// 必填：空值或空白字符串视为缺失
#[derive(Clone, Copy, Debug, Default)]
pub struct RequiredValidator;

impl Validator for RequiredValidator {
    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        let missing = match (ctx.model, ctx.node.and_then(Node::scalar)) {
            (None, _) => true,
            (Some(_), Some(Scalar::Str(s))) => s.trim().is_empty(),
            _ => false,
        };
        if missing {
            vec![format!("The {} field is required.", ctx.metadata.display_name())]
        } else {
            Vec::new()
        }
    }
}

/// 长度：字符串按字符、序列按元素
#[derive(Clone, Copy, Debug, Default)]
pub struct LengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for LengthValidator {
    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        let Some(len) = ctx.node.and_then(Node::len) else {
            return Vec::new();
        };
        let too_short = self.min.is_some_and(|min| len < min);
        let too_long = self.max.is_some_and(|max| len > max);
        if !too_short && !too_long {
            return Vec::new();
        }

        let name = ctx.metadata.display_name();
        let message = match (self.min, self.max) {
            (Some(min), Some(max)) => {
                format!("The field {name} must have a length between {min} and {max}.")
            }
            (Some(min), None) => format!("The field {name} must have a length of at least {min}."),
            (None, Some(max)) => format!("The field {name} must have a length of at most {max}."),
            (None, None) => return Vec::new(),
        };
        vec![message]
    }
}

/// 数值区间（闭区间）
#[derive(Clone, Copy, Debug, Default)]
pub struct RangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for RangeValidator {
    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        let Some(value) = ctx
            .node
            .and_then(Node::scalar)
            .and_then(|s| s.as_f64())
        else {
            return Vec::new();
        };
        let below = self.min.is_some_and(|min| value < min);
        let above = self.max.is_some_and(|max| value > max);
        if !below && !above {
            return Vec::new();
        }

        let name = ctx.metadata.display_name();
        let message = match (self.min, self.max) {
            (Some(min), Some(max)) => format!("The field {name} must be between {min} and {max}."),
            (Some(min), None) => format!("The field {name} must be at least {min}."),
            (None, Some(max)) => format!("The field {name} must be at most {max}."),
            (None, None) => return Vec::new(),
        };
        vec![message]
    }
}

/// 自定义规则：对声明处的原始值执行
#[derive(Clone, Copy, Debug)]
pub struct CustomValidator(pub CustomRule);

impl Validator for CustomValidator {
    fn validate(&self, ctx: &ValidationContext<'_>) -> Vec<String> {
        let Some(value) = ctx.value else {
            return Vec::new();
        };
        (self.0.check)(AsAny::as_any(value)).into_iter().collect()
    }
}
