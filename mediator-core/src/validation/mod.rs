//! 命令校验
//!
//! - [`metadata`]：`Validate` 视图、元数据与声明式规则；
//! - [`validator`]：校验器与提供者；
//! - [`cache`]：校验器列表的双层缓存；
//! - [`engine`]：递归、可终止于环的图校验。
//!
pub mod cache;
pub mod engine;
pub mod metadata;
pub mod validator;

pub use cache::ValidatorCache;
pub use engine::ValidationEngine;
pub use metadata::{AsAny, CustomRule, ModelMetadata, Node, Property, Rule, Scalar, Validate};
pub use validator::{
    CustomValidator, LengthValidator, RangeValidator, RequiredValidator, RuleValidatorProvider,
    ValidationContext, Validator, ValidatorProvider,
};
