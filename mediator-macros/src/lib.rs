use proc_macro::TokenStream;

mod attr;
mod validate;

/// 校验派生宏
/// - 具名结构体：每个字段成为对象属性，字段规则来自 `#[validate(...)]`；
/// - tuple 结构体：属性名为字段下标（`0`、`1`……）；
/// - 枚举：当前变体的字段成为对象属性（具名字段用字段名，元组字段用下标），
///   单元变体视为不透明标量；
/// - 单元结构体：视为不透明标量，仅支持类型级 `custom`。
///
/// 字段规则：`required`、`length(min = .., max = ..)`、`range(min = .., max = ..)`、
/// `custom = path`（`fn(&FieldType) -> Option<String>`）、`skip`。
/// 类型级规则：`#[validate(custom = path)]`（`fn(&Self) -> Option<String>`）。
#[proc_macro_derive(Validate, attributes(validate))]
pub fn derive_validate(input: TokenStream) -> TokenStream {
    validate::expand(input)
}
