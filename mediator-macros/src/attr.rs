use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Attribute, Expr, Ident, Result, Token, parse::Parse, parse::ParseStream};

/// 一个 `#[validate(...)]` 元素
pub(crate) enum RuleElem {
    Required,
    Length { min: Option<Expr>, max: Option<Expr> },
    Range { min: Option<Expr>, max: Option<Expr> },
    Custom(syn::Path),
    Skip,
}

impl Parse for RuleElem {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: Ident = input.parse()?;
        match key.to_string().as_str() {
            "required" => Ok(Self::Required),
            "skip" => Ok(Self::Skip),
            "custom" => {
                let _eq: Token![=] = input.parse()?;
                let path: syn::Path = input.parse()?;
                Ok(Self::Custom(path))
            }
            "length" => {
                let (min, max) = parse_bounds(input, &key)?;
                Ok(Self::Length { min, max })
            }
            "range" => {
                let (min, max) = parse_bounds(input, &key)?;
                Ok(Self::Range { min, max })
            }
            _ => Err(syn::Error::new(
                key.span(),
                "unknown key; expected 'required' | 'length' | 'range' | 'custom' | 'skip'",
            )),
        }
    }
}

// 解析 `(min = <expr>, max = <expr>)`，两者至少出现一个
fn parse_bounds(input: ParseStream, key: &Ident) -> Result<(Option<Expr>, Option<Expr>)> {
    let content;
    syn::parenthesized!(content in input);
    let pairs: Punctuated<syn::ExprAssign, Token![,]> =
        Punctuated::<syn::ExprAssign, Token![,]>::parse_terminated(&content)?;

    let mut min: Option<Expr> = None;
    let mut max: Option<Expr> = None;
    for assign in pairs {
        let bound = match *assign.left {
            Expr::Path(p) if p.path.segments.len() == 1 => p.path.segments[0].ident.clone(),
            other => return Err(syn::Error::new(other.span(), "invalid bound key")),
        };
        let slot = match bound.to_string().as_str() {
            "min" => &mut min,
            "max" => &mut max,
            _ => {
                return Err(syn::Error::new(
                    bound.span(),
                    "unknown bound; expected 'min' | 'max'",
                ));
            }
        };
        if slot.is_some() {
            return Err(syn::Error::new(
                bound.span(),
                format!("duplicate key '{bound}' in attribute"),
            ));
        }
        *slot = Some(*assign.right);
    }

    if min.is_none() && max.is_none() {
        return Err(syn::Error::new(
            key.span(),
            format!("'{key}' requires at least one of 'min' | 'max'"),
        ));
    }
    Ok((min, max))
}

/// 收集一组属性中全部 `#[validate(...)]` 元素
pub(crate) fn parse_rules(attrs: &[Attribute]) -> Result<Vec<RuleElem>> {
    let mut rules = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("validate")) {
        let elems = attr.parse_args_with(Punctuated::<RuleElem, Token![,]>::parse_terminated)?;
        rules.extend(elems);
    }
    Ok(rules)
}
