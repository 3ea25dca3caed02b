use crate::attr::{RuleElem, parse_rules};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Type, parse_macro_input, spanned::Spanned};

pub(crate) fn expand(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_derive(&input) {
        Ok(ts) => ts.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_derive(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if let Some(lt) = input.generics.lifetimes().next() {
        return Err(syn::Error::new(
            lt.span(),
            "#[derive(Validate)] does not support lifetime parameters",
        ));
    }
    let generic = input.generics.type_params().next().is_some();

    let ident = &input.ident;
    let type_rules = type_level_rules(input, generic)?;

    let (node_fn, field_types) = match &input.data {
        Data::Struct(ds) => match &ds.fields {
            Fields::Named(_) | Fields::Unnamed(_) => {
                let (props, tys) = properties(&ds.fields, generic, None, |_, access| quote!(&self.#access))?;
                let body = quote! {
                    fn node(&self) -> ::mediator_core::validation::Node<'_> {
                        ::mediator_core::validation::Node::Object(::std::vec![#(#props),*])
                    }
                };
                (body, tys)
            }
            Fields::Unit => (TokenStream2::new(), Vec::new()),
        },
        Data::Enum(de) => variants(de, generic)?,
        Data::Union(u) => {
            return Err(syn::Error::new(
                u.union_token.span(),
                "#[derive(Validate)] does not support unions",
            ));
        }
    };

    let metadata_fn = if type_rules.is_empty() {
        TokenStream2::new()
    } else {
        quote! {
            fn metadata(&self) -> ::mediator_core::validation::ModelMetadata {
                const RULES: &[::mediator_core::validation::Rule] = &[#(#type_rules),*];
                ::mediator_core::validation::ModelMetadata::for_type::<Self>(RULES)
            }
        }
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let mut predicates: Vec<TokenStream2> = where_clause
        .map(|w| w.predicates.iter().map(|p| quote!(#p)).collect())
        .unwrap_or_default();
    if generic {
        predicates.push(quote!(#ident #ty_generics: ::core::marker::Send + ::core::marker::Sync + 'static));
        for ty in &field_types {
            predicates.push(quote!(#ty: ::mediator_core::validation::Validate));
        }
    }
    let where_tokens = if predicates.is_empty() {
        TokenStream2::new()
    } else {
        quote!(where #(#predicates),*)
    };

    Ok(quote! {
        impl #impl_generics ::mediator_core::validation::Validate for #ident #ty_generics #where_tokens {
            #metadata_fn
            #node_fn
        }
    })
}

// 类型级规则仅允许 custom
fn type_level_rules(input: &DeriveInput, generic: bool) -> syn::Result<Vec<TokenStream2>> {
    let ident = &input.ident;
    let mut out = Vec::new();
    for elem in parse_rules(&input.attrs)? {
        match elem {
            RuleElem::Custom(path) => {
                if generic {
                    return Err(syn::Error::new(
                        path.span(),
                        "'custom' is not supported on generic types",
                    ));
                }
                let ty: Type = syn::parse_quote!(#ident);
                out.push(custom_rule(&path, &ty));
            }
            _ => {
                return Err(syn::Error::new(
                    ident.span(),
                    "only 'custom = path' is allowed at type level",
                ));
            }
        }
    }
    Ok(out)
}

// 枚举：当前变体的字段作为对象属性（具名字段用字段名，元组字段用下标）；
// 全部为单元变体时保持默认的不透明标量
fn variants(de: &syn::DataEnum, generic: bool) -> syn::Result<(TokenStream2, Vec<Type>)> {
    if de.variants.iter().all(|v| v.fields.is_empty()) {
        return Ok((TokenStream2::new(), Vec::new()));
    }

    let mut arms = Vec::new();
    let mut tys = Vec::new();
    for variant in &de.variants {
        let name = &variant.ident;
        let binding = |index: usize| format_ident!("__field{}", index);
        let (props, field_tys) = properties(&variant.fields, generic, Some(name), |index, _| {
            let b = binding(index);
            quote!(#b)
        })?;
        tys.extend(field_tys);

        let pattern = match &variant.fields {
            Fields::Named(named) => {
                let binds = named.named.iter().enumerate().map(|(i, f)| {
                    let id = &f.ident;
                    let b = binding(i);
                    quote!(#id: #b)
                });
                quote!(Self::#name { #(#binds),* })
            }
            Fields::Unnamed(unnamed) => {
                let binds = (0..unnamed.unnamed.len()).map(binding);
                quote!(Self::#name(#(#binds),*))
            }
            Fields::Unit => quote!(Self::#name),
        };
        let body = if variant.fields.is_empty() {
            quote!(::mediator_core::validation::Node::Scalar(::mediator_core::validation::Scalar::Other))
        } else {
            quote!(::mediator_core::validation::Node::Object(::std::vec![#(#props),*]))
        };
        arms.push(quote!(#[allow(unused_variables)] #pattern => #body));
    }

    let body = quote! {
        fn node(&self) -> ::mediator_core::validation::Node<'_> {
            match self {
                #(#arms,)*
            }
        }
    };
    Ok((body, tys))
}

fn properties(
    fields: &Fields,
    generic: bool,
    variant: Option<&syn::Ident>,
    value: impl Fn(usize, TokenStream2) -> TokenStream2,
) -> syn::Result<(Vec<TokenStream2>, Vec<Type>)> {
    let mut props = Vec::new();
    let mut tys = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let elems = parse_rules(&field.attrs)?;
        if elems.iter().any(|e| matches!(e, RuleElem::Skip)) {
            continue;
        }

        let (name, access) = match &field.ident {
            Some(id) => (id.to_string(), quote!(#id)),
            None => {
                let idx = syn::Index::from(index);
                (index.to_string(), quote!(#idx))
            }
        };
        let ty = &field.ty;
        let value = value(index, access);

        let mut rules = Vec::new();
        for elem in elems {
            rules.push(match elem {
                RuleElem::Required => quote!(::mediator_core::validation::Rule::Required),
                RuleElem::Length { min, max } => {
                    let min = opt(min.map(|e| quote!((#e) as usize)));
                    let max = opt(max.map(|e| quote!((#e) as usize)));
                    quote!(::mediator_core::validation::Rule::Length { min: #min, max: #max })
                }
                RuleElem::Range { min, max } => {
                    let min = opt(min.map(|e| quote!((#e) as f64)));
                    let max = opt(max.map(|e| quote!((#e) as f64)));
                    quote!(::mediator_core::validation::Rule::Range { min: #min, max: #max })
                }
                RuleElem::Custom(path) => {
                    if generic {
                        return Err(syn::Error::new(
                            path.span(),
                            "'custom' is not supported on generic types",
                        ));
                    }
                    custom_rule(&path, ty)
                }
                RuleElem::Skip => continue,
            });
        }

        let rules = quote!({
            const RULES: &[::mediator_core::validation::Rule] = &[#(#rules),*];
            RULES
        });
        let metadata = match variant {
            Some(v) => {
                let v = v.to_string();
                quote!(::mediator_core::validation::ModelMetadata::for_variant_property::<Self, #ty>(#v, #name, #rules))
            }
            None => quote!(::mediator_core::validation::ModelMetadata::for_property::<Self, #ty>(#name, #rules)),
        };
        props.push(quote! {
            ::mediator_core::validation::Property::new(
                #metadata,
                #value,
            )
        });
        tys.push(ty.clone());
    }

    Ok((props, tys))
}

fn opt(value: Option<TokenStream2>) -> TokenStream2 {
    match value {
        Some(v) => quote!(::core::option::Option::Some(#v)),
        None => quote!(::core::option::Option::None),
    }
}

// 自定义规则：对声明类型向下转型后调用用户函数
fn custom_rule(path: &syn::Path, ty: &Type) -> TokenStream2 {
    let name = quote!(#path).to_string().replace(' ', "");
    let check = format_ident!("__validate_custom");
    quote! {
        ::mediator_core::validation::Rule::Custom(::mediator_core::validation::CustomRule {
            name: #name,
            check: {
                fn #check(value: &dyn ::core::any::Any) -> ::core::option::Option<::std::string::String> {
                    match value.downcast_ref::<#ty>() {
                        ::core::option::Option::Some(v) => #path(v),
                        ::core::option::Option::None => ::core::option::Option::None,
                    }
                }
                #check
            },
        })
    }
}
