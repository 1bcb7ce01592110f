//! Entity derive macro implementation

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Result};

struct StructAttrs {
    table: Option<String>,
}

fn parse_struct_attrs(attrs: &[Attribute]) -> Result<StructAttrs> {
    let mut table = None;
    for attr in attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let value: LitStr = meta.value()?.parse()?;
                table = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("expected `table = \"...\"`"))
            }
        })?;
    }
    Ok(StructAttrs { table })
}

/// Collect the field's tag string. `#[orm("...")]` is kept verbatim so the
/// registry can validate it; `#[orm(column = "...")]` is rewritten into tag form.
fn parse_field_tag(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut segments = Vec::new();
    for attr in attrs {
        if !attr.path().is_ident("orm") {
            continue;
        }
        if let Ok(raw) = attr.parse_args::<LitStr>() {
            segments.push(raw.value());
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                let value: LitStr = meta.value()?.parse()?;
                segments.push(format!("column:{}", value.value()));
                Ok(())
            } else {
                Err(meta.error("expected `column = \"...\"` or a tag string"))
            }
        })?;
    }
    Ok((!segments.is_empty()).then(|| segments.join(",")))
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ));
        }
    };

    let struct_attrs = parse_struct_attrs(&input.attrs)?;
    let table_name = struct_attrs.table.as_ref().map(|table| {
        quote! {
            fn table_name() -> ::core::option::Option<&'static str> {
                ::core::option::Option::Some(#table)
            }
        }
    });
    let type_name = name.to_string();

    let mut field_defs = Vec::new();
    let mut getters = Vec::new();
    let mut setters = Vec::new();

    for field in fields {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let ty = &field.ty;
        let field_name = ident.to_string();
        let tag = match parse_field_tag(&field.attrs)? {
            Some(tag) => quote! { ::core::option::Option::Some(#tag) },
            None => quote! { ::core::option::Option::None },
        };

        field_defs.push(quote! {
            microrm::model::FieldDef {
                name: #field_name,
                tag: #tag,
                value_type: <#ty as microrm::value::SqlType>::VALUE_TYPE,
                offset: ::core::mem::offset_of!(#name, #ident),
            }
        });
        getters.push(quote! {
            #field_name => ::core::option::Option::Some(
                microrm::value::SqlType::to_value(&self.#ident)
            ),
        });
        setters.push(quote! {
            #field_name => {
                self.#ident = <#ty as microrm::value::SqlType>::from_value(value)
                    .map_err(|msg| microrm::OrmError::decode(#field_name, msg))?;
                ::core::result::Result::Ok(())
            }
        });
    }

    Ok(quote! {
        // SAFETY: every offset comes from `offset_of!` on the field whose type
        // produced the matching `VALUE_TYPE`.
        unsafe impl microrm::model::Entity for #name {
            fn schema() -> microrm::model::EntitySchema {
                microrm::model::EntitySchema {
                    type_name: #type_name,
                    shape: microrm::model::EntityShape::Struct,
                    fields: ::std::vec![#(#field_defs),*],
                }
            }

            #table_name
        }

        impl microrm::model::Reflect for #name {
            fn get_field(&self, name: &str) -> ::core::option::Option<microrm::Value> {
                match name {
                    #(#getters)*
                    _ => ::core::option::Option::None,
                }
            }

            fn set_field(
                &mut self,
                name: &str,
                value: microrm::Value,
            ) -> microrm::OrmResult<()> {
                match name {
                    #(#setters)*
                    _ => ::core::result::Result::Err(microrm::OrmError::unknown_field(name)),
                }
            }
        }
    })
}
