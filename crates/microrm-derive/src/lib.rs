//! Derive macros for microrm
//!
//! Provides `#[derive(Entity)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod entity;

/// Derive `Entity` (schema + by-name field access) for a struct.
///
/// # Example
///
/// ```ignore
/// use microrm::Entity;
///
/// #[derive(Entity, Default)]
/// #[orm(table = "users")]
/// struct User {
///     id: i64,
///     #[orm("column:user_name")]
///     name: String,
///     #[orm(column = "email_address")]
///     email: Option<String>,
/// }
/// ```
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Override the table name (default: snake_case of the type name)
/// - `#[orm("column:name")]` - Raw field tag, validated when the model is registered
/// - `#[orm(column = "name")]` - Map field to a different column name
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
