//! Derive macro mapping a struct to an `oxide-storage` table.
//!
//! This crate provides `#[derive(Table)]`, which generates one typed field
//! accessor constant per struct field plus a `table()` constructor returning
//! the table definition.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Ident, Lit, Meta, Type};

/// Derives field accessors and a table definition for a struct.
///
/// # Attributes
///
/// - `#[table(name = "table_name")]` - Specifies the SQL table name (optional,
///   defaults to snake_case of struct name)
///
/// # Field Attributes
///
/// - `#[column(primary_key)]` - Marks the field as primary key
/// - `#[column(name = "column_name")]` - Specifies the SQL column name
///   (optional, defaults to field name)
/// - `#[column(unique)]` - Marks the column as UNIQUE
/// - `#[column(autoincrement)]` - Marks the column as AUTOINCREMENT
/// - `#[column(default = "sql")]` - Sets the default; numbers, quoted
///   strings and `NULL` become constants, anything else an expression
///
/// Nullability follows the field type: `Option<T>` columns are nullable,
/// all others are `NOT NULL`.
///
/// # Generated Items
///
/// For a struct `User` with fields `id` and `name`, this macro generates:
///
/// - `User::ID` and `User::NAME`, typed `Field<User, _>` accessors
/// - `User::table()`, returning the `TableDef<User>` to register
#[proc_macro_derive(Table, attributes(table, column))]
pub fn derive_table(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_table_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_table_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let table_name = get_table_name(&input.attrs, struct_name)?;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Table derive does not support generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Table derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Table derive only supports structs",
            ));
        }
    };

    let mut column_infos: Vec<ColumnInfo> = Vec::new();
    for field in fields {
        let field_name = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let column_attrs = parse_column_attrs(&field.attrs)?;
        column_infos.push(ColumnInfo {
            column_name: column_attrs
                .name
                .unwrap_or_else(|| plain_name(&field_name)),
            field_type: field.ty.clone(),
            field_name,
            is_primary_key: column_attrs.primary_key,
            is_unique: column_attrs.unique,
            is_autoincrement: column_attrs.autoincrement,
            default_sql: column_attrs.default_sql,
        });
    }

    let accessors: Vec<TokenStream2> = column_infos
        .iter()
        .map(|info| {
            let field_name = &info.field_name;
            let field_type = &info.field_type;
            let column_name = &info.column_name;
            let const_name = accessor_name(field_name);
            let base = plain_name(field_name);
            let getter = format_ident!("__oxide_get_{}", base);
            let getter_mut = format_ident!("__oxide_get_{}_mut", base);
            let doc = format!("Accessor for column `{column_name}`.");
            quote! {
                #[doc = #doc]
                pub const #const_name: ::oxide_storage_core::Field<Self, #field_type> =
                    ::oxide_storage_core::Field::direct(#column_name, Self::#getter, Self::#getter_mut);

                #[doc(hidden)]
                const fn #getter(row: &Self) -> &#field_type {
                    &row.#field_name
                }

                #[doc(hidden)]
                fn #getter_mut(row: &mut Self) -> &mut #field_type {
                    &mut row.#field_name
                }
            }
        })
        .collect();

    let column_defs: Vec<TokenStream2> = column_infos
        .iter()
        .map(|info| {
            let const_name = accessor_name(&info.field_name);
            let mut def = quote! { ::oxide_storage_core::ColumnDef::new(Self::#const_name) };
            if info.is_primary_key {
                def = quote! { #def.primary_key() };
            }
            if info.is_autoincrement {
                def = quote! { #def.autoincrement() };
            }
            if info.is_unique {
                def = quote! { #def.unique() };
            }
            if let Some(sql) = &info.default_sql {
                let value = default_tokens(sql);
                def = quote! { #def.default_value(#value) };
            }
            def
        })
        .collect();

    let expanded = quote! {
        impl #struct_name {
            #(#accessors)*

            /// Returns the table definition for this row type.
            #[must_use]
            pub fn table() -> ::oxide_storage_core::TableDef<Self> {
                ::oxide_storage_core::TableDef::new(#table_name)
                    #(.column(#column_defs))*
            }
        }
    };

    Ok(expanded)
}

struct ColumnInfo {
    field_name: Ident,
    field_type: Type,
    column_name: String,
    is_primary_key: bool,
    is_unique: bool,
    is_autoincrement: bool,
    default_sql: Option<String>,
}

#[derive(Default)]
struct ColumnAttrs {
    name: Option<String>,
    primary_key: bool,
    unique: bool,
    autoincrement: bool,
    default_sql: Option<String>,
}

fn plain_name(field_name: &Ident) -> String {
    let name = field_name.to_string();
    name.strip_prefix("r#").map_or_else(|| name.clone(), ToString::to_string)
}

fn accessor_name(field_name: &Ident) -> Ident {
    format_ident!("{}", plain_name(field_name).to_ascii_uppercase())
}

/// Classifies a default clause into a `DefaultValue` constructor.
fn default_tokens(sql: &str) -> TokenStream2 {
    let sql = sql.trim();
    if sql.eq_ignore_ascii_case("null") {
        return quote! { ::oxide_storage_core::schema::DefaultValue::Null };
    }
    if let Ok(i) = sql.parse::<i64>() {
        return quote! { ::oxide_storage_core::schema::DefaultValue::Integer(#i) };
    }
    if let Ok(f) = sql.parse::<f64>() {
        if f.is_finite() {
            return quote! { ::oxide_storage_core::schema::DefaultValue::Float(#f) };
        }
    }
    if sql.len() >= 2 && sql.starts_with('\'') && sql.ends_with('\'') {
        let text = sql[1..sql.len() - 1].replace("''", "'");
        return quote! {
            ::oxide_storage_core::schema::DefaultValue::Text(::std::string::String::from(#text))
        };
    }
    quote! {
        ::oxide_storage_core::schema::DefaultValue::Expression(::std::string::String::from(#sql))
    }
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<Option<String>> {
    let value: Expr = meta.value()?.parse()?;
    if let Expr::Lit(lit) = value {
        if let Lit::Str(s) = lit.lit {
            return Ok(Some(s.value()));
        }
    }
    Err(meta.error("expected a string literal"))
}

fn get_table_name(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<String> {
    for attr in attrs {
        if attr.path().is_ident("table") {
            let mut table_name = None;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    table_name = string_value(&meta)?;
                    Ok(())
                } else {
                    Err(meta.error("unsupported table attribute"))
                }
            })?;
            if let Some(name) = table_name {
                return Ok(name);
            }
        }
    }
    // Default to snake_case of struct name
    Ok(to_snake_case(&struct_name.to_string()))
}

fn parse_column_attrs(attrs: &[Attribute]) -> syn::Result<ColumnAttrs> {
    let mut result = ColumnAttrs::default();

    for attr in attrs {
        if attr.path().is_ident("column") {
            // Handle empty attribute like #[column]
            if matches!(attr.meta, Meta::Path(_)) {
                continue;
            }

            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("primary_key") {
                    result.primary_key = true;
                } else if meta.path.is_ident("unique") {
                    result.unique = true;
                } else if meta.path.is_ident("autoincrement") {
                    result.autoincrement = true;
                } else if meta.path.is_ident("name") {
                    result.name = string_value(&meta)?;
                } else if meta.path.is_ident("default") {
                    result.default_sql = string_value(&meta)?;
                } else {
                    return Err(meta.error("unsupported column attribute"));
                }
                Ok(())
            })?;
        }
    }

    Ok(result)
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
