use proc_macro::{self, TokenStream};

use proc_macro2 as pm2;

mod attributes;
mod row;

/// Derive the `IntoRow` trait, so that a record can be served by a
/// `MemoryEntity` and rendered as JSON.
///
/// This is only implemented for structs with named fields. All fields
/// will be included as cells by default, which means they must have
/// types which implement `IntoCellValue`. Every included cell is also
/// a column that filters and sorts can resolve. The annotations use
/// the `query` attribute, which has the following options:
///
/// - `#[query(rename="new_name")]` Expose the annotated member as
///   `new_name` instead of using its name in the source code.
///
/// - `#[query(exclude)]` Do not include the annotated member in any
///   output, and do not expose it as a column.
///
/// - `#[query(foreign_key="field_name")]` The field has a type which
///   is itself `IntoRow`. Rather than requiring the field's type to
///   implement `IntoCellValue`, instead take the value of the field
///   from the cell called `field_name` in the field's own row.
#[proc_macro_derive(IntoRow, attributes(query))]
pub fn into_row(input: TokenStream) -> TokenStream {
    let derive: syn::DeriveInput = syn::parse_macro_input!(input);

    let res: pm2::TokenStream = row::derive_into_row(derive);

    res.into()
}
