use proc_macro2 as pm2;

use crate::attributes::{QueryCell, QueryMeta};

pub fn derive_into_row(input: syn::DeriveInput) -> pm2::TokenStream {
    let syn::DeriveInput {
        ident,
        data,
        generics,
        ..
    } = input;

    let mut cells = pm2::TokenStream::new();
    let mut cols = pm2::TokenStream::new();

    let (generics, ty_generics, wc) = generics.split_for_impl();

    let named = match data {
        syn::Data::Struct(syn::DataStruct {
            fields: syn::Fields::Named(syn::FieldsNamed { named, .. }),
            ..
        }) => named,
        _ => {
            return syn::Error::new(
                ident.span(),
                "IntoRow can only be derived for structs with named fields.",
            )
            .to_compile_error();
        }
    };

    for field in named.iter() {
        let fieldid = match field.ident.as_ref() {
            Some(id) => id,
            None => continue,
        };
        let mut fieldname = syn::LitStr::new(&fieldid.to_string(), fieldid.span());
        let fieldtype = &field.ty;

        let mut excluded = false;
        let mut key = None;

        for attr in field.attrs.iter() {
            if attr.path.is_ident("query") {
                let parsed = match attr.parse_args::<QueryMeta>() {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        return syn::Error::into_compile_error(e);
                    }
                };
                match parsed.cell {
                    QueryCell::Excluded => excluded = true,
                    QueryCell::ForeignRow(fkey) => key = Some(fkey),
                    QueryCell::Scalar => {}
                }
                if let Some(name) = parsed.name {
                    fieldname = name;
                }
            }
        }

        if excluded {
            continue;
        }

        if let Some(key) = key {
            cells.extend(quote::quote! {
                visitor.visit_value(#fieldname, <#fieldtype as ::query_builder::row::AsForeignKey>::as_foreign_key(&self.#fieldid, #key));
            });
        } else {
            cells.extend(quote::quote! {
                visitor.visit_value(#fieldname, <#fieldtype as ::query_builder::row::IntoCellValue>::to_cell_value(&self.#fieldid));
            });
        }
        cols.extend(quote::quote! {
            visitor.visit_column(#fieldname);
        });
    }

    quote::quote! {
        const _: () = {
            #[automatically_derived]
            impl #generics ::query_builder::row::IntoRow for #ident #ty_generics #wc {
                fn accept_cell_visitor<V: ::query_builder::row::CellVisitor>(&self, visitor: &mut V)
                {
                    #cells
                }
                fn accept_column_visitor<V: ::query_builder::row::ColumnVisitor>(visitor: &mut V)
                {
                    #cols
                }
            }
        };
    }
}
