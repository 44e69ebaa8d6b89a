#[derive(Debug)]
pub enum QueryItem {
    Rename(syn::LitStr),
    Excluded,
    ForeignKey(syn::LitStr),
}

impl syn::parse::Parse for QueryItem {
    fn parse(input: syn::parse::ParseStream<'_>) -> syn::Result<Self> {
        let attr: syn::Ident = input.parse()?;
        match attr.to_string().as_str() {
            "rename" => {
                // rename = "MyString"
                let _: syn::Token![=] = input.parse()?;
                let new_name: syn::LitStr = input.parse()?;
                Ok(QueryItem::Rename(new_name))
            }
            "exclude" => Ok(QueryItem::Excluded),
            "foreign_key" => {
                let _: syn::Token![=] = input.parse()?;
                let key = input.parse()?;
                Ok(QueryItem::ForeignKey(key))
            }
            _ => Err(syn::Error::new_spanned(attr, "unsupported query attribute")),
        }
    }
}

#[derive(Debug)]
pub enum QueryCell {
    Scalar,
    ForeignRow(syn::LitStr),
    Excluded,
}

#[derive(Debug)]
pub struct QueryMeta {
    pub name: Option<syn::LitStr>,
    pub cell: QueryCell,
}

impl syn::parse::Parse for QueryMeta {
    fn parse(input: syn::parse::ParseStream<'_>) -> syn::Result<Self> {
        let punc =
            syn::punctuated::Punctuated::<QueryItem, syn::Token![,]>::parse_terminated(input)?;

        let mut name = None;
        let mut excluded = false;
        let mut foreign_key = None;

        for item in punc {
            match item {
                QueryItem::Rename(new_name) => name = Some(new_name),
                QueryItem::Excluded => excluded = true,
                QueryItem::ForeignKey(key) => foreign_key = Some(key),
            }
        }

        let cell = if excluded {
            QueryCell::Excluded
        } else if let Some(key) = foreign_key {
            QueryCell::ForeignRow(key)
        } else {
            QueryCell::Scalar
        };

        Ok(Self { name, cell })
    }
}
