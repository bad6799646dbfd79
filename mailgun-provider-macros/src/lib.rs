#[macro_export]
/// The `form_params!` macro turns an options struct whose fields are all `Option<T>`
/// into a serializable form body for the Mailgun API.
///
/// This macro supports:
/// - Required fields, failing with `"<field> is required"` when the option is `None`
/// - Optional fields, skipped from the encoded body when the option is `None`
/// - Renaming fields to the form keys Mailgun expects
///
/// # Usage
///
/// ```rust,ignore
/// let form = form_params!(options, CreateDomainForm, {
///     required name: String => "name",
///     optional wildcard: bool => "wildcard"
/// });
/// let body = serde_urlencoded::to_string(&form)?;
/// ```
///
/// Where:
/// - `options` is the value holding the `Option<T>` fields
/// - `CreateDomainForm` is the name of the struct to be generated
/// - `Type` is the inner type of the option
/// - the literal is the form key
///
/// The missing-field error is a `String`, so the calling function's error type
/// needs a `From<String>` conversion for `?` to apply.
macro_rules! form_params {
    (@extract_required $source:expr, $field:ident) => {
        $source
            .$field
            .clone()
            .ok_or_else(|| format!("{} is required", stringify!($field)))?
    };

    (
        $source:expr,
        $struct_name:ident,
        {
            $( required $req_field:ident : $req_ty:ty => $req_key:literal ),* $(,)*
            $( optional $opt_field:ident : $opt_ty:ty => $opt_key:literal ),* $(,)*
        }
    ) => {{
        #[derive(Debug, serde::Serialize)]
        struct $struct_name {
            $(
                #[serde(rename = $req_key)]
                $req_field: $req_ty,
            )*
            $(
                #[serde(rename = $opt_key, skip_serializing_if = "Option::is_none")]
                $opt_field: Option<$opt_ty>,
            )*
        }

        $struct_name {
            $(
                $req_field: $crate::form_params!(@extract_required $source, $req_field),
            )*
            $(
                $opt_field: $source.$opt_field.clone(),
            )*
        }
    }};
}
