use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, quote_spanned};
use std::{fs, path::Path};
use syn::{parse_macro_input, spanned::Spanned, Data, DeriveInput, Expr, Fields, Ident, Lit, Type};

// example:
// #[derive(CtfEventClass)]
// #[event_name = "TRACE_START"]
// pub struct TraceStart<'a> {
//     pub task_handle: i64,
//     pub task: &'a CStr,
// }
#[proc_macro_derive(CtfEventClass, attributes(event_name, event_name_from_event_type))]
pub fn derive_ctf_event_class(input: TokenStream) -> TokenStream {
    // TODO generic enum handling, TaskState is an enum
    let supported_types = ["i64", "u64", "CStr", "TaskState"];

    let input = parse_macro_input!(input as DeriveInput);

    let type_name = input.ident;

    let attr_event_name = input.attrs.iter().find_map(|a| {
        if let Ok(val) = a.meta.require_name_value() {
            if val.path.is_ident("event_name") {
                if let Expr::Lit(lit) = &val.value {
                    if let Lit::Str(s) = &lit.lit {
                        return Some(s.value());
                    }
                }
            }
        }
        None
    });
    let name_from_event_type = input
        .attrs
        .iter()
        .any(|a| a.meta.path().is_ident("event_name_from_event_type"));

    let event_name = attr_event_name.unwrap_or_else(|| type_name.to_string().to_case(Case::Snake));

    let struct_fields = if let Data::Struct(s) = input.data {
        s.fields
    } else {
        return quote_spanned! {
            type_name.span() => compile_error!(
                "Can only derive CtfEventClass on structs."
            );
        }
        .into();
    };

    let mut field_class_appends = Vec::new();
    match struct_fields {
        Fields::Named(fields) => {
            for field in fields.named.into_iter() {
                let field_name = field
                    .ident
                    .as_ref()
                    .expect("Failed to get struct field identifier.")
                    .clone();
                let typ = match &field.ty {
                    Type::Path(t) => t
                        .path
                        .get_ident()
                        .expect("Failed to get struct field type.")
                        .to_string(),
                    Type::Reference(t) => {
                        if let Type::Path(t) = t.elem.as_ref() {
                            t.path
                                .get_ident()
                                .expect("Failed to get struct field type.")
                                .to_string()
                        } else {
                            return quote_spanned! {
                                type_name.span() => compile_error!(
                                    "Deriving CtfEventClass for the type is not supported."
                                );
                            }
                            .into();
                        }
                    }
                    _ => {
                        return quote_spanned! {
                            type_name.span() => compile_error!(
                                "Deriving CtfEventClass for the type is not supported."
                            );
                        }
                        .into()
                    }
                };
                if !supported_types.contains(&typ.as_str()) {
                    return quote_spanned! {
                        type_name.span() => compile_error!(
                            "Deriving CtfEventClass for the type is not supported."
                        );
                    }
                    .into();
                }
                field_class_appends.push(payload_member_append(&field_name, &typ));
            }
        }
        _ => {
            return quote_spanned! {
                type_name.span() => compile_error!(
                    "Deriving CtfEventClass for the type is not supported."
                );
            }
            .into()
        }
    }

    let mut payload_body = TokenStream2::new();
    payload_body.extend(field_class_appends);

    let payload_field_class_fn = quote! {
        pub(crate) fn payload_field_class() -> ctf_ir::Result<ctf_ir::field_class::FieldClassRef> {
            use ctf_ir::field_class::{
                ByteOrder, CharacterEncoding, DisplayBase, EnumerationFieldClass,
                EnumerationRanges, FieldClass, FieldClassKind, IntegerFieldClass,
                StringFieldClass, StructureFieldClass,
            };

            let mut payload = StructureFieldClass::new();

            #payload_body

            Ok(FieldClass::new(FieldClassKind::Structure(payload)))
        }
    };

    let event_class_impl = if name_from_event_type {
        quote! {
            pub(crate) fn event_class(
                event_type: trace_recorder_parser::streaming::event::EventType,
                stream_class: &ctf_ir::trace::StreamClassRef,
            ) -> ctf_ir::Result<ctf_ir::trace::EventClassRef> {
                let ec = stream_class.borrow_mut().create_event_class()?;
                ec.borrow_mut().set_name(event_type.to_string())?;
                ec.borrow_mut().set_payload_field_class(Self::payload_field_class()?)?;
                Ok(ec)
            }
        }
    } else {
        quote! {
            pub(crate) fn event_class(
                stream_class: &ctf_ir::trace::StreamClassRef,
            ) -> ctf_ir::Result<ctf_ir::trace::EventClassRef> {
                let ec = stream_class.borrow_mut().create_event_class()?;
                ec.borrow_mut().set_name(#event_name)?;
                ec.borrow_mut().set_payload_field_class(Self::payload_field_class()?)?;
                Ok(ec)
            }
        }
    };

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let impl_block = quote! {
        impl #impl_generics #type_name #ty_generics #where_clause {
            #payload_field_class_fn

            #event_class_impl
        }
    };

    let ts = TokenStream::from(impl_block);

    let target_dir = Path::new("target");
    if target_dir.exists() {
        let out_dir = target_dir.join("ctf_events");
        if !out_dir.exists() {
            fs::create_dir_all(&out_dir).ok();
        }
        fs::write(
            format!(
                "{}/ctf_event_expansion__{}.rs",
                out_dir.display(),
                type_name
            ),
            ts.to_string(),
        )
        .ok();
    }
    ts
}

/// Builds the field class for one struct field and appends it to the
/// in-progress `payload` structure field class under construction in
/// `payload_field_class`.
fn payload_member_append(field_name: &Ident, typ: &str) -> TokenStream2 {
    let member_name = field_name.to_string();
    match typ {
        "i64" => quote! {
            {
                let fc = FieldClass::new(FieldClassKind::Integer(IntegerFieldClass {
                    signed: true,
                    width: 64,
                    alignment: 8,
                    display_base: DisplayBase::Decimal,
                    encoding: CharacterEncoding::None,
                    byte_order: ByteOrder::LittleEndian,
                    mapped_clock_class: None,
                }));
                payload.append_member(#member_name, fc)?;
            }
        },
        "u64" => quote! {
            {
                let fc = FieldClass::new(FieldClassKind::Integer(IntegerFieldClass {
                    signed: false,
                    width: 64,
                    alignment: 8,
                    display_base: DisplayBase::Decimal,
                    encoding: CharacterEncoding::None,
                    byte_order: ByteOrder::LittleEndian,
                    mapped_clock_class: None,
                }));
                payload.append_member(#member_name, fc)?;
            }
        },
        "CStr" => quote! {
            {
                let fc = FieldClass::new(FieldClassKind::String(StringFieldClass {
                    encoding: CharacterEncoding::Utf8,
                }));
                payload.append_member(#member_name, fc)?;
            }
        },
        // enums: a signed integer container with one mapping per variant.
        "TaskState" => quote! {
            {
                let container = IntegerFieldClass {
                    signed: true,
                    width: 64,
                    alignment: 8,
                    display_base: DisplayBase::Decimal,
                    encoding: CharacterEncoding::None,
                    byte_order: ByteOrder::LittleEndian,
                    mapped_clock_class: None,
                };
                let mut mappings = Vec::new();
                for variant in enum_iterator::all::<TaskState>() {
                    let mut range = ctf_ir::interval::SignedIntegerRangeSet::new();
                    range.add_range(variant.as_i64(), variant.as_i64())?;
                    mappings.push((format!("{variant:?}"), EnumerationRanges::Signed(range)));
                }
                let fc = FieldClass::new(FieldClassKind::Enumeration(EnumerationFieldClass {
                    container,
                    mappings,
                }));
                payload.append_member(#member_name, fc)?;
            }
        },
        // Checked by the caller.
        _ => unreachable!(),
    }
}
