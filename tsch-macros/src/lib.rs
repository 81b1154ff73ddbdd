use proc_macro::TokenStream;
use quote::{format_ident, quote, ToTokens};
use syn::{parse_macro_input, Attribute, ItemStruct};

fn int_arg(attrs: &[Attribute], name: &str) -> Option<usize> {
    attrs
        .iter()
        .find(|attr| attr.path().is_ident(name))
        .map(|attr| {
            attr.parse_args::<syn::LitInt>()
                .and_then(|lit| lit.base10_parse::<usize>())
                .unwrap_or_else(|_| panic!("#[{name}(..)] expects an integer literal"))
        })
}

fn natural_size(ty: &str) -> Option<usize> {
    match ty {
        "bool" | "u8" => Some(1),
        "u16" | "i16" => Some(2),
        "u32" | "i32" => Some(4),
        "u64" => Some(8),
        _ => None,
    }
}

/// Generate a zero-copy reader/writer for a fixed layout structure.
///
/// Fields are laid out in declaration order, little endian. The width of a
/// field is taken from its type, or from `#[bytes(n)]` for truncated
/// integers (e.g. a 5 byte `u64`). `#[bits(n)]` packs `u8`/`bool` fields in
/// the current byte, LSB first. Fields whose name contains `reserved` only
/// occupy space.
///
/// The generated type gets `new` (length checked), `new_unchecked`,
/// `check_len`, `size`, getters and, for mutable buffers, `set_*` setters.
#[proc_macro_attribute]
pub fn frame(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);

    let item_attr = input.attrs;
    let vis = input.vis;
    let name = input.ident;

    let mut getters = vec![];
    let mut setters = vec![];

    let mut offset = 0usize;
    let mut bits_offset = 0usize;

    for field in input.fields {
        let Some(fnname) = field.ident else {
            panic!("#[frame] only supports named fields");
        };
        let ty = field.ty;
        let ty_str = ty.to_token_stream().to_string();

        let doc: Vec<_> = field
            .attrs
            .iter()
            .filter(|attr| attr.path().is_ident("doc"))
            .collect();

        let bits = int_arg(&field.attrs, "bits");
        let bytes = int_arg(&field.attrs, "bytes").or_else(|| natural_size(&ty_str));

        let field_offset = offset;
        let field_bits_offset = bits_offset;

        if !fnname.to_string().contains("reserved") {
            let setter_name = format_ident!("set_{}", fnname);

            let (getter, setter) = match (ty_str.as_str(), bits) {
                ("bool", _) => (
                    quote! {
                        ((self.buffer.as_ref()[#field_offset] >> #field_bits_offset) & 0b1) != 0
                    },
                    quote! {
                        let b = &mut self.buffer.as_mut()[#field_offset];
                        *b &= !(0b1 << #field_bits_offset);
                        *b |= (value as u8) << #field_bits_offset;
                    },
                ),
                ("u8", Some(bits)) => (
                    quote! {
                        (self.buffer.as_ref()[#field_offset] >> #field_bits_offset)
                            & (((1u16 << #bits) - 1) as u8)
                    },
                    quote! {
                        let mask = (((1u16 << #bits) - 1) as u8) << #field_bits_offset;
                        let b = &mut self.buffer.as_mut()[#field_offset];
                        *b &= !mask;
                        *b |= (value << #field_bits_offset) & mask;
                    },
                ),
                ("u8" | "u16" | "i16" | "u32" | "i32" | "u64", _) => {
                    let width = bytes.unwrap_or(0);
                    let full = natural_size(&ty_str).unwrap_or(0);
                    (
                        quote! {
                            let mut raw = [0u8; #full];
                            raw[..#width].copy_from_slice(
                                &self.buffer.as_ref()[#field_offset..][..#width],
                            );
                            #ty::from_le_bytes(raw)
                        },
                        quote! {
                            let raw = value.to_le_bytes();
                            self.buffer.as_mut()[#field_offset..][..#width]
                                .copy_from_slice(&raw[..#width]);
                        },
                    )
                }
                ("& [u8]", _) => {
                    let getter = if bytes == Some(0) || bytes.is_none() {
                        quote! { &self.buffer.as_ref()[#field_offset..] }
                    } else {
                        quote! { &self.buffer.as_ref()[#field_offset..][..#bytes] }
                    };
                    (getter, quote! {})
                }
                _ => panic!("#[frame] does not support field type `{ty_str}`"),
            };

            getters.push(quote! {
                #(#doc)*
                #[inline]
                pub fn #fnname(&self) -> #ty {
                    #getter
                }
            });

            if ty_str != "& [u8]" {
                let setter_doc = format!("Set the `{}` field.", fnname);
                setters.push(quote! {
                    #[doc = #setter_doc]
                    #[inline]
                    pub fn #setter_name(&mut self, value: #ty) {
                        #setter
                    }
                });
            }
        }

        match bits {
            Some(bits) => {
                bits_offset += bits;
                if bits_offset >= 8 {
                    offset += bits_offset / 8;
                    bits_offset %= 8;
                }
            }
            None if ty_str == "& [u8]" => offset += bytes.unwrap_or(0),
            None => offset += bytes.unwrap_or(0),
        }
    }

    let size = offset + usize::from(bits_offset != 0);

    quote! {
        #(#item_attr)*
        #vis struct #name<T: AsRef<[u8]>> {
            buffer: T,
        }

        impl<T: AsRef<[u8]>> #name<T> {
            /// Create a new reader, checking that the buffer is large enough.
            pub fn new(buffer: T) -> crate::Result<Self> {
                let s = Self::new_unchecked(buffer);

                if !s.check_len() {
                    return Err(crate::Error);
                }

                Ok(s)
            }

            /// Create a new reader without checking the buffer length.
            pub fn new_unchecked(buffer: T) -> Self {
                Self { buffer }
            }

            /// Returns `false` if the buffer is too short for this structure.
            pub fn check_len(&self) -> bool {
                self.buffer.as_ref().len() >= Self::size()
            }

            /// Returns the size of this structure in bytes.
            pub const fn size() -> usize {
                #size
            }

            /// Consume the reader, returning the underlying buffer.
            pub fn into_inner(self) -> T {
                self.buffer
            }

            #(#getters)*
        }

        impl<T: AsRef<[u8]> + AsMut<[u8]>> #name<T> {
            #(#setters)*
        }
    }
    .into()
}
