//! Macros for defining closed kind enums.

/// Macro for defining a closed kind enum backed by [`u8`].
///
/// The textual representation (used by [`Display`], [`FromStr`] and Serde)
/// follows the provided `case`, defaulting to `SCREAMING_SNAKE_CASE`. Serde
/// support is derived when the `serde` feature of this crate is enabled,
/// regardless of the features of the calling crate.
///
/// # Example
///
/// ```rust
/// # use common::define_kind;
/// define_kind! {
///     #[doc = "Shape kind."]
///     #[case = "snake_case"]
///     enum Kind {
///         #[doc = "A cube"]
///         Cube = 1,
///
///         #[doc = "A sphere"]
///         Sphere = 2,
///     }
/// }
///
/// assert_eq!(Kind::Cube.to_string(), "cube");
/// assert_eq!("sphere".parse::<Kind>(), Ok(Kind::Sphere));
/// assert_eq!(Kind::ALL, &[Kind::Cube, Kind::Sphere]);
/// ```
///
/// [`Display`]: std::fmt::Display
/// [`FromStr`]: std::str::FromStr
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_kind {
    (
        #[doc = $doc:literal]
        enum $name:ident {
            $(
                #[doc = $variant_doc:literal]
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        $crate::define_kind! {
            #[doc = $doc]
            #[case = "SCREAMING_SNAKE_CASE"]
            enum $name {
                $(
                    #[doc = $variant_doc]
                    $variant = $value,
                )*
            }
        }
    };

    (
        #[doc = $doc:literal]
        #[case = $case:literal]
        enum $name:ident {
            $(
                #[doc = $variant_doc:literal]
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        $crate::with_serde! {
            $case,
            #[derive(
                Clone,
                Copy,
                Debug,
                $crate::private::strum::Display,
                $crate::private::strum::EnumString,
                Eq,
                Hash,
                Ord,
                PartialEq,
                PartialOrd,
            )]
            #[doc = $doc]
            #[repr(u8)]
            #[strum(serialize_all = $case)]
            pub enum $name {
                $(
                     #[doc = $variant_doc]
                     $variant = $value,
                )*
            }
        }

        impl $name {
            /// All the variants, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];

            /// Converts this into its [`u8`] representation.
            #[must_use]
            pub const fn u8(self) -> u8 {
                self as u8
            }

            /// Converts the provided [`u8`] representation back into a
            /// variant, if it matches any.
            #[must_use]
            pub fn from_u8(v: u8) -> Option<Self> {
                Self::ALL.iter().copied().find(|k| k.u8() == v)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'a> $crate::private::postgres_types::FromSql<'a> for $name {
            $crate::private::postgres_types::accepts!(INT2);

            fn from_sql(
                ty: &$crate::private::postgres_types::Type,
                raw: &[u8],
            ) -> Result<
                $name,
                Box<dyn ::std::error::Error
                    + ::core::marker::Sync
                    + ::core::marker::Send>,
            > {
                let v = u8::try_from(i16::from_sql(ty, raw)?)?;
                Self::from_u8(v).ok_or_else(|| ::std::format!(
                    "invalid `{}` value: {v}",
                    ::core::stringify!($name),
                ).into())
            }
        }

        #[cfg(feature = "postgres")]
        impl $crate::private::postgres_types::ToSql for $name {
            $crate::private::postgres_types::accepts!(INT2);
            $crate::private::postgres_types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &$crate::private::postgres_types::Type,
                w: &mut $crate::private::postgres_types::private::BytesMut,
            ) -> Result<
                $crate::private::postgres_types::IsNull,
                ::std::boxed::Box<
                    dyn ::std::error::Error
                        + ::core::marker::Sync
                        + ::core::marker::Send
                >,
            > {
                i16::from(self.u8()).to_sql(ty, w)
            }
        }
    };
}

/// Derives Serde traits for the provided item, renaming its variants
/// according to the provided `case`.
///
/// Expands to the item as is when the `serde` feature of this crate is
/// disabled.
#[cfg(feature = "serde")]
#[doc(hidden)]
#[macro_export]
macro_rules! with_serde {
    ($case:literal, $item:item) => {
        #[derive(
            $crate::private::serde::Deserialize,
            $crate::private::serde::Serialize,
        )]
        #[serde(rename_all = $case)]
        $item
    };
}

/// Derives Serde traits for the provided item, renaming its variants
/// according to the provided `case`.
///
/// Expands to the item as is when the `serde` feature of this crate is
/// disabled.
#[cfg(not(feature = "serde"))]
#[doc(hidden)]
#[macro_export]
macro_rules! with_serde {
    ($case:literal, $item:item) => {
        $item
    };
}

#[cfg(test)]
mod spec {
    define_kind! {
        #[doc = "Test kind."]
        #[case = "snake_case"]
        enum Shape {
            #[doc = "Cube."]
            Cube = 1,

            #[doc = "Flat square."]
            FlatSquare = 3,
        }
    }

    define_kind! {
        #[doc = "Test kind with default case."]
        enum Loud {
            #[doc = "Quiet."]
            VeryQuiet = 7,
        }
    }

    #[test]
    fn uses_provided_case() {
        assert_eq!(Shape::FlatSquare.to_string(), "flat_square");
        assert_eq!("flat_square".parse::<Shape>(), Ok(Shape::FlatSquare));
        assert!("FlatSquare".parse::<Shape>().is_err());
    }

    #[test]
    fn defaults_to_screaming_snake_case() {
        assert_eq!(Loud::VeryQuiet.to_string(), "VERY_QUIET");
    }

    #[test]
    fn converts_from_u8() {
        assert_eq!(Shape::from_u8(1), Some(Shape::Cube));
        assert_eq!(Shape::from_u8(3), Some(Shape::FlatSquare));
        assert_eq!(Shape::from_u8(2), None);
        assert_eq!(Loud::VeryQuiet.u8(), 7);
    }
}
