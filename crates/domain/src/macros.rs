//! Macro for implementing Display and FromStr for status enums
//!
//! Status-like enums are persisted and exchanged as lowercase strings. The
//! macro keeps the string mapping in one place and parses case-insensitively.
//!
//! # Example
//!
//! ```rust
//! use shelfsync_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum OfferStatus {
//!     Buyable,
//!     Disabled,
//! }
//!
//! impl_domain_status_conversions!(OfferStatus {
//!     Buyable => "buyable",
//!     Disabled => "disabled",
//! });
//!
//! assert_eq!(OfferStatus::Buyable.to_string(), "buyable");
//! assert_eq!("DISABLED".parse::<OfferStatus>(), Ok(OfferStatus::Disabled));
//! ```

/// Implements Display and FromStr traits for status enums
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their lowercase string
///   representations
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Lowercase string form.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
