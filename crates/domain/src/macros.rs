//! Macro for implementing wire conversions on fieldless enums
//!
//! Backend payloads carry enums as upper-case strings (`"WORK"`,
//! `"HISTORICAL"`). This macro generates the string mapping once and derives
//! `Display`, `FromStr`, and serde support from it so the three can never
//! drift apart.
//!
//! # Example
//!
//! ```rust
//! use tidewater_domain::impl_wire_enum;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Phase {
//!     Starting,
//!     Completed,
//! }
//!
//! impl_wire_enum!(Phase {
//!     Starting => "STARTING",
//!     Completed => "COMPLETED",
//! });
//!
//! assert_eq!(Phase::Starting.to_string(), "STARTING");
//! assert_eq!("completed".parse::<Phase>().unwrap(), Phase::Completed);
//! ```

/// Implements `as_str`, `Display`, `FromStr`, `Serialize`, and `Deserialize`
/// for a fieldless enum from a single variant-to-string table.
///
/// Parsing is case-insensitive; output always uses the table spelling.
#[macro_export]
macro_rules! impl_wire_enum {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Wire spelling of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }

        impl ::serde::Serialize for $enum_name {
            fn serialize<S: ::serde::Serializer>(
                &self,
                serializer: S,
            ) -> ::std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $enum_name {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> ::std::result::Result<Self, D::Error> {
                let raw = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(::serde::de::Error::custom)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestKind {
        Alpha,
        BetaGamma,
    }

    impl_wire_enum!(TestKind {
        Alpha => "ALPHA",
        BetaGamma => "BETA_GAMMA",
    });

    #[test]
    fn test_display_uses_table_spelling() {
        assert_eq!(TestKind::Alpha.to_string(), "ALPHA");
        assert_eq!(TestKind::BetaGamma.to_string(), "BETA_GAMMA");
    }

    #[test]
    fn test_fromstr_is_case_insensitive() {
        assert_eq!(TestKind::from_str("alpha").unwrap(), TestKind::Alpha);
        assert_eq!(TestKind::from_str("Beta_Gamma").unwrap(), TestKind::BetaGamma);
    }

    #[test]
    fn test_fromstr_invalid() {
        let err = TestKind::from_str("delta").unwrap_err();
        assert!(err.contains("Invalid TestKind: delta"));
    }

    #[test]
    fn test_serde_uses_wire_string() {
        let json = serde_json::to_string(&TestKind::BetaGamma).unwrap();
        assert_eq!(json, "\"BETA_GAMMA\"");
        let parsed: TestKind = serde_json::from_str("\"alpha\"").unwrap();
        assert_eq!(parsed, TestKind::Alpha);
        assert!(serde_json::from_str::<TestKind>("\"nope\"").is_err());
    }
}
