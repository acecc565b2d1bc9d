use core::fmt::{self, Display};

use serde::Deserialize;

/// SMTP service extensions advertised in the EHLO response.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Extension {
    /// RFC 2920. Clients may send several commands without waiting.
    Pipelining,

    /// RFC 6152. Message bodies are passed through untouched, so 8-bit
    /// content costs nothing extra.
    #[serde(rename = "8bitmime")]
    EightBitMime,

    /// RFC 2034. Every reply carries a `class.subject.detail` code.
    EnhancedStatusCodes,

    /// RFC 1870 message size declaration.
    ///
    /// A `SIZE=` parameter above this value is refused at MAIL FROM with
    /// `552`. Zero advertises the extension without a limit.
    Size(usize),

    /// RFC 4954 authentication with the listed SASL mechanisms.
    Auth(Vec<String>),
}

impl Display for Extension {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Pipelining => fmt.write_str("PIPELINING"),
            Self::EightBitMime => fmt.write_str("8BITMIME"),
            Self::EnhancedStatusCodes => fmt.write_str("ENHANCEDSTATUSCODES"),
            Self::Size(0) => fmt.write_str("SIZE"),
            Self::Size(max) => write!(fmt, "SIZE {max}"),
            Self::Auth(mechanisms) => write!(fmt, "AUTH {}", mechanisms.join(" ")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::Extension;

    #[test]
    fn advertised_form() {
        assert_eq!(Extension::Size(40_000_000).to_string(), "SIZE 40000000");
        assert_eq!(Extension::Size(0).to_string(), "SIZE");
        assert_eq!(
            Extension::Auth(vec![String::from("PLAIN")]).to_string(),
            "AUTH PLAIN"
        );
        assert_eq!(Extension::EightBitMime.to_string(), "8BITMIME");
    }
}
