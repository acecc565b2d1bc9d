use core::fmt::{self, Display, Formatter};

use ahash::AHashMap;
use mailparse::MailAddr;

/// ESMTP parameters for the MAIL FROM command (RFC 5321 Section 3.3).
///
/// Keys are normalised to uppercase. Only `SIZE` is interpreted by the
/// relay, everything else is carried along so it can be logged.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct MailParameters {
    params: AHashMap<String, Option<String>>,
}

impl MailParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses parameter tokens in the form `KEY=VALUE` or `FLAG`.
    ///
    /// # Errors
    ///
    /// Returns an error if a parameter appears more than once, or if the
    /// `SIZE` parameter is not a positive integer.
    pub fn from_params_str(params_str: &str) -> Result<Self, String> {
        let mut params = Self::new();

        for token in params_str.split_whitespace() {
            let (key, value) = match token.split_once('=') {
                Some((key, value)) => (key.to_ascii_uppercase(), Some(value.to_string())),
                None => (token.to_ascii_uppercase(), None),
            };

            if params.params.contains_key(&key) {
                return Err(format!("Duplicate parameter '{key}' not allowed"));
            }

            if key == "SIZE" {
                match value.as_deref().map(str::parse::<usize>) {
                    Some(Ok(0)) => return Err(String::from("SIZE=0 is not allowed")),
                    Some(Ok(_)) => {}
                    _ => {
                        return Err(format!(
                            "Invalid SIZE value: {}",
                            value.as_deref().unwrap_or_default()
                        ));
                    }
                }
            }

            params.params.insert(key, value);
        }

        Ok(params)
    }

    /// Gets a parameter value by key (case-insensitive).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(&key.to_ascii_uppercase())?.as_deref()
    }

    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.params.contains_key(&key.to_ascii_uppercase())
    }

    /// The declared message size, if the client sent one.
    #[must_use]
    pub fn size(&self) -> Option<usize> {
        self.get("SIZE")?.parse().ok()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl Display for MailParameters {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.params {
            if !first {
                f.write_str(" ")?;
            }
            first = false;

            match v {
                None => f.write_str(k)?,
                Some(val) => write!(f, "{k}={val}")?,
            }
        }
        Ok(())
    }
}

#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub enum HeloVariant {
    Ehlo(String),
    Helo(String),
}

impl HeloVariant {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Ehlo(id) | Self::Helo(id) => id,
        }
    }
}

impl Display for HeloVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ehlo(_) => "EHLO",
            Self::Helo(_) => "HELO",
        })
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Command {
    Helo(HeloVariant),
    /// An empty sender is the `null reverse-path` from RFC 5321.
    MailFrom(String, MailParameters),
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Vrfy(String),
    Help,
    /// `AUTH <mechanism> [initial-response]`
    Auth {
        mechanism: String,
        initial: Option<String>,
    },
    Quit,
    /// A known command with unusable arguments.
    Invalid(String),
    /// Anything that isn't a command we know about.
    Unrecognised(String),
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(v) => write!(fmt, "{v} {}", v.id()),
            Self::MailFrom(from, params) if params.is_empty() => write!(fmt, "MAIL FROM:<{from}>"),
            Self::MailFrom(from, params) => write!(fmt, "MAIL FROM:<{from}> {params}"),
            Self::RcptTo(to) => write!(fmt, "RCPT TO:<{to}>"),
            Self::Data => fmt.write_str("DATA"),
            Self::Rset => fmt.write_str("RSET"),
            Self::Noop => fmt.write_str("NOOP"),
            Self::Vrfy(arg) => write!(fmt, "VRFY {arg}"),
            Self::Help => fmt.write_str("HELP"),
            // Never echo credentials into the logs.
            Self::Auth { mechanism, .. } => write!(fmt, "AUTH {mechanism}"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Invalid(s) | Self::Unrecognised(s) => fmt.write_str(s),
        }
    }
}

/// Splits `<path> [params]` into the path and whatever follows it.
fn split_path(rest: &str) -> (&str, &str) {
    let rest = rest.trim_start();
    if rest.starts_with('<') {
        if let Some(end) = rest.find('>') {
            return (&rest[..=end], rest[end + 1..].trim());
        }
    }

    rest.split_once(char::is_whitespace)
        .map_or((rest, ""), |(path, params)| (path, params.trim()))
}

fn parse_address(path: &str) -> Result<String, String> {
    let addresses = mailparse::addrparse(path).map_err(|err| err.to_string())?;

    match addresses.first() {
        Some(MailAddr::Single(single)) if addresses.len() == 1 => Ok(single.addr.clone()),
        Some(MailAddr::Group(_)) => Err(format!("Group addresses are not accepted: {path}")),
        _ => Err(format!("Expected a single address: {path}")),
    }
}

/// Matches `verb` against the start of `line` case-insensitively and returns
/// the remainder.
fn strip_verb<'a>(line: &'a str, verb: &str) -> Option<&'a str> {
    let head = line.get(..verb.len())?;
    head.eq_ignore_ascii_case(verb).then(|| &line[verb.len()..])
}

impl TryFrom<&str> for Command {
    type Error = Self;

    fn try_from(command: &str) -> Result<Self, Self::Error> {
        let trimmed = command.trim();

        if let Some(rest) = strip_verb(trimmed, "MAIL FROM:") {
            let (path, params) = split_path(rest);
            if path.is_empty() {
                return Err(Self::Invalid(String::from("Expected a reverse-path")));
            }

            let params = MailParameters::from_params_str(params).map_err(Self::Invalid)?;

            // mailparse has no notion of the null sender.
            if path == "<>" {
                return Ok(Self::MailFrom(String::new(), params));
            }

            return parse_address(path)
                .map(|from| Self::MailFrom(from, params))
                .map_err(Self::Invalid);
        }

        if let Some(rest) = strip_verb(trimmed, "RCPT TO:") {
            let (path, _params) = split_path(rest);
            if path.is_empty() || path == "<>" {
                return Err(Self::Invalid(String::from("Expected a forward-path")));
            }

            return parse_address(path).map(Self::RcptTo).map_err(Self::Invalid);
        }

        let (verb, argument) = trimmed
            .split_once(char::is_whitespace)
            .map_or((trimmed, ""), |(verb, arg)| (verb, arg.trim()));

        match verb.to_ascii_uppercase().as_str() {
            "EHLO" | "HELO" if argument.is_empty() => {
                Err(Self::Invalid(format!("Expected hostname in {trimmed}")))
            }
            "EHLO" => Ok(Self::Helo(HeloVariant::Ehlo(argument.to_string()))),
            "HELO" => Ok(Self::Helo(HeloVariant::Helo(argument.to_string()))),
            "DATA" if argument.is_empty() => Ok(Self::Data),
            "RSET" if argument.is_empty() => Ok(Self::Rset),
            "QUIT" if argument.is_empty() => Ok(Self::Quit),
            "DATA" | "RSET" | "QUIT" => {
                Err(Self::Invalid(format!("{verb} does not take arguments")))
            }
            "NOOP" => Ok(Self::Noop),
            "HELP" => Ok(Self::Help),
            "VRFY" if argument.is_empty() => Err(Self::Invalid(String::from("Expected a user"))),
            "VRFY" => Ok(Self::Vrfy(argument.to_string())),
            "AUTH" => {
                let mut parts = argument.split_whitespace();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(mechanism), initial, None) => Ok(Self::Auth {
                        mechanism: mechanism.to_ascii_uppercase(),
                        initial: initial.map(ToString::to_string),
                    }),
                    _ => Err(Self::Invalid(String::from(
                        "Expected AUTH <mechanism> [initial-response]",
                    ))),
                }
            }
            "MAIL" | "RCPT" => Err(Self::Invalid(format!("Malformed {verb} command"))),
            _ => Err(Self::Unrecognised(command.to_owned())),
        }
    }
}

impl TryFrom<String> for Command {
    type Error = Self;

    fn try_from(command: String) -> Result<Self, Self::Error> {
        Self::try_from(command.as_str())
    }
}
