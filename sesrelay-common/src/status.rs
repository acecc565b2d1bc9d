use core::fmt::{self, Display, Formatter};
use std::borrow::Cow;

#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Debug)]
pub enum Status {
    HelpMessage = 214,
    ServiceReady = 220,
    GoodBye = 221,
    AuthSucceeded = 235,
    Ok = 250,
    CannotVerify = 252,
    AuthContinue = 334,
    StartMailInput = 354,
    Unavailable = 421,
    ActionAborted = 451,
    SyntaxError = 500,
    ParameterError = 501,
    NotImplemented = 502,
    InvalidCommandSequence = 503,
    ParameterNotImplemented = 504,
    Error = 550,
    ExceededStorage = 552,
    TransactionFailed = 554,
    Unknown(u32),
}

impl Status {
    /// Checks if the status is a permanent rejection
    pub fn is_permanent(self) -> bool {
        u32::from(self) >= 500
    }

    /// Checks if the status is a temporary rejection
    pub fn is_temporary(self) -> bool {
        (400..500).contains(&u32::from(self))
    }
}

impl From<u32> for Status {
    fn from(value: u32) -> Self {
        match value {
            214 => Self::HelpMessage,
            220 => Self::ServiceReady,
            221 => Self::GoodBye,
            235 => Self::AuthSucceeded,
            250 => Self::Ok,
            252 => Self::CannotVerify,
            334 => Self::AuthContinue,
            354 => Self::StartMailInput,
            421 => Self::Unavailable,
            451 => Self::ActionAborted,
            500 => Self::SyntaxError,
            501 => Self::ParameterError,
            502 => Self::NotImplemented,
            503 => Self::InvalidCommandSequence,
            504 => Self::ParameterNotImplemented,
            550 => Self::Error,
            552 => Self::ExceededStorage,
            554 => Self::TransactionFailed,
            _ => Self::Unknown(value),
        }
    }
}

impl From<Status> for u32 {
    fn from(value: Status) -> Self {
        match value {
            Status::HelpMessage => 214,
            Status::ServiceReady => 220,
            Status::GoodBye => 221,
            Status::AuthSucceeded => 235,
            Status::Ok => 250,
            Status::CannotVerify => 252,
            Status::AuthContinue => 334,
            Status::StartMailInput => 354,
            Status::Unavailable => 421,
            Status::ActionAborted => 451,
            Status::SyntaxError => 500,
            Status::ParameterError => 501,
            Status::NotImplemented => 502,
            Status::InvalidCommandSequence => 503,
            Status::ParameterNotImplemented => 504,
            Status::Error => 550,
            Status::ExceededStorage => 552,
            Status::TransactionFailed => 554,
            Status::Unknown(v) => v,
        }
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", u32::from(*self))
    }
}

/// Enhanced mail system status code (RFC 3463), `class.subject.detail`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EnhancedCode {
    class: u8,
    subject: u16,
    detail: u16,
}

impl EnhancedCode {
    #[must_use]
    pub const fn new(class: u8, subject: u16, detail: u16) -> Self {
        Self {
            class,
            subject,
            detail,
        }
    }
}

impl Display for EnhancedCode {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}.{}.{}", self.class, self.subject, self.detail)
    }
}

/// A single-line reply sent back to the client.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Reply {
    pub status: Status,
    pub enhanced: Option<EnhancedCode>,
    pub message: Cow<'static, str>,
}

impl Reply {
    #[must_use]
    pub fn new(
        status: Status,
        enhanced: EnhancedCode,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            status,
            enhanced: Some(enhanced),
            message: message.into(),
        }
    }

    /// A reply without an enhanced status code, as used for the greeting.
    #[must_use]
    pub fn plain(status: Status, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            enhanced: None,
            message: message.into(),
        }
    }
}

impl Display for Reply {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self.enhanced {
            Some(enhanced) => write!(fmt, "{} {enhanced} {}", self.status, self.message),
            None => write!(fmt, "{} {}", self.status, self.message),
        }
    }
}
