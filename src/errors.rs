use std::{fmt, io, num::ParseFloatError};
use quick_xml::events::attributes::AttrError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is not well-formed OSM XML.
    MalformedDocument,
    /// An element is missing an attribute it cannot be shaped without.
    MissingRequiredAttribute,
    /// An attribute is present but cannot be coerced (coordinates, visibility).
    InvalidAttribute,
    Io,
    Config,
    Sink,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::MalformedDocument, message)
    }

    pub fn missing_attribute(element: &str, attribute: &str) -> Self {
        Error::new(
            ErrorKind::MissingRequiredAttribute,
            format!("<{}> element is missing required attribute '{}'", element, attribute),
        )
    }

    /// Prefixes the message with where the error happened, keeping the kind.
    pub fn context(self, context: impl fmt::Display) -> Self {
        Error {
            kind: self.kind,
            message: format!("{}: {}", context, self.message),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            message: value.to_string()
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        let kind = match value {
            quick_xml::Error::Io(_) => ErrorKind::Io,
            _ => ErrorKind::MalformedDocument,
        };
        Error {
            kind,
            message: value.to_string()
        }
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error {
            kind: ErrorKind::MalformedDocument,
            message: value.to_string()
        }
    }
}

impl From<ParseFloatError> for Error {
    fn from(value: ParseFloatError) -> Self {
        Error {
            kind: ErrorKind::InvalidAttribute,
            message: value.to_string()
        }
    }
}

impl From<regex::Error> for Error {
    fn from(value: regex::Error) -> Self {
        Error {
            kind: ErrorKind::Config,
            message: value.to_string()
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        let kind = if value.is_io() { ErrorKind::Io } else { ErrorKind::Sink };
        Error {
            kind,
            message: value.to_string()
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
