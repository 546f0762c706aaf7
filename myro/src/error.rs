//! `myro` error types.
use std::{backtrace::Backtrace, fmt, io, str::Utf8Error};

use crate::{
    common::unit_error,
    connection::{ParseError, UnsupportedAuth},
    mysql::{ProtocolError, ServerError},
    row::{DecodeError, RowNotFound},
};

/// A specialized [`Result`] type for `myro` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `myro` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Add context to the error message.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Returns the server error, either [`Syntax`][ErrorKind::Syntax] or
    /// [`Database`][ErrorKind::Database].
    pub fn as_server_error(&self) -> Option<&ServerError> {
        match &self.kind {
            ErrorKind::Syntax(e) | ErrorKind::Database(e) => Some(e),
            _ => None,
        }
    }

    /// Server rejection of a statement text is reported as syntax error.
    pub(crate) fn into_syntax(self) -> Self {
        match self.kind {
            ErrorKind::Database(e) => Self { kind: ErrorKind::Syntax(e), ..self },
            _ => self,
        }
    }
}

/// All possible error kind from `myro` library.
pub enum ErrorKind {
    /// No live connection.
    Connection(ConnectionClosed),
    /// Server rejected the statement text at prepare.
    Syntax(ServerError),
    /// Server rejected an operation.
    Database(ServerError),
    /// Invalid transaction state transition.
    Transaction(TransactionError),
    /// Operation not supported by the driver.
    Unsupported(Unsupported),
    /// Number of bound parameter differ from the statement declaration.
    ParameterCountMismatch(ParameterCountMismatch),
    /// Statement is already released.
    Released(Released),
    Config(ParseError),
    Protocol(ProtocolError),
    Io(io::Error),
    Decode(DecodeError),
    RowNotFound(RowNotFound),
    Utf8(Utf8Error),
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ConnectionClosed>e => ErrorKind::Connection(e));
from!(<ServerError>e => ErrorKind::Database(e));
from!(<TransactionError>e => ErrorKind::Transaction(e));
from!(<Unsupported>e => ErrorKind::Unsupported(e));
from!(<UnsupportedAuth>e => ErrorKind::Unsupported(Unsupported::new(e.to_string())));
from!(<ParameterCountMismatch>e => ErrorKind::ParameterCountMismatch(e));
from!(<Released>e => ErrorKind::Released(e));
from!(<ParseError>e => ErrorKind::Config(e));
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<io::Error>e => ErrorKind::Io(e));
from!(<DecodeError>e => ErrorKind::Decode(e));
from!(<RowNotFound>e => ErrorKind::RowNotFound(e));
from!(<Utf8Error>e => ErrorKind::Utf8(e));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => e.fmt(f),
            Self::Syntax(e) => write!(f, "syntax error, {e}"),
            Self::Database(e) => e.fmt(f),
            Self::Transaction(e) => e.fmt(f),
            Self::Unsupported(e) => e.fmt(f),
            Self::ParameterCountMismatch(e) => e.fmt(f),
            Self::Released(e) => e.fmt(f),
            Self::Config(e) => e.fmt(f),
            Self::Protocol(e) => e.fmt(f),
            Self::Io(e) => e.fmt(f),
            Self::Decode(e) => e.fmt(f),
            Self::RowNotFound(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

unit_error! {
    /// An error when operating on a connection that is closed or broken.
    pub struct ConnectionClosed("connection is closed");
}

unit_error! {
    /// An error when using a prepared statement that is already released, or
    /// that is prepared on another connection.
    pub struct Released("prepared statement is released");
}

/// An error when bound parameters count differ from the statement declared parameters.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ParameterCountMismatch {
    pub expected: usize,
    pub found: usize,
}

impl std::error::Error for ParameterCountMismatch { }

impl fmt::Display for ParameterCountMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "statement expects {} parameters, {} were bound",
            self.expected, self.found
        )
    }
}

impl fmt::Debug for ParameterCountMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// An error when transaction operation is not valid in current state.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TransactionError {
    /// Transaction is started while another is active.
    AlreadyStarted,
    /// Commit, rollback or savepoint operation without active transaction.
    NotStarted,
}

impl std::error::Error for TransactionError { }

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyStarted => f.write_str("transaction already started"),
            Self::NotStarted => f.write_str("no transaction is active"),
        }
    }
}

impl fmt::Debug for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// An error when requested operation is not supported.
#[derive(Clone)]
pub struct Unsupported {
    reason: String,
}

impl Unsupported {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl std::error::Error for Unsupported { }

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported: {}", self.reason)
    }
}

impl fmt::Debug for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use super::*;
    use crate::mysql::BackendProtocol;

    #[test]
    fn syntax_from_database() {
        let server = ServerError::decode(Bytes::from_static(b"\xFF\x28\x04#42000bad")).unwrap();
        let err = Error::from(server).into_syntax();
        assert!(matches!(err.kind(), ErrorKind::Syntax(_)));
        assert_eq!(err.as_server_error().map(ServerError::code), Some(1064));
    }

    #[test]
    fn display() {
        let err = Error::from(ParameterCountMismatch { expected: 2, found: 3 });
        assert!(err.to_string().starts_with("statement expects 2 parameters, 3 were bound"));
        let err = Error::from(TransactionError::NotStarted).context("commit");
        assert!(err.to_string().starts_with("commit: no transaction is active"));
    }
}
