use failure::Fail;
use std::io;
use std::string::FromUtf8Error;

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "key not found")]
    KeyNotFound,

    #[fail(display = "encode error: {}", _0)]
    Encode(#[cause] CodecError),

    #[fail(display = "decode error: {}", _0)]
    Decode(#[cause] CodecError),

    #[fail(display = "backend error: {}", _0)]
    Backend(#[cause] BackendError),

    #[fail(display = "operation cancelled")]
    Cancelled,

    #[fail(display = "deadline exceeded")]
    DeadlineExceeded,

    #[fail(display = "unlock of key {:?} that was never locked", key)]
    LockContract {
        key: Vec<u8>,
    },

    #[fail(display = "lock registry is closed")]
    LockRegistryClosed,

    #[fail(display = "transaction is read-only")]
    ReadOnlyTransaction,

    #[fail(display = "transaction conflict on key {:?}", key)]
    Conflict {
        key: Vec<u8>,
    },

    #[fail(display = "transaction already committed or rolled back")]
    TransactionClosed,

    #[fail(display = "iteration stopped")]
    Stopped,

    #[fail(display = "invalid configuration: {}", _0)]
    Config(String),

    #[fail(display = "{}", _0)]
    Io(#[cause] io::Error),
}

/// Cause of a failed value or key conversion.
#[derive(Debug, Fail)]
pub enum CodecError {
    #[fail(display = "{}", _0)]
    Json(#[cause] serde_json::Error),

    #[fail(display = "{}", _0)]
    Bincode(#[cause] bincode::Error),

    #[fail(display = "{}", _0)]
    Utf8(#[cause] FromUtf8Error),

    #[fail(display = "expected {} bytes, got {}", expected, actual)]
    Length {
        expected: usize,
        actual: usize,
    },

    #[fail(display = "{}", _0)]
    Invalid(String),
}

#[derive(Debug, Fail)]
pub enum BackendError {
    #[fail(display = "{}", _0)]
    Sled(#[cause] sled::Error),

    #[fail(display = "{}", _0)]
    Other(String),
}

impl Error {
    /// Shorthand for a structural decode failure with a message.
    pub fn decode<S: Into<String>>(msg: S) -> Error {
        Error::Decode(CodecError::Invalid(msg.into()))
    }

    /// Shorthand for an encode failure with a message.
    pub fn encode<S: Into<String>>(msg: S) -> Error {
        Error::Encode(CodecError::Invalid(msg.into()))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Error {
        Error::Backend(BackendError::Sled(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
