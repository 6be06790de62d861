use thiserror::Error;

use crate::consts::MAX_BODY_LENGTH;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid version: {0}")]
    InvalidVersion(u8),
    #[error("invalid package kind: {0}")]
    InvalidKind(u8),
    #[error("invalid package flags: {0:#04x}")]
    InvalidFlags(u8),
    #[error("body length {0} exceeds maximum of {MAX_BODY_LENGTH}")]
    BodyTooLarge(usize),
    #[error("incomplete frame: stream closed with {available} of {expected} bytes")]
    IncompleteFrame { expected: usize, available: usize },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("server already started")]
    AlreadyStarted,
    #[error("client already connected")]
    AlreadyConnected,
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    // Interpreter faults. Each aborts the rest of the current line.
    #[error("stack underflow")]
    StackUnderflow,
    #[error("not an integer: {0:?}")]
    NotANumber(String),
    #[error("unterminated `{0}` block")]
    UnterminatedBlock(&'static str),
    #[error("`{0}` only runs on the hub")]
    RequiresHub(&'static str),
    #[error("`{0}` only runs on a peer")]
    RequiresPeer(&'static str),
}
