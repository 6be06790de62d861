pub(crate) type Version = u8;

pub(crate) const PROTOCOL_V0: Version = 0x0;

/// Largest body a single package may carry, for commands and file chunks alike.
pub const MAX_BODY_LENGTH: usize = 512;

/// Separates tokens of a command line.
pub const DELIMITER: char = '$';

// Reserved tokens of the command language.
pub(crate) const OPEN_BRACKET: &str = "[";
pub(crate) const CLOSE_BRACKET: &str = "]";
pub(crate) const SELF_REFERENCE: &str = "this";

pub(crate) const IF: &str = "if";
pub(crate) const ELSE: &str = "else";
pub(crate) const THEN: &str = "then";

pub(crate) const BEGIN: &str = "begin";
pub(crate) const END: &str = "end";
pub(crate) const REPEAT: &str = "repeat";

// A script line starting with this captures a variable.
pub(crate) const VARIABLE_MARKER: char = '#';

pub(crate) const DEFAULT_STAGING_DIR: &str = ".aincrad/staging";
