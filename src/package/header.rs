use bitflags::bitflags;

use crate::{TransferId, consts::Version, error::Error};

// Package header for the hub protocol.
//
// # Layout
//
// The header is 9 bytes total:
// - Version: 1 byte
// - Kind: 1 byte
// - Flags: 1 byte
// - Body Length: 2 bytes
// - Transfer ID: 4 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub version: Version,
    pub kind: Kind,
    pub flags: PackageFlags,
    pub body_length: BodyLength,
    pub transfer_id: TransferId,
}

/// What a package body holds.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum Kind {
    /// A `$`-delimited command line for the interpreter.
    Command = 0x01,
    /// One window of a file transfer.
    Chunk = 0x02,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct PackageFlags: u8 {
        // Final chunk of a transfer.
        const LAST = 1 << 0;
    }
}

pub(crate) type BodyLength = u16;

pub(crate) const HEADER_LENGTH: usize = 9;

impl TryFrom<u8> for Kind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Kind::Command),
            0x02 => Ok(Kind::Chunk),
            _ => Err(Error::InvalidKind(value)),
        }
    }
}

impl TryFrom<u8> for PackageFlags {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PackageFlags::from_bits(value).ok_or(Error::InvalidFlags(value))
    }
}

impl Header {
    pub fn new(
        version: Version,
        kind: Kind,
        flags: PackageFlags,
        body_length: BodyLength,
        transfer_id: TransferId,
    ) -> Self {
        Self {
            version,
            kind,
            flags,
            body_length,
            transfer_id,
        }
    }
}
