mod chunks;
mod header;

use std::borrow::Cow;

use crate::{
    TransferId,
    consts::{MAX_BODY_LENGTH, PROTOCOL_V0},
    error::Error,
};
use tokio_util::{
    bytes::{Buf, BufMut, BytesMut},
    codec::{Decoder, Encoder},
};

pub use chunks::FileChunks;
pub use header::Kind;
pub(crate) use header::*;

// Unit of wire data for the hub protocol.
//
// A package is either a command line or one window of a file transfer.
// Both share one frame shape: a fixed-size header and a body of at most
// `MAX_BODY_LENGTH` bytes. Chunks of one transfer share a transfer id and
// the final chunk carries the `LAST` flag so the receiver knows the staged
// file is complete.
//
// # Structure
//
// - **Header**: 9 bytes containing version, kind, flags, body length and transfer ID
// - **Body**: Variable-length payload (0-512 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub(crate) header: Header,
    pub(crate) body: Vec<u8>,
}

// Codec for encoding and decoding `Package` structures.
//
// `PackageCodec` implements Tokio's `Decoder` and `Encoder` traits so it plugs
// straight into `FramedRead`/`FramedWrite`. A stream that ends in the middle of
// a frame yields `Error::IncompleteFrame`.
pub(crate) struct PackageCodec;

impl Package {
    /// Creates a command package, truncating text that does not fit one body.
    pub fn command(text: &str) -> Self {
        let mut end = text.len().min(MAX_BODY_LENGTH);
        if end < text.len() {
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            log::warn!(
                "command of {} bytes truncated to {} bytes",
                text.len(),
                end
            );
        }
        let body = text.as_bytes()[..end].to_vec();
        Self {
            header: Header::new(
                PROTOCOL_V0,
                Kind::Command,
                PackageFlags::empty(),
                body.len() as BodyLength,
                0,
            ),
            body,
        }
    }

    /// Creates one chunk of a file transfer.
    pub fn chunk(transfer_id: TransferId, data: &[u8], last: bool) -> Result<Self, Error> {
        if data.len() > MAX_BODY_LENGTH {
            return Err(Error::BodyTooLarge(data.len()));
        }
        let flags = if last {
            PackageFlags::LAST
        } else {
            PackageFlags::empty()
        };
        Ok(Self {
            header: Header::new(
                PROTOCOL_V0,
                Kind::Chunk,
                flags,
                data.len() as BodyLength,
                transfer_id,
            ),
            body: data.to_vec(),
        })
    }

    pub fn kind(&self) -> Kind {
        self.header.kind
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_length(&self) -> usize {
        self.header.body_length as usize
    }

    pub fn transfer_id(&self) -> TransferId {
        self.header.transfer_id
    }

    pub fn is_last(&self) -> bool {
        self.header.flags.contains(PackageFlags::LAST)
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl Decoder for PackageCodec {
    type Item = Package;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < HEADER_LENGTH {
            return Ok(None);
        }

        // Validate header fields without consuming the buffer yet
        let version = match buf[0] {
            0x0 => PROTOCOL_V0,
            x => return Err(Error::InvalidVersion(x)),
        };
        let kind = buf[1].try_into()?;
        let flags = buf[2].try_into()?;
        let body_length = (&buf[3..5]).get_u16();
        if body_length as usize > MAX_BODY_LENGTH {
            return Err(Error::BodyTooLarge(body_length as usize));
        }
        let frame_length = HEADER_LENGTH + body_length as usize;

        if buf.len() < frame_length {
            buf.reserve(frame_length - buf.len());
            return Ok(None);
        }

        buf.advance(5);
        let transfer_id = buf.get_u32();
        let body = buf.split_to(body_length.into()).to_vec();

        Ok(Some(Package {
            header: Header::new(version, kind, flags, body_length, transfer_id),
            body,
        }))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(package) => Ok(Some(package)),
            None if buf.is_empty() => Ok(None),
            None => {
                let expected = if buf.len() < HEADER_LENGTH {
                    HEADER_LENGTH
                } else {
                    HEADER_LENGTH + (&buf[3..5]).get_u16() as usize
                };
                Err(Error::IncompleteFrame {
                    expected,
                    available: buf.len(),
                })
            }
        }
    }
}

impl Encoder<Package> for PackageCodec {
    type Error = Error;

    fn encode(&mut self, package: Package, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let body_length = package.body.len();
        if body_length > MAX_BODY_LENGTH {
            return Err(Error::BodyTooLarge(body_length));
        }

        buf.reserve(HEADER_LENGTH + body_length);

        buf.put_u8(package.header.version);
        buf.put_u8(package.header.kind as u8);
        buf.put_u8(package.header.flags.bits());
        buf.put_u16(body_length as u16);
        buf.put_u32(package.header.transfer_id);

        buf.put_slice(&package.body);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(package: Package) -> BytesMut {
        let mut buf = BytesMut::new();
        PackageCodec.encode(package, &mut buf).unwrap();
        buf
    }

    #[test]
    fn command_frame_layout() {
        let buf = encoded(Package::command("reg$alpha"));
        assert_eq!(&buf[..5], &[0x00, 0x01, 0x00, 0x00, 0x09]);
        assert_eq!(&buf[5..9], &[0, 0, 0, 0]);
        assert_eq!(&buf[9..], b"reg$alpha");
    }

    #[test]
    fn decodes_last_chunk_with_binary_body() {
        let data = [0u8, 0xff, b'$', 0x10];
        let package = Package::chunk(7, &data, true).unwrap();
        let mut buf = encoded(package.clone());

        let decoded = PackageCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, package);
        assert_eq!(decoded.kind(), Kind::Chunk);
        assert_eq!(decoded.transfer_id(), 7);
        assert!(decoded.is_last());
        assert_eq!(decoded.body(), &data);
        assert!(buf.is_empty());
    }

    #[test]
    fn waits_for_the_whole_frame() {
        let full = encoded(Package::command("print$hello"));
        let mut buf = BytesMut::from(&full[..full.len() - 3]);
        assert!(PackageCodec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&full[full.len() - 3..]);
        let decoded = PackageCodec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.text(), "print$hello");
    }

    #[test]
    fn two_frames_in_one_buffer() {
        let mut buf = encoded(Package::command("a"));
        buf.extend_from_slice(&encoded(Package::command("b")));

        assert_eq!(PackageCodec.decode(&mut buf).unwrap().unwrap().text(), "a");
        assert_eq!(PackageCodec.decode(&mut buf).unwrap().unwrap().text(), "b");
        assert!(PackageCodec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn truncated_stream_is_a_framing_error() {
        let full = encoded(Package::command("print$hello"));
        let mut buf = BytesMut::from(&full[..12]);

        match PackageCodec.decode_eof(&mut buf) {
            Err(Error::IncompleteFrame {
                expected,
                available,
            }) => {
                assert_eq!(expected, full.len());
                assert_eq!(available, 12);
            }
            other => panic!("expected IncompleteFrame, got {other:?}"),
        }
    }

    #[test]
    fn clean_eof_is_not_an_error() {
        let mut buf = BytesMut::new();
        assert!(PackageCodec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn rejects_oversized_declared_length() {
        let mut buf = BytesMut::new();
        buf.put_u8(0);
        buf.put_u8(Kind::Command as u8);
        buf.put_u8(0);
        buf.put_u16(MAX_BODY_LENGTH as u16 + 1);
        buf.put_u32(0);
        assert!(matches!(
            PackageCodec.decode(&mut buf),
            Err(Error::BodyTooLarge(513))
        ));
    }

    #[test]
    fn rejects_unknown_kind_and_flags() {
        let mut buf = encoded(Package::command("x"));
        buf[1] = 0x09;
        assert!(matches!(
            PackageCodec.decode(&mut buf),
            Err(Error::InvalidKind(0x09))
        ));

        let mut buf = encoded(Package::command("x"));
        buf[2] = 0x80;
        assert!(matches!(
            PackageCodec.decode(&mut buf),
            Err(Error::InvalidFlags(0x80))
        ));
    }

    #[test]
    fn long_command_is_truncated_on_a_char_boundary() {
        let text = "é".repeat(MAX_BODY_LENGTH);
        let package = Package::command(&text);
        assert!(package.body_length() <= MAX_BODY_LENGTH);
        assert_eq!(package.body_length(), MAX_BODY_LENGTH);
        assert!(std::str::from_utf8(package.body()).is_ok());
    }

    #[test]
    fn oversized_chunk_is_rejected() {
        let data = vec![0u8; MAX_BODY_LENGTH + 1];
        assert!(matches!(
            Package::chunk(1, &data, true),
            Err(Error::BodyTooLarge(_))
        ));
    }
}
