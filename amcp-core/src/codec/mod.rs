//! CRLF line framing for `tokio_util::codec::Framed`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::AmcpError;

/// Longest response line accepted before the stream is considered broken.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

const CRLF: &[u8] = b"\r\n";

/// Splits the inbound byte stream on CRLF and terminates outbound
/// commands with CRLF.
#[derive(Debug, Default)]
pub struct LineCodec {
    // Bytes of the current partial line already scanned for CRLF.
    scanned: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AmcpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Step back one byte so a CR at the end of the previous read still pairs up.
        let start = self.scanned.saturating_sub(1);
        let found = src[start..]
            .windows(CRLF.len())
            .position(|w| w == CRLF)
            .map(|i| start + i);

        match found {
            Some(end) => {
                if end > MAX_LINE_LENGTH {
                    return Err(AmcpError::LineTooLong {
                        max: MAX_LINE_LENGTH,
                    });
                }
                let line = src.split_to(end);
                src.advance(CRLF.len());
                self.scanned = 0;
                Ok(Some(String::from_utf8_lossy(&line).into_owned()))
            }
            None => {
                if src.len() > MAX_LINE_LENGTH + CRLF.len() {
                    return Err(AmcpError::LineTooLong {
                        max: MAX_LINE_LENGTH,
                    });
                }
                self.scanned = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None if src.is_empty() => Ok(None),
            // A partial line without its terminator is never delivered.
            None => Err(AmcpError::ConnectionClosed),
        }
    }
}

impl Encoder<&str> for LineCodec {
    type Error = AmcpError;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.contains(['\r', '\n']) {
            return Err(AmcpError::InvalidCommand(format!(
                "line breaks are not allowed inside a command: {item:?}"
            )));
        }
        dst.reserve(item.len() + CRLF.len());
        dst.put_slice(item.as_bytes());
        dst.put_slice(CRLF);
        Ok(())
    }
}

impl Encoder<String> for LineCodec {
    type Error = AmcpError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        Encoder::<&str>::encode(self, item.as_str(), dst)
    }
}

/// Checks that `command` can be sent as one request line.
pub fn validate_command(command: &str) -> Result<(), AmcpError> {
    LineCodec::new().encode(command, &mut BytesMut::new())
}
