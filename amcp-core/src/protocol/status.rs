//! Status codes and the body framing they select.

use std::fmt;

use crate::error::AmcpError;

// ── StatusCode ───────────────────────────────────────────────────

/// The 3-digit classification code at the start of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(u16);

impl StatusCode {
    /// Extract the code from a raw status line.
    ///
    /// The line must start with exactly three ASCII digits, followed by
    /// either the end of the line or a space.
    pub fn parse(line: &str) -> Result<Self, AmcpError> {
        let bytes = line.as_bytes();
        let digits_ok = bytes.len() >= 3 && bytes[..3].iter().all(u8::is_ascii_digit);
        let boundary_ok = bytes.len() == 3 || bytes.get(3) == Some(&b' ');
        if !digits_ok || !boundary_ok {
            return Err(AmcpError::MalformedResponse(format!(
                "status line without a 3-digit code: {line:?}"
            )));
        }

        let code = bytes[..3]
            .iter()
            .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
        Ok(Self(code))
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// How the rest of the reply is laid out on the wire.
    pub fn framing(self) -> Framing {
        match self.0 {
            200 => Framing::UntilEmptyLine,
            201 => Framing::SingleLine,
            code => match ProtocolFailure::from_code(code) {
                Some(failure) => Framing::Failed(failure),
                None => Framing::StatusOnly,
            },
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

// ── Framing ──────────────────────────────────────────────────────

/// Body layout selected by a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `201`: exactly one more line follows.
    SingleLine,
    /// `200`: lines follow until an empty line, which is not part of the body.
    UntilEmptyLine,
    /// Recognised error code; nothing follows.
    Failed(ProtocolFailure),
    /// Any other code; the status line is the whole reply.
    StatusOnly,
}

// ── ProtocolFailure ──────────────────────────────────────────────

/// Error status codes the server uses to reject a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFailure {
    /// 400
    CommandNotUnderstood,
    /// 401
    IllegalCommand,
    /// 402
    ParameterMissing,
    /// 403
    IllegalParameter,
    /// 404
    MediaNotFound,
    /// 500 and 501
    InternalServerError,
    /// 502
    MediaUnreadable,
}

impl ProtocolFailure {
    pub fn from_code(code: u16) -> Option<Self> {
        let failure = match code {
            400 => Self::CommandNotUnderstood,
            401 => Self::IllegalCommand,
            402 => Self::ParameterMissing,
            403 => Self::IllegalParameter,
            404 => Self::MediaNotFound,
            500 | 501 => Self::InternalServerError,
            502 => Self::MediaUnreadable,
            _ => return None,
        };
        Some(failure)
    }
}

impl fmt::Display for ProtocolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CommandNotUnderstood => "command not understood",
            Self::IllegalCommand => "illegal command",
            Self::ParameterMissing => "parameter missing",
            Self::IllegalParameter => "illegal parameter",
            Self::MediaNotFound => "media file not found",
            Self::InternalServerError => "internal server error",
            Self::MediaUnreadable => "media file unreadable",
        };
        f.write_str(text)
    }
}
