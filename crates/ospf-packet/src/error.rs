use thiserror::Error;

use crate::OspfType;

/// Errors produced while decoding an OSPFv2 packet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OspfParseError {
    #[error("Unsupported OSPF version: {version}")]
    InvalidVersion { version: u8 },

    #[error("Invalid packet length: header {expected}, received {found}")]
    InvalidPacketLength { expected: usize, found: usize },

    #[error("Invalid packet checksum")]
    InvalidChecksum,

    #[error("Unsupported authentication type: {auth_type}")]
    UnsupportedAuth { auth_type: u16 },

    #[error("Payload parse error: {typ} - {message}")]
    PayloadParseError { typ: OspfType, message: String },

    #[error("Incomplete data: needed {needed} more bytes")]
    IncompleteData { needed: usize },

    #[error("Nom parsing error: {message}")]
    NomError { message: String },
}

impl OspfParseError {
    pub fn incomplete_data(needed: usize) -> Self {
        Self::IncompleteData { needed }
    }

    pub fn nom_error(message: impl Into<String>) -> Self {
        Self::NomError {
            message: message.into(),
        }
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for OspfParseError {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match err {
            nom::Err::Incomplete(needed) => {
                let needed_bytes = match needed {
                    nom::Needed::Size(size) => size.get(),
                    nom::Needed::Unknown => 0,
                };
                Self::incomplete_data(needed_bytes)
            }
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                Self::nom_error(format!("{:?}", e.code))
            }
        }
    }
}

pub type OspfParseResult<T> = Result<T, OspfParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_conversion() {
        let nom_err: nom::Err<nom::error::Error<&[u8]>> =
            nom::Err::Incomplete(nom::Needed::Size(std::num::NonZeroUsize::new(10).unwrap()));
        let err: OspfParseError = nom_err.into();
        assert!(matches!(err, OspfParseError::IncompleteData { needed: 10 }));
        assert!(err.to_string().contains("needed 10 more bytes"));
    }

    #[test]
    fn test_nom_error_conversion() {
        let nom_err: nom::Err<nom::error::Error<&[u8]>> = nom::Err::Error(nom::error::Error::new(
            &b"test"[..],
            nom::error::ErrorKind::Verify,
        ));
        let err: OspfParseError = nom_err.into();
        assert!(matches!(err, OspfParseError::NomError { .. }));
    }
}
