use std::fmt::Display;

use nom::IResult;
use nom::number::complete::be_u8;

// One-octet code points. Values outside the table are kept as `Unknown` so
// the caller decides whether to drop or carry them.
macro_rules! code_point {
    ($name:ident { $($variant:ident = $val:literal => $text:literal,)+ }) => {
        #[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
        pub enum $name {
            #[default]
            $($variant,)+
            Unknown(u8),
        }

        impl From<u8> for $name {
            fn from(val: u8) -> Self {
                match val {
                    $($val => Self::$variant,)+
                    v => Self::Unknown(v),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(code: $name) -> Self {
                match code {
                    $($name::$variant => $val,)+
                    $name::Unknown(v) => v,
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $text),)+
                    Self::Unknown(v) => write!(f, "Unknown({v})"),
                }
            }
        }

        impl $name {
            pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
                let (input, val) = be_u8(input)?;
                Ok((input, val.into()))
            }
        }
    };
}

code_point!(OspfType {
    Hello = 1 => "Hello",
    DbDesc = 2 => "Database Description",
    LsRequest = 3 => "LS Request",
    LsUpdate = 4 => "LS Update",
    LsAck = 5 => "LS Acknowledgement",
});

code_point!(OspfLsType {
    Router = 1 => "Router",
    Network = 2 => "Network",
    Summary = 3 => "Summary",
    SummaryAsbr = 4 => "Summary ASBR",
    AsExternal = 5 => "AS External",
    NssaAsExternal = 7 => "NSSA AS External",
    OpaqueLinkLocal = 9 => "Opaque Link Local",
    OpaqueAreaLocal = 10 => "Opaque Area Local",
    OpaqueAsWide = 11 => "Opaque AS Wide",
});

impl From<OspfLsType> for u32 {
    fn from(typ: OspfLsType) -> Self {
        u8::from(typ).into()
    }
}

impl OspfLsType {
    /// Types 1 to 5, the ones carried by a plain OSPFv2 area.
    pub fn is_base(&self) -> bool {
        matches!(u8::from(*self), 1..=5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_are_preserved() {
        assert_eq!(OspfType::from(4), OspfType::LsUpdate);
        assert_eq!(u8::from(OspfType::from(9)), 9);
        assert_eq!(OspfLsType::from(6), OspfLsType::Unknown(6));
        assert_eq!(OspfLsType::Unknown(6).to_string(), "Unknown(6)");
        assert!(OspfLsType::SummaryAsbr.is_base());
        assert!(!OspfLsType::NssaAsExternal.is_base());
    }
}
