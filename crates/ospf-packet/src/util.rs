use std::net::Ipv4Addr;

use bytes::BytesMut;
use nom::error::ParseError;
use nom::number::complete::be_u32;
use nom::{Err, IResult};

/// Serialize into a wire buffer.
pub trait Emit {
    fn emit(&self, buf: &mut BytesMut);
}

pub trait ParseBe<T> {
    fn parse_be(input: &[u8]) -> IResult<&[u8], T>;
}

impl ParseBe<Ipv4Addr> for Ipv4Addr {
    fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, addr) = be_u32(input)?;
        Ok((input, addr.into()))
    }
}

// Repeat `parser` until the input runs out or an element fails to parse.
// Trailing bytes shorter than one element are returned unconsumed.
pub fn many0<'a, O, E: ParseError<&'a [u8]>>(
    parser: impl Fn(&'a [u8]) -> IResult<&'a [u8], O, E>,
) -> impl Fn(&'a [u8]) -> IResult<&'a [u8], Vec<O>, E> {
    move |mut input| {
        let mut items = Vec::new();
        while !input.is_empty() {
            let Ok((rest, item)) = parser(input) else {
                break;
            };
            if rest.len() == input.len() {
                break;
            }
            items.push(item);
            input = rest;
        }
        Ok::<_, Err<E>>((input, items))
    }
}
