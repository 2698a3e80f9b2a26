use std::net::Ipv4Addr;

use bitfield_struct::bitfield;
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};
use internet_checksum::Checksum;
use nom::bytes::complete::take;
use nom::error::{make_error, ErrorKind};
use nom::number::complete::{be_u16, be_u32, be_u64, be_u8};
use nom::{Err, IResult, Needed};

use super::error::{OspfParseError, OspfParseResult};
use super::lsa::{OspfLsa, OspfLsaHeader};
use super::util::{many0, Emit, ParseBe};
use super::{OspfLsType, OspfType};

// OSPF version.
pub const OSPF_VERSION: u8 = 2;

pub const OSPF_HEADER_LEN: usize = 24;

const AUTH_RANGE: std::ops::Range<usize> = 16..24;

#[derive(Debug, Clone)]
pub struct Ospfv2Packet {
    pub version: u8,
    pub typ: OspfType,
    pub len: u16,
    pub router_id: Ipv4Addr,
    pub area_id: Ipv4Addr,
    pub checksum: u16,
    pub auth_type: u16,
    pub auth: Ospfv2Auth,
    pub payload: Ospfv2Payload,
}

impl Ospfv2Packet {
    pub fn new(router_id: &Ipv4Addr, area_id: &Ipv4Addr, payload: Ospfv2Payload) -> Self {
        Self {
            version: OSPF_VERSION,
            typ: payload.typ(),
            len: 0,
            router_id: *router_id,
            area_id: *area_id,
            checksum: 0,
            auth_type: 0,
            auth: Ospfv2Auth::default(),
            payload,
        }
    }

    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, version) = be_u8(input)?;
        if version != OSPF_VERSION {
            return Err(Err::Error(make_error(input, ErrorKind::Tag)));
        }
        let (input, typ) = OspfType::parse_be(input)?;
        let (input, len) = be_u16(input)?;
        let (input, router_id) = Ipv4Addr::parse_be(input)?;
        let (input, area_id) = Ipv4Addr::parse_be(input)?;
        let (input, checksum) = be_u16(input)?;
        let (input, auth_type) = be_u16(input)?;
        let (input, auth) = Ospfv2Auth::parse_be(input, auth_type)?;
        if (len as usize) < OSPF_HEADER_LEN {
            return Err(Err::Error(make_error(input, ErrorKind::LengthValue)));
        }
        let (input, body) = take(len as usize - OSPF_HEADER_LEN)(input)?;
        let (_, payload) = Ospfv2Payload::parse_enum(body, typ)?;
        let packet = Self {
            version,
            typ,
            len,
            router_id,
            area_id,
            checksum,
            auth_type,
            auth,
            payload,
        };
        Ok((input, packet))
    }

    /// Decode one packet, reporting the reason a packet is dropped.
    pub fn from_bytes(input: &[u8]) -> OspfParseResult<Self> {
        if input.len() < OSPF_HEADER_LEN {
            return Err(OspfParseError::incomplete_data(
                OSPF_HEADER_LEN - input.len(),
            ));
        }
        if input[0] != OSPF_VERSION {
            return Err(OspfParseError::InvalidVersion { version: input[0] });
        }
        let len = BigEndian::read_u16(&input[2..4]) as usize;
        if len < OSPF_HEADER_LEN || len > input.len() {
            return Err(OspfParseError::InvalidPacketLength {
                expected: len,
                found: input.len(),
            });
        }
        let input = &input[..len];
        if !checksum_valid(input) {
            return Err(OspfParseError::InvalidChecksum);
        }
        let auth_type = BigEndian::read_u16(&input[14..16]);
        if auth_type != 0 {
            return Err(OspfParseError::UnsupportedAuth { auth_type });
        }
        let typ = OspfType::from(input[1]);
        let (_, packet) =
            Self::parse_be(input).map_err(|e| OspfParseError::PayloadParseError {
                typ,
                message: e.to_string(),
            })?;
        Ok(packet)
    }

    pub fn emit(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_u8(self.version);
        buf.put_u8(self.typ.into());
        buf.put_u16(0);
        buf.put(&self.router_id.octets()[..]);
        buf.put(&self.area_id.octets()[..]);
        buf.put_u16(0);
        buf.put_u16(self.auth_type);
        self.auth.emit(buf);
        self.payload.emit(buf);

        let buf = &mut buf[start..];

        // OSPF packet length.
        let len = buf.len() as u16;
        BigEndian::write_u16(&mut buf[2..4], len);

        // Update checksum.
        const CHECKSUM_RANGE: std::ops::Range<usize> = 12..14;
        let mut cksum = Checksum::new();
        cksum.add_bytes(&buf[..AUTH_RANGE.start]);
        cksum.add_bytes(&buf[AUTH_RANGE.end..]);
        buf[CHECKSUM_RANGE].copy_from_slice(&cksum.checksum());
    }

    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(1500);
        self.emit(&mut buf);
        buf
    }
}

#[derive(Debug, Default, Clone)]
pub struct Ospfv2Auth {
    pub auth: u64,
}

impl Ospfv2Auth {
    pub fn parse_be(input: &[u8], auth_type: u16) -> IResult<&[u8], Self> {
        if auth_type != 0 {
            return Err(Err::Error(make_error(input, ErrorKind::Tag)));
        }
        let (input, auth) = be_u64(input)?;
        Ok((input, Self { auth }))
    }
}

impl Emit for Ospfv2Auth {
    fn emit(&self, buf: &mut BytesMut) {
        buf.put_u64(self.auth);
    }
}

#[derive(Debug, Clone)]
pub enum Ospfv2Payload {
    Hello(OspfHello),
    DbDesc(OspfDbDesc),
    LsRequest(OspfLsRequest),
    LsUpdate(OspfLsUpdate),
    LsAck(OspfLsAck),
    Unknown(OspfUnknown),
}

impl Ospfv2Payload {
    pub fn parse_enum(input: &[u8], typ: OspfType) -> IResult<&[u8], Ospfv2Payload> {
        use Ospfv2Payload::*;
        match typ {
            OspfType::Hello => {
                let (input, v) = OspfHello::parse_be(input)?;
                Ok((input, Hello(v)))
            }
            OspfType::DbDesc => {
                let (input, v) = OspfDbDesc::parse_be(input)?;
                Ok((input, DbDesc(v)))
            }
            OspfType::LsRequest => {
                let (input, v) = OspfLsRequest::parse_be(input)?;
                Ok((input, LsRequest(v)))
            }
            OspfType::LsUpdate => {
                let (input, v) = OspfLsUpdate::parse_be(input)?;
                Ok((input, LsUpdate(v)))
            }
            OspfType::LsAck => {
                let (input, v) = OspfLsAck::parse_be(input)?;
                Ok((input, LsAck(v)))
            }
            OspfType::Unknown(_) => {
                let payload = OspfUnknown {
                    typ,
                    payload: input.to_vec(),
                };
                Ok((&input[input.len()..], Unknown(payload)))
            }
        }
    }

    pub fn typ(&self) -> OspfType {
        use Ospfv2Payload::*;
        match self {
            Hello(_) => OspfType::Hello,
            DbDesc(_) => OspfType::DbDesc,
            LsRequest(_) => OspfType::LsRequest,
            LsUpdate(_) => OspfType::LsUpdate,
            LsAck(_) => OspfType::LsAck,
            Unknown(v) => v.typ,
        }
    }
}

impl Emit for Ospfv2Payload {
    fn emit(&self, buf: &mut BytesMut) {
        use Ospfv2Payload::*;
        match self {
            Hello(v) => v.emit(buf),
            DbDesc(v) => v.emit(buf),
            LsRequest(v) => v.emit(buf),
            LsUpdate(v) => v.emit(buf),
            LsAck(v) => v.emit(buf),
            Unknown(v) => buf.put(&v.payload[..]),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OspfUnknown {
    pub typ: OspfType,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OspfHello {
    pub netmask: Ipv4Addr,
    pub hello_interval: u16,
    pub options: OspfOptions,
    pub priority: u8,
    pub router_dead_interval: u32,
    pub d_router: Ipv4Addr,
    pub bd_router: Ipv4Addr,
    pub neighbors: Vec<Ipv4Addr>,
}

#[bitfield(u8, debug = true)]
#[derive(PartialEq)]
pub struct OspfOptions {
    pub multi_topology: bool,
    pub external: bool,
    pub multicast: bool,
    pub nssa: bool,
    pub lls_data: bool,
    pub demand_circuits: bool,
    pub o: bool,
    pub dn: bool,
}

impl Default for OspfHello {
    fn default() -> Self {
        Self {
            netmask: Ipv4Addr::UNSPECIFIED,
            hello_interval: 0,
            options: OspfOptions(0),
            priority: 0,
            router_dead_interval: 0,
            d_router: Ipv4Addr::UNSPECIFIED,
            bd_router: Ipv4Addr::UNSPECIFIED,
            neighbors: Vec::new(),
        }
    }
}

impl OspfHello {
    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, netmask) = Ipv4Addr::parse_be(input)?;
        let (input, hello_interval) = be_u16(input)?;
        let (input, options) = be_u8(input)?;
        let (input, priority) = be_u8(input)?;
        let (input, router_dead_interval) = be_u32(input)?;
        let (input, d_router) = Ipv4Addr::parse_be(input)?;
        let (input, bd_router) = Ipv4Addr::parse_be(input)?;
        let (input, neighbors) = many0(Ipv4Addr::parse_be)(input)?;
        let hello = Self {
            netmask,
            hello_interval,
            options: options.into(),
            priority,
            router_dead_interval,
            d_router,
            bd_router,
            neighbors,
        };
        Ok((input, hello))
    }
}

impl Emit for OspfHello {
    fn emit(&self, buf: &mut BytesMut) {
        buf.put(&self.netmask.octets()[..]);
        buf.put_u16(self.hello_interval);
        buf.put_u8(self.options.into());
        buf.put_u8(self.priority);
        buf.put_u32(self.router_dead_interval);
        buf.put(&self.d_router.octets()[..]);
        buf.put(&self.bd_router.octets()[..]);
        for nbr in self.neighbors.iter() {
            buf.put(&nbr.octets()[..]);
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct OspfDbDesc {
    pub if_mtu: u16,
    pub options: OspfOptions,
    pub flags: DbDescFlags,
    pub seqnum: u32,
    pub lsa_headers: Vec<OspfLsaHeader>,
}

#[bitfield(u8, debug = true)]
#[derive(PartialEq)]
pub struct DbDescFlags {
    pub master: bool,
    pub more: bool,
    pub init: bool,
    pub oob_resync: bool,
    #[bits(4)]
    pub resvd: u8,
}

impl DbDescFlags {
    pub fn is_all(&self) -> bool {
        self.master() && self.more() && self.init()
    }
}

impl OspfDbDesc {
    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, if_mtu) = be_u16(input)?;
        let (input, options) = be_u8(input)?;
        let (input, flags) = be_u8(input)?;
        let (input, seqnum) = be_u32(input)?;
        let (input, lsa_headers) = many0(OspfLsaHeader::parse_be)(input)?;
        let dd = Self {
            if_mtu,
            options: options.into(),
            flags: flags.into(),
            seqnum,
            lsa_headers,
        };
        Ok((input, dd))
    }
}

impl Emit for OspfDbDesc {
    fn emit(&self, buf: &mut BytesMut) {
        buf.put_u16(self.if_mtu);
        buf.put_u8(self.options.into());
        buf.put_u8(self.flags.into());
        buf.put_u32(self.seqnum);
        for lsah in self.lsa_headers.iter() {
            lsah.emit(buf);
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct OspfLsRequest {
    pub reqs: Vec<OspfLsRequestEntry>,
}

impl OspfLsRequest {
    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, reqs) = many0(OspfLsRequestEntry::parse_be)(input)?;
        Ok((input, Self { reqs }))
    }
}

impl Emit for OspfLsRequest {
    fn emit(&self, buf: &mut BytesMut) {
        for req in self.reqs.iter() {
            req.emit(buf);
        }
    }
}

#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq)]
pub struct OspfLsRequestEntry {
    pub ls_type: u32,
    pub ls_id: Ipv4Addr,
    pub adv_router: Ipv4Addr,
}

impl OspfLsRequestEntry {
    pub fn new(ls_type: OspfLsType, ls_id: Ipv4Addr, adv_router: Ipv4Addr) -> Self {
        Self {
            ls_type: ls_type.into(),
            ls_id,
            adv_router,
        }
    }

    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, ls_type) = be_u32(input)?;
        let (input, ls_id) = Ipv4Addr::parse_be(input)?;
        let (input, adv_router) = Ipv4Addr::parse_be(input)?;
        let entry = Self {
            ls_type,
            ls_id,
            adv_router,
        };
        Ok((input, entry))
    }
}

impl Emit for OspfLsRequestEntry {
    fn emit(&self, buf: &mut BytesMut) {
        buf.put_u32(self.ls_type);
        buf.put(&self.ls_id.octets()[..]);
        buf.put(&self.adv_router.octets()[..]);
    }
}

#[derive(Debug, Default, Clone)]
pub struct OspfLsUpdate {
    pub num_adv: u32,
    pub lsas: Vec<OspfLsa>,
}

impl OspfLsUpdate {
    pub fn new(lsas: Vec<OspfLsa>) -> Self {
        Self {
            num_adv: lsas.len() as u32,
            lsas,
        }
    }

    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (mut input, num_adv) = be_u32(input)?;
        let mut lsas = Vec::new();
        for _ in 0..num_adv {
            if input.is_empty() {
                return Err(Err::Incomplete(Needed::Unknown));
            }
            let (rest, lsa) = OspfLsa::parse_be(input)?;
            lsas.push(lsa);
            input = rest;
        }
        Ok((input, Self { num_adv, lsas }))
    }
}

impl Emit for OspfLsUpdate {
    fn emit(&self, buf: &mut BytesMut) {
        buf.put_u32(self.lsas.len() as u32);
        for lsa in self.lsas.iter() {
            lsa.emit(buf);
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct OspfLsAck {
    pub lsa_headers: Vec<OspfLsaHeader>,
}

impl OspfLsAck {
    pub fn parse_be(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, lsa_headers) = many0(OspfLsaHeader::parse_be)(input)?;
        Ok((input, Self { lsa_headers }))
    }
}

impl Emit for OspfLsAck {
    fn emit(&self, buf: &mut BytesMut) {
        for h in self.lsa_headers.iter() {
            h.emit(buf);
        }
    }
}

fn checksum_valid(input: &[u8]) -> bool {
    let mut cksum = Checksum::new();
    cksum.add_bytes(&input[0..AUTH_RANGE.start]);
    cksum.add_bytes(&input[AUTH_RANGE.end..]);
    cksum.checksum() == [0; 2]
}

pub fn validate_checksum(input: &[u8]) -> IResult<&[u8], ()> {
    if input.len() < OSPF_HEADER_LEN || !checksum_valid(input) {
        Err(Err::Error(make_error(input, ErrorKind::Verify)))
    } else {
        Ok((input, ()))
    }
}

/// Parse one packet from the front of `input`. Trailing bytes beyond the
/// header length are returned untouched.
pub fn parse(input: &[u8]) -> IResult<&[u8], Ospfv2Packet> {
    if input.len() < OSPF_HEADER_LEN {
        return Err(Err::Incomplete(Needed::new(OSPF_HEADER_LEN - input.len())));
    }
    let len = BigEndian::read_u16(&input[2..4]) as usize;
    if len < OSPF_HEADER_LEN || len > input.len() {
        return Err(Err::Error(make_error(input, ErrorKind::LengthValue)));
    }
    let (packet, rest) = input.split_at(len);
    validate_checksum(packet)?;
    let (_, packet) = Ospfv2Packet::parse_be(packet)?;
    Ok((rest, packet))
}
