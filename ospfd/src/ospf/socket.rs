use nix::sys::socket::{setsockopt, sockopt};
use socket2::{Domain, InterfaceIndexOrAddress, Protocol, Socket, Type};

use super::network::{ALL_D_ROUTERS, ALL_SPF_ROUTERS};

pub const OSPF_IP_PROTO: i32 = 89;

pub fn ospf_socket_ipv4() -> Result<Socket, std::io::Error> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::from(OSPF_IP_PROTO)))?;

    socket.set_nonblocking(true)?;
    socket.set_multicast_loop_v4(false)?;
    socket.set_multicast_ttl_v4(1)?;
    setsockopt(&socket, sockopt::Ipv4PacketInfo, &true)?;

    Ok(socket)
}

/// Join AllSPFRouters and AllDRouters on `ifindex`. Packets to
/// AllDRouters are discarded by the instance unless we are DR or Backup.
pub fn ospf_join_if(socket: &Socket, ifindex: u32) -> Result<(), std::io::Error> {
    let index = InterfaceIndexOrAddress::Index(ifindex);
    socket.join_multicast_v4_n(&ALL_SPF_ROUTERS, &index)?;
    socket.join_multicast_v4_n(&ALL_D_ROUTERS, &index)?;
    Ok(())
}
