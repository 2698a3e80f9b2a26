use std::io::{ErrorKind, IoSlice, IoSliceMut};
use std::net::Ipv4Addr;
use std::os::fd::AsRawFd;
use std::sync::Arc;

use bytes::BytesMut;
use nix::sys::socket::{self, ControlMessageOwned, SockaddrIn};
use ospf_packet::Ospfv2Packet;
use socket2::Socket;
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::{ospf_debug, ospf_warn};

use super::error::OspfError;
use super::inst::Message;
use super::nfsm::NfsmEvent;

pub const ALL_SPF_ROUTERS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 5);
pub const ALL_D_ROUTERS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 6);

/// Raw socket reader. Every parsed packet is posted to the instance as
/// `Message::Recv`; packets which fail to parse are dropped.
pub async fn read_packet(sock: Arc<AsyncFd<Socket>>, tx: UnboundedSender<Message>) {
    let mut buf = [0u8; 1024 * 16];
    let mut iov = [IoSliceMut::new(&mut buf)];
    let mut cmsgspace = nix::cmsg_space!(libc::in_pktinfo);

    loop {
        let res = sock
            .async_io(Interest::READABLE, |sock| {
                let msg = socket::recvmsg::<SockaddrIn>(
                    sock.as_raw_fd(),
                    &mut iov,
                    Some(&mut cmsgspace),
                    socket::MsgFlags::empty(),
                )?;

                let Some(src) = msg.address else {
                    return Err(ErrorKind::AddrNotAvailable.into());
                };

                let mut cmsgs = msg.cmsgs()?;
                let Some(ControlMessageOwned::Ipv4PacketInfo(pktinfo)) = cmsgs.next() else {
                    return Err(ErrorKind::AddrNotAvailable.into());
                };
                let dest = Ipv4Addr::from(u32::from_be(pktinfo.ipi_addr.s_addr));
                let ifindex = pktinfo.ipi_ifindex as u32;

                let Some(input) = msg.iovs().next() else {
                    return Err(ErrorKind::UnexpectedEof.into());
                };
                // Raw IPv4 sockets deliver the IP header.
                let ihl = input.first().map(|b| ((b & 0x0f) as usize) * 4).unwrap_or(0);
                if ihl == 0 || input.len() < ihl {
                    return Err(ErrorKind::UnexpectedEof.into());
                }
                let packet = Ospfv2Packet::from_bytes(&input[ihl..]);
                Ok((packet, src.ip(), ifindex, dest))
            })
            .await;

        match res {
            Ok((Ok(packet), src, ifindex, dest)) => {
                if tx.send(Message::Recv(packet, src, ifindex, dest)).is_err() {
                    return;
                }
            }
            Ok((Err(err), src, ifindex, _)) => {
                let err = OspfError::from(err);
                ospf_debug!("Drop packet from {} ifindex {}: {}", src, ifindex, err);
            }
            Err(err) => {
                ospf_debug!("Read error: {}", err);
            }
        }
    }
}

/// Unicast sends refused as unreachable are the lower layer telling us the
/// neighbor is gone.
pub fn ll_down_event(
    err: &std::io::Error,
    ifindex: u32,
    dest: Option<Ipv4Addr>,
) -> Option<Message> {
    let dest = dest.filter(|dest| !dest.is_multicast())?;
    match err.raw_os_error() {
        Some(libc::EHOSTUNREACH) | Some(libc::ENETUNREACH) => {
            Some(Message::Nfsm(ifindex, dest, NfsmEvent::LLDown))
        }
        _ => None,
    }
}

/// Raw socket writer for `Message::Send`. Packets without a destination go
/// to AllSPFRouters.
pub async fn write_packet(
    sock: Arc<AsyncFd<Socket>>,
    mut rx: UnboundedReceiver<Message>,
    tx: UnboundedSender<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let Message::Send(packet, ifindex, nbr) = msg else {
            continue;
        };

        let mut buf = BytesMut::new();
        packet.emit(&mut buf);

        let iov = [IoSlice::new(&buf)];
        let dest = nbr.unwrap_or(ALL_SPF_ROUTERS);
        let sockaddr: SockaddrIn = std::net::SocketAddrV4::new(dest, 0).into();
        let pktinfo = libc::in_pktinfo {
            ipi_ifindex: ifindex as i32,
            ipi_spec_dst: libc::in_addr { s_addr: 0 },
            ipi_addr: libc::in_addr { s_addr: 0 },
        };
        let cmsg = [socket::ControlMessage::Ipv4PacketInfo(&pktinfo)];

        let res = sock
            .async_io(Interest::WRITABLE, |sock| {
                socket::sendmsg(
                    sock.as_raw_fd(),
                    &iov,
                    &cmsg,
                    socket::MsgFlags::empty(),
                    Some(&sockaddr),
                )
                .map_err(std::io::Error::from)
            })
            .await;
        if let Err(err) = res {
            ospf_warn!("Send {} to {} ifindex {}: {}", packet.typ, dest, ifindex, err);
            if let Some(msg) = ll_down_event(&err, ifindex, nbr) {
                let _ = tx.send(msg);
            }
        }
    }
}
