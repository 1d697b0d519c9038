use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use tracing::debug;

/// Any routable address works, `connect` on UDP sends nothing.
const PROBE_ADDR: &str = "8.8.8.8:80";

/// Best guess at the address other machines on the network can reach us on.
/// Falls back to loopback when there is no route.
pub fn local_ip() -> IpAddr {
    probe_local_ip()
        .inspect_err(|error| debug!(?error, "Local IP probe failed, using loopback"))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn probe_local_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(PROBE_ADDR)?;
    Ok(socket.local_addr()?.ip())
}

pub fn upload_url(port: u16) -> String {
    format!("http://{}:{port}/", local_ip())
}
