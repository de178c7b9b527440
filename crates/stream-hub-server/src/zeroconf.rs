//! mDNS advertisement of the MPD endpoint.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceInfo};

const SERVICE_TYPE: &str = "_mpd._tcp.local.";

/// Active advertisement; call [`ZeroconfAdvertiser::shutdown`] to withdraw it.
pub struct ZeroconfAdvertiser {
    daemon: ServiceDaemon,
    fullname: String,
}

/// Advertise `bind` under `instance`. Failures are logged and leave the server running
/// without an advertisement.
pub fn advertise(instance: &str, bind: SocketAddr) -> Option<ZeroconfAdvertiser> {
    let daemon = match ServiceDaemon::new() {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(error = %e, "zeroconf: daemon start failed");
            return None;
        }
    };
    let host_base = gethostname::gethostname().to_string_lossy().to_string();
    let host = if host_base.ends_with(".local.") {
        host_base
    } else {
        format!("{host_base}.local.")
    };
    let ip = if bind.ip().is_unspecified() {
        local_ip().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
    } else {
        bind.ip()
    };
    let properties: HashMap<String, String> = HashMap::new();
    let info = match ServiceInfo::new(SERVICE_TYPE, instance, &host, ip, bind.port(), properties)
    {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(error = %e, instance, "zeroconf: invalid service info");
            return None;
        }
    };
    let fullname = info.get_fullname().to_string();
    if let Err(e) = daemon.register(info) {
        tracing::warn!(error = %e, "zeroconf: register failed");
        return None;
    }
    tracing::info!(instance, host = %host, addr = %SocketAddr::new(ip, bind.port()), "zeroconf: advertised");
    Some(ZeroconfAdvertiser { daemon, fullname })
}

impl ZeroconfAdvertiser {
    pub fn shutdown(&self) {
        if let Ok(rx) = self.daemon.unregister(&self.fullname) {
            let _ = rx.recv_timeout(Duration::from_secs(1));
        }
        if let Ok(rx) = self.daemon.shutdown() {
            let _ = rx.recv_timeout(Duration::from_secs(1));
        }
        tracing::info!(service = %self.fullname, "zeroconf: withdrawn");
    }
}

/// Best-effort address of the interface used for outbound traffic.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    if socket.connect("8.8.8.8:80").is_err() && socket.connect("1.1.1.1:80").is_err() {
        return None;
    }
    socket.local_addr().ok().map(|addr| addr.ip())
}
