//! Bind-address resolution

use std::net::{IpAddr, Ipv4Addr};

use crate::config::ServerConfig;

/// First IPv4 address assigned to the named interface
pub fn interface_ipv4(name: &str) -> Option<Ipv4Addr> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            tracing::warn!("Failed to enumerate network interfaces: {}", e);
            return None;
        }
    };

    interfaces
        .into_iter()
        .filter(|iface| iface.name == name)
        .find_map(|iface| match iface.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
}

/// Host to bind: the configured interface's address when it has one,
/// otherwise `server.host`
pub fn resolve_bind_host(config: &ServerConfig) -> String {
    let Some(name) = config.bind_interface.as_deref() else {
        return config.host.clone();
    };

    match interface_ipv4(name) {
        Some(ip) => {
            tracing::info!("Binding to interface {} ({})", name, ip);
            ip.to_string()
        }
        None => {
            tracing::warn!(
                "Interface {} has no IPv4 address, falling back to {}",
                name,
                config.host
            );
            config.host.clone()
        }
    }
}

/// `host:port` for the listener; names are resolved when binding
pub fn bind_address(config: &ServerConfig) -> String {
    format!("{}:{}", resolve_bind_host(config), config.port)
}
