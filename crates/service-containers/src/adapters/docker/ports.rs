//! Ephemeral host port allocation.

use crate::Result;
use async_net::TcpListener;
use std::net::Ipv4Addr;

/// Ask the OS for a free TCP port.
///
/// The bound socket is closed before returning, so the port is only free
/// until someone else binds it; docker binds it moments later.
pub(crate) async fn free_port() -> Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    Ok(listener.local_addr()?.port())
}
