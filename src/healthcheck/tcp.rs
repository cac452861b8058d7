use super::HealthChecker;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

/// Protocol version byte that opens the server greeting.
const PROTOCOL_V10: u8 = 0x0a;
/// First payload byte of an error packet (e.g. "too many connections").
const ERR_PACKET: u8 = 0xff;

/// Connects to the published port and waits for the server greeting.
///
/// A bare TCP connect is not enough: the runtime's port proxy accepts
/// connections before the engine listens. The engine speaks first, so a
/// protocol-v10 greeting proves the server is accepting clients.
pub struct TcpHandshakeChecker {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpHandshakeChecker {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    async fn read_greeting(&self) -> std::io::Result<Option<u8>> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;

        // 3-byte little-endian payload length + sequence id
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).await?;
        let len = u32::from_le_bytes([header[0], header[1], header[2], 0]);
        if len == 0 {
            return Ok(None);
        }

        let mut first = [0u8; 1];
        stream.read_exact(&mut first).await?;
        Ok(Some(first[0]))
    }
}

#[async_trait]
impl HealthChecker for TcpHandshakeChecker {
    async fn check(&self) -> Result<bool> {
        match self.read_greeting().await {
            Ok(Some(PROTOCOL_V10)) => Ok(true),
            Ok(Some(ERR_PACKET)) => {
                tracing::debug!("{}:{} answered with an error packet", self.host, self.port);
                Ok(false)
            }
            Ok(_) => Ok(false),
            Err(e) => {
                tracing::trace!("Handshake with {}:{} failed: {}", self.host, self.port, e);
                Ok(false)
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn describe(&self) -> String {
        format!("handshake {}:{}", self.host, self.port)
    }
}
