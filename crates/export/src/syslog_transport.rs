//! Shared TCP/UDP/TLS syslog sender for the QRadar and Syslog-CEF sinks
//! (§4.I "Transport: Syslog over TCP or UDP, optional TLS"). Both sinks
//! frame their payload differently (LEEF vs. CEF) but send it the same way,
//! so the transport lives here once instead of twice.

use openlabels_core::error::{Error, Result};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

/// RFC 5424-ish syslog priority: facility 1 (user-level), severity 6 (info).
const SYSLOG_PRI: &str = "<14>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyslogProtocol {
    Tcp,
    Udp,
}

impl SyslogProtocol {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("udp") {
            SyslogProtocol::Udp
        } else {
            SyslogProtocol::Tcp
        }
    }
}

pub struct SyslogTransport {
    host: String,
    port: u16,
    protocol: SyslogProtocol,
    use_tls: bool,
}

impl SyslogTransport {
    pub fn new(host: String, port: u16, protocol: SyslogProtocol, use_tls: bool) -> Self {
        Self {
            host,
            port,
            protocol,
            use_tls,
        }
    }

    /// Sends every message as its own `<pri>message\n` syslog frame. Returns
    /// the number of messages sent, or an error on the first failed write —
    /// syslog has no per-message ack, so partial delivery on a broken
    /// connection can't be distinguished message-by-message.
    pub async fn send(&self, messages: &[String]) -> Result<usize> {
        if messages.is_empty() {
            return Ok(0);
        }
        match self.protocol {
            SyslogProtocol::Udp => self.send_udp(messages).await,
            SyslogProtocol::Tcp => self.send_tcp(messages).await,
        }
    }

    async fn send_udp(&self, messages: &[String]) -> Result<usize> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| Error::transient(format!("syslog UDP bind failed: {e}")))?;
        socket
            .connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| Error::transient(format!("syslog UDP connect failed: {e}")))?;

        for message in messages {
            let frame = format!("{SYSLOG_PRI}{message}\n");
            socket
                .send(frame.as_bytes())
                .await
                .map_err(|e| Error::transient(format!("syslog UDP send failed: {e}")))?;
        }
        Ok(messages.len())
    }

    async fn send_tcp(&self, messages: &[String]) -> Result<usize> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| Error::transient(format!("syslog TCP connect failed: {e}")))?;

        if self.use_tls {
            let connector = self.tls_connector()?;
            let server_name = ServerName::try_from(self.host.clone())
                .map_err(|e| Error::validation(format!("invalid syslog TLS hostname: {e}")))?;
            let mut tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| Error::transient(format!("syslog TLS handshake failed: {e}")))?;
            for message in messages {
                let frame = format!("{SYSLOG_PRI}{message}\n");
                tls_stream
                    .write_all(frame.as_bytes())
                    .await
                    .map_err(|e| Error::transient(format!("syslog TLS write failed: {e}")))?;
            }
            tls_stream
                .flush()
                .await
                .map_err(|e| Error::transient(format!("syslog TLS flush failed: {e}")))?;
        } else {
            let mut stream = stream;
            for message in messages {
                let frame = format!("{SYSLOG_PRI}{message}\n");
                stream
                    .write_all(frame.as_bytes())
                    .await
                    .map_err(|e| Error::transient(format!("syslog TCP write failed: {e}")))?;
            }
            stream
                .flush()
                .await
                .map_err(|e| Error::transient(format!("syslog TCP flush failed: {e}")))?;
        }
        Ok(messages.len())
    }

    fn tls_connector(&self) -> Result<TlsConnector> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(TlsConnector::from(Arc::new(config)))
    }

    /// Sends a single best-effort probe message, used by `test_connection`.
    pub async fn probe(&self, message: &str) -> Result<()> {
        self.send(&[message.to_string()]).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_parse_defaults_to_tcp() {
        assert_eq!(SyslogProtocol::parse("udp"), SyslogProtocol::Udp);
        assert_eq!(SyslogProtocol::parse("UDP"), SyslogProtocol::Udp);
        assert_eq!(SyslogProtocol::parse("tcp"), SyslogProtocol::Tcp);
        assert_eq!(SyslogProtocol::parse("anything-else"), SyslogProtocol::Tcp);
    }

    #[tokio::test]
    async fn send_with_no_messages_is_a_no_op() {
        let transport = SyslogTransport::new("127.0.0.1".to_string(), 1, SyslogProtocol::Udp, false);
        assert_eq!(transport.send(&[]).await.unwrap(), 0);
    }
}
