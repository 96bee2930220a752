//! Generic syslog/CEF sink (§4.I, §6), the fallback for any SIEM without a
//! native adapter above.
//!
//! `CEF:0|OpenLabels|Scanner|2.0|{event_id}|{name}|{severity}|{extensions}`,
//! transported over UDP, TCP, or TLS syslog.

use crate::cef::format_cef;
use crate::record::ExportRecord;
use crate::sinks::SiemSink;
use crate::syslog_transport::{SyslogProtocol, SyslogTransport};
use async_trait::async_trait;
use openlabels_core::error::Result;

const VENDOR: &str = "OpenLabels";
const PRODUCT: &str = "Scanner";
const PRODUCT_VERSION: &str = "2.0";

pub struct SyslogCefSink {
    transport: SyslogTransport,
}

impl SyslogCefSink {
    pub fn new(host: String, port: u16, protocol: SyslogProtocol, use_tls: bool) -> Self {
        Self {
            transport: SyslogTransport::new(host, port, protocol, use_tls),
        }
    }
}

#[async_trait]
impl SiemSink for SyslogCefSink {
    async fn export_batch(&self, records: &[ExportRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let messages: Vec<String> = records
            .iter()
            .map(|r| format_cef(r, VENDOR, PRODUCT, PRODUCT_VERSION))
            .collect();
        self.transport.send(&messages).await
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(self
            .transport
            .probe("CEF:0|OpenLabels|Scanner|2.0|test|Connection Test|1|")
            .await
            .is_ok())
    }

    fn name(&self) -> &'static str {
        "syslog_cef"
    }
}
