//! IBM QRadar sink via syslog, LEEF (preferred) or CEF framing (§4.I, §6).
//!
//! `LEEF:2.0|OpenLabels|Scanner|2.0|{eventId}|\t{k}={v}\t...`, transported
//! over TCP or UDP, optionally TLS.

use crate::cef::{format_cef, format_leef};
use crate::record::ExportRecord;
use crate::sinks::SiemSink;
use crate::syslog_transport::{SyslogProtocol, SyslogTransport};
use async_trait::async_trait;
use openlabels_core::error::Result;

const VENDOR: &str = "OpenLabels";
const PRODUCT: &str = "Scanner";
const PRODUCT_VERSION: &str = "2.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QRadarFormat {
    Leef,
    Cef,
}

impl QRadarFormat {
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("cef") {
            QRadarFormat::Cef
        } else {
            QRadarFormat::Leef
        }
    }
}

pub struct QRadarSink {
    transport: SyslogTransport,
    format: QRadarFormat,
}

impl QRadarSink {
    pub fn new(host: String, port: u16, protocol: SyslogProtocol, use_tls: bool, format: QRadarFormat) -> Self {
        Self {
            transport: SyslogTransport::new(host, port, protocol, use_tls),
            format,
        }
    }

    fn format_record(&self, record: &ExportRecord) -> String {
        match self.format {
            QRadarFormat::Leef => format_leef(record, VENDOR, PRODUCT, PRODUCT_VERSION),
            QRadarFormat::Cef => format_cef(record, VENDOR, PRODUCT, PRODUCT_VERSION),
        }
    }
}

#[async_trait]
impl SiemSink for QRadarSink {
    async fn export_batch(&self, records: &[ExportRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let messages: Vec<String> = records.iter().map(|r| self.format_record(r)).collect();
        self.transport.send(&messages).await
    }

    async fn test_connection(&self) -> Result<bool> {
        Ok(self.transport.probe("OpenLabels connection test").await.is_ok())
    }

    fn name(&self) -> &'static str {
        "qradar"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parse_defaults_to_leef() {
        assert_eq!(QRadarFormat::parse("leef"), QRadarFormat::Leef);
        assert_eq!(QRadarFormat::parse("CEF"), QRadarFormat::Cef);
        assert_eq!(QRadarFormat::parse("bogus"), QRadarFormat::Leef);
    }
}
