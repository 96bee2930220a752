//! Builds concrete [`SiemSink`]s from `SiemSinkConfig` (§6 configuration
//! surface). Mirrors `openlabels_adapters::kind::build_adapter`: this is the
//! one place that matches on a sink's `kind` string; everything downstream
//! holds a `dyn SiemSink`.

use crate::sinks::{ElasticSink, QRadarSink, SentinelSink, SiemSink, SplunkSink, SyslogCefSink};
use crate::sinks::elastic::ElasticAuth;
use crate::sinks::qradar::QRadarFormat;
use crate::syslog_transport::SyslogProtocol;
use openlabels_core::config::SiemSinkConfig;
use openlabels_core::error::{Error, ErrorCode, Result};
use openlabels_core::security::EncryptionService;
use std::sync::Arc;

/// Reads a required field out of a sink's loosely-typed config map.
fn required<'a>(fields: &'a std::collections::HashMap<String, String>, key: &str, kind: &str) -> Result<&'a str> {
    fields.get(key).map(String::as_str).ok_or_else(|| {
        Error::new(
            ErrorCode::ValidationFailed,
            format!("siem_export sink of kind '{kind}' is missing required field '{key}'"),
        )
    })
}

fn optional<'a>(fields: &'a std::collections::HashMap<String, String>, key: &str) -> Option<&'a str> {
    fields.get(key).map(String::as_str)
}

/// Decrypts a field that was stored at rest under encryption (connection
/// secrets: HEC tokens, shared keys, API keys).
fn decrypt_required(
    fields: &std::collections::HashMap<String, String>,
    key: &str,
    kind: &str,
    encryption: &EncryptionService,
) -> Result<String> {
    encryption.decrypt_string(required(fields, key, kind)?)
}

/// Builds one sink from its configuration. Returns an error for an
/// unrecognized `kind` rather than silently skipping it — a typo in
/// `siem_export.sinks` should fail loudly at startup, not drop a sink.
pub fn build_sink(config: &SiemSinkConfig, encryption: &EncryptionService) -> Result<Arc<dyn SiemSink>> {
    let fields = &config.fields;
    let kind = config.kind.as_str();

    let sink: Arc<dyn SiemSink> = match kind {
        "splunk" => Arc::new(SplunkSink::new(
            required(fields, "hec_url", kind)?.to_string(),
            decrypt_required(fields, "hec_token", kind, encryption)?,
            optional(fields, "index").unwrap_or("main").to_string(),
            optional(fields, "sourcetype").unwrap_or("openlabels").to_string(),
        )),
        "sentinel" => Arc::new(SentinelSink::new(
            required(fields, "workspace_id", kind)?.to_string(),
            decrypt_required(fields, "shared_key", kind, encryption)?,
            optional(fields, "log_type").unwrap_or("OpenLabels").to_string(),
        )),
        "qradar" => Arc::new(QRadarSink::new(
            required(fields, "syslog_host", kind)?.to_string(),
            optional(fields, "syslog_port").unwrap_or("514").parse().map_err(|_| {
                Error::new(ErrorCode::ValidationFailed, "qradar syslog_port is not a valid u16")
            })?,
            SyslogProtocol::parse(optional(fields, "protocol").unwrap_or("tcp")),
            optional(fields, "use_tls").unwrap_or("false") == "true",
            QRadarFormat::parse(optional(fields, "format").unwrap_or("leef")),
        )),
        "elastic" => {
            let host = required(fields, "host", kind)?.to_string();
            let auth = if let Some(api_key) = optional(fields, "api_key") {
                ElasticAuth::ApiKey(encryption.decrypt_string(api_key)?)
            } else if let (Some(username), Some(password)) =
                (optional(fields, "username"), optional(fields, "password"))
            {
                ElasticAuth::Basic {
                    username: username.to_string(),
                    password: encryption.decrypt_string(password)?,
                }
            } else {
                ElasticAuth::None
            };
            Arc::new(ElasticSink::new(
                host,
                auth,
                optional(fields, "index_prefix").unwrap_or("openlabels").to_string(),
            ))
        }
        "syslog_cef" => Arc::new(SyslogCefSink::new(
            required(fields, "host", kind)?.to_string(),
            optional(fields, "port").unwrap_or("514").parse().map_err(|_| {
                Error::new(ErrorCode::ValidationFailed, "syslog_cef port is not a valid u16")
            })?,
            SyslogProtocol::parse(optional(fields, "protocol").unwrap_or("tcp")),
            optional(fields, "use_tls").unwrap_or("false") == "true",
        )),
        other => {
            return Err(Error::new(
                ErrorCode::ValidationFailed,
                format!("unknown siem_export sink kind '{other}'"),
            ))
        }
    };

    Ok(sink)
}

/// Builds every configured sink, keyed by its config map key (not its
/// `SiemSink::name()`, since an operator may configure two sinks of the
/// same kind — e.g. two separate syslog_cef destinations).
pub fn build_sinks(
    sinks: &std::collections::HashMap<String, SiemSinkConfig>,
    encryption: &EncryptionService,
) -> Result<Vec<Arc<dyn SiemSink>>> {
    sinks.values().map(|cfg| build_sink(cfg, encryption)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use openlabels_core::config::SecurityConfig;
    use std::collections::HashMap;

    fn encryption() -> EncryptionService {
        EncryptionService::new(&SecurityConfig {
            aes_encryption_key: "01234567890123456789012345678901".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let cfg = SiemSinkConfig {
            kind: "bogus".to_string(),
            fields: HashMap::new(),
        };
        assert!(build_sink(&cfg, &encryption()).is_err());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let cfg = SiemSinkConfig {
            kind: "splunk".to_string(),
            fields: HashMap::new(),
        };
        assert!(build_sink(&cfg, &encryption()).is_err());
    }
}
