//! CSV export of audit entries.

use super::types::AuditLogEntry;
use crate::datetime::format_timestamp;

const HEADER: [&str; 12] = [
    "id",
    "timestamp",
    "actor_id",
    "actor_email",
    "action",
    "entity_type",
    "entity_id",
    "success",
    "error_message",
    "ip",
    "user_agent",
    "details",
];

/// Quote a field if it contains a delimiter, quote or line break.
///
/// Fields starting with a formula trigger are prefixed with `'` so spreadsheet
/// applications do not evaluate them.
fn escape_field(value: &str) -> String {
    let value = if value.starts_with(['=', '+', '-', '@']) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value
    }
}

/// Render entries as CSV with timestamps in `timezone`.
pub fn to_csv(entries: &[AuditLogEntry], timezone: &str) -> String {
    let mut out = HEADER.join(",");
    out.push_str("\r\n");

    for e in entries {
        let fields = [
            e.id.to_string(),
            format_timestamp(e.created_at, timezone, "%Y-%m-%d %H:%M:%S %Z"),
            e.actor_id.map(|id| id.to_string()).unwrap_or_default(),
            e.actor_email.clone().unwrap_or_default(),
            e.action.as_str().to_string(),
            e.entity_type.as_str().to_string(),
            e.entity_id.clone().unwrap_or_default(),
            e.success.to_string(),
            e.error_message.clone().unwrap_or_default(),
            e.ip.clone().unwrap_or_default(),
            e.user_agent.clone().unwrap_or_default(),
            e.details.clone().unwrap_or_default(),
        ];
        let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditAction, EntityType};

    fn entry() -> AuditLogEntry {
        AuditLogEntry {
            id: 1,
            actor_id: Some(4),
            actor_email: Some("jane@example.com".to_string()),
            action: AuditAction::FileDownload,
            entity_type: EntityType::File,
            entity_id: Some("abc".to_string()),
            details: Some(r#"{"state":"granted","n":1}"#.to_string()),
            ip: Some("10.0.0.1".to_string()),
            user_agent: Some("Mozilla/5.0 (X11, Linux)".to_string()),
            // 2024-01-15T10:30:00Z
            created_at: 1_705_314_600,
            success: true,
            error_message: None,
        }
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("=SUM(A1)"), "'=SUM(A1)");
    }

    #[test]
    fn test_to_csv() {
        let csv = to_csv(&[entry()], "Europe/Berlin");
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines[0], HEADER.join(","));
        assert!(lines[1].starts_with("1,2024-01-15 11:30:00 CET,4,jane@example.com,file.download,file,abc,true,,"));
        assert!(lines[1].contains("\"Mozilla/5.0 (X11, Linux)\""));
        assert!(lines[1].ends_with("\"{\"\"state\"\":\"\"granted\"\",\"\"n\"\":1}\""));
        assert_eq!(lines[2], "");
    }

    #[test]
    fn test_to_csv_empty() {
        assert_eq!(to_csv(&[], "UTC"), format!("{}\r\n", HEADER.join(",")));
    }
}
