use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Cursor;

use super::{Parser, ParserCategory, ParserMetadata};
use crate::error::{Result, SocError};
use crate::models::event::{EventOutcome, HostFacets, NetworkFacets, ProcessFacets, UserFacets};
use crate::models::{EventKind, ParsedEvent};

const EVTX_MAGIC: &[u8] = b"ElfFile\x00";

/// EventID -> (event.category, event.type, event.action). Ported from the
/// reference backend's Windows Security/Sysmon event mapping table.
static EVENT_CATEGORY_MAP: Lazy<HashMap<u32, (&'static [&'static str], &'static [&'static str], &'static str)>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(4624, (&["authentication"][..], &["start"][..], "user_logon"));
    m.insert(4625, (&["authentication"][..], &["start"][..], "user_logon_failed"));
    m.insert(4634, (&["authentication"][..], &["end"][..], "user_logoff"));
    m.insert(4648, (&["authentication"][..], &["start"][..], "explicit_logon"));
    m.insert(4672, (&["authentication", "iam"][..], &["admin"][..], "special_privileges_assigned"));
    m.insert(4688, (&["process"][..], &["start"][..], "process_created"));
    m.insert(4689, (&["process"][..], &["end"][..], "process_terminated"));
    m.insert(4663, (&["file"][..], &["access"][..], "object_access"));
    m.insert(4656, (&["file"][..], &["access"][..], "handle_requested"));
    m.insert(4658, (&["file"][..], &["access"][..], "handle_closed"));
    m.insert(4720, (&["iam"][..], &["creation"][..], "user_account_created"));
    m.insert(4722, (&["iam"][..], &["change"][..], "user_account_enabled"));
    m.insert(4723, (&["iam"][..], &["change"][..], "password_change_attempted"));
    m.insert(4724, (&["iam"][..], &["change"][..], "password_reset_attempted"));
    m.insert(4725, (&["iam"][..], &["change"][..], "user_account_disabled"));
    m.insert(4726, (&["iam"][..], &["deletion"][..], "user_account_deleted"));
    m.insert(4732, (&["iam"][..], &["group"][..], "member_added_to_group"));
    m.insert(4733, (&["iam"][..], &["group"][..], "member_removed_from_group"));
    m.insert(4719, (&["configuration"][..], &["change"][..], "audit_policy_changed"));
    m.insert(4907, (&["configuration"][..], &["change"][..], "audit_settings_changed"));
    m.insert(7045, (&["process"][..], &["start"][..], "service_installed"));
    m.insert(7036, (&["process"][..], &["change"][..], "service_state_changed"));
    m.insert(4698, (&["process", "configuration"][..], &["creation"][..], "scheduled_task_created"));
    m.insert(4699, (&["process", "configuration"][..], &["deletion"][..], "scheduled_task_deleted"));
    m.insert(4700, (&["process", "configuration"][..], &["change"][..], "scheduled_task_enabled"));
    m.insert(4701, (&["process", "configuration"][..], &["change"][..], "scheduled_task_disabled"));
    m.insert(4702, (&["process", "configuration"][..], &["change"][..], "scheduled_task_updated"));
    m.insert(4103, (&["process"][..], &["info"][..], "powershell_module_logged"));
    m.insert(4104, (&["process"][..], &["info"][..], "powershell_script_block_logged"));
    m.insert(5156, (&["network"][..], &["connection"][..], "firewall_connection_allowed"));
    m.insert(5157, (&["network"][..], &["connection"][..], "firewall_connection_blocked"));
    m
});

pub struct EvtxParser;

impl EvtxParser {
    fn build_message(event_id: u32, data: &Value) -> String {
        let get = |k: &str| data.get(k).and_then(|v| v.as_str()).unwrap_or("");
        match event_id {
            4624 => format!("An account was successfully logged on: {}", get("TargetUserName")),
            4625 => format!("An account failed to log on: {}", get("TargetUserName")),
            4688 => format!("A new process has been created: {}", get("NewProcessName")),
            4689 => format!("A process has exited: {}", get("ProcessName")),
            4720 => format!("A user account was created: {}", get("TargetUserName")),
            4726 => format!("A user account was deleted: {}", get("TargetUserName")),
            7045 => format!("A service was installed in the system: {}", get("ServiceName")),
            4104 => format!("PowerShell script block logged: {}", get("ScriptBlockText")),
            _ => format!("Windows event {event_id}"),
        }
    }

    fn extract_filename(path: &str) -> Option<String> {
        if path.is_empty() {
            return None;
        }
        let sep = if path.contains('\\') { '\\' } else { '/' };
        path.rsplit(sep).next().map(str::to_string)
    }

    fn parse_pid(raw: &str) -> Option<i64> {
        let raw = raw.trim();
        if let Some(hex) = raw.strip_prefix("0x") {
            i64::from_str_radix(hex, 16).ok()
        } else {
            raw.parse().ok()
        }
    }

    fn parse_record(&self, value: &Value, source_file: &str, line: u64) -> Result<ParsedEvent> {
        let event = value
            .get("Event")
            .ok_or_else(|| SocError::parser("missing Event root"))?;
        let system = event.get("System").ok_or_else(|| SocError::parser("missing System block"))?;
        let event_id = system
            .get("EventID")
            .and_then(|v| v.as_u64().or_else(|| v.get("#text")?.as_str()?.parse().ok()))
            .ok_or_else(|| SocError::parser("missing EventID"))? as u32;

        let time_created = system
            .get("TimeCreated")
            .and_then(|v| v.get("#attributes")?.get("SystemTime")?.as_str())
            .or_else(|| system.get("TimeCreated").and_then(|v| v.as_str()))
            .ok_or_else(|| SocError::parser("missing TimeCreated"))?;
        let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(time_created)
            .map_err(|e| SocError::parser(format!("invalid TimeCreated: {e}")))?
            .with_timezone(&Utc);

        let event_data = event
            .get("EventData")
            .and_then(|d| d.get("Data"))
            .cloned()
            .unwrap_or(Value::Null);
        let data_map = flatten_event_data(&event_data);
        let data = Value::Object(data_map.into_iter().collect());

        let (category, event_type, action) = EVENT_CATEGORY_MAP
            .get(&event_id)
            .copied()
            .unwrap_or((&["configuration"][..], &["info"][..], "unknown_windows_event"));

        let outcome = match event_id {
            4624 => Some(EventOutcome::Success),
            4625 => Some(EventOutcome::Failure),
            _ => None,
        };

        let get = |k: &str| data.get(k).and_then(|v| v.as_str()).map(str::to_string);

        let mut parsed = ParsedEvent::new(timestamp, "windows_evtx", source_file);
        parsed.source_line = Some(line);
        parsed.kind = EventKind::Event;
        parsed.category = category.iter().map(|s| s.to_string()).collect();
        parsed.event_type = event_type.iter().map(|s| s.to_string()).collect();
        parsed.action = Some(action.to_string());
        parsed.outcome = outcome;
        parsed.message = Some(Self::build_message(event_id, &data));

        parsed.host = HostFacets { name: get("Computer"), ..Default::default() };
        parsed.user = UserFacets {
            name: get("TargetUserName").or_else(|| get("SubjectUserName")),
            domain: get("TargetDomainName").or_else(|| get("SubjectDomainName")),
            id: get("TargetUserSid").or_else(|| get("SubjectUserSid")),
        };

        let process_name = get("NewProcessName").or_else(|| get("ProcessName"));
        parsed.process = ProcessFacets {
            name: process_name.as_deref().and_then(Self::extract_filename),
            pid: get("NewProcessId").or_else(|| get("ProcessId")).and_then(|s| Self::parse_pid(&s)),
            ppid: get("ProcessId").and_then(|s| Self::parse_pid(&s)).filter(|_| event_id == 4688),
            executable: process_name,
            command_line: get("CommandLine"),
        };

        parsed.network = NetworkFacets {
            source_ip: get("IpAddress").or_else(|| get("SourceAddress")),
            source_port: get("IpPort").or_else(|| get("SourcePort")).and_then(|s| s.parse().ok()),
            destination_ip: get("DestAddress"),
            destination_port: get("DestPort").and_then(|s| s.parse().ok()),
            ..Default::default()
        };

        parsed.raw.insert("event_data".into(), data);
        Ok(parsed)
    }
}

fn flatten_event_data(data: &Value) -> serde_json::Map<String, Value> {
    let mut map = serde_json::Map::new();
    if let Some(arr) = data.as_array() {
        for entry in arr {
            if let (Some(name), Some(text)) = (
                entry.get("#attributes").and_then(|a| a.get("Name")).and_then(|v| v.as_str()),
                entry.get("#text"),
            ) {
                map.insert(name.to_string(), text.clone());
            }
        }
    }
    map
}

impl Parser for EvtxParser {
    fn metadata(&self) -> ParserMetadata {
        ParserMetadata {
            name: "windows_evtx",
            category: ParserCategory::Logs,
            description: "Windows Event Log (.evtx) security/audit records",
            supported_extensions: &[".evtx"],
            supported_mime_types: &["application/x-ms-evtx"],
            priority: 100,
        }
    }

    fn can_parse(&self, path: Option<&str>, head_bytes: Option<&[u8]>, _mime: Option<&str>) -> bool {
        if let Some(head) = head_bytes {
            if head.starts_with(EVTX_MAGIC) {
                return true;
            }
        }
        path.map(|p| p.to_ascii_lowercase().ends_with(".evtx")).unwrap_or(false)
    }

    fn parse(&self, source: &[u8], source_name: &str) -> Result<Vec<ParsedEvent>> {
        let mut reader = ::evtx::EvtxParser::from_buffer(source.to_vec())
            .map_err(|e| SocError::corruption(format!("invalid EVTX structure: {e}")))?;

        let mut events = Vec::new();
        let mut failures = 0u32;
        for (line, record) in reader.records_json().enumerate() {
            if failures >= super::DEFAULT_FAILURE_CEILING {
                break;
            }
            let parsed = record
                .map_err(|e| SocError::parser(e.to_string()))
                .and_then(|rec| serde_json::from_str::<Value>(&rec.data).map_err(SocError::from))
                .and_then(|value| self.parse_record(&value, source_name, line as u64));
            match parsed {
                Ok(event) => events.push(event),
                Err(_) => failures += 1,
            }
        }
        let _ = Cursor::new(&source);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn logon_record_maps_to_authentication_category() {
        let parser = EvtxParser;
        let record = json!({
            "Event": {
                "System": {
                    "EventID": 4624,
                    "TimeCreated": {"#attributes": {"SystemTime": "2026-01-15T10:30:00Z"}},
                    "Computer": "WORK-01",
                },
                "EventData": {
                    "Data": [
                        {"#attributes": {"Name": "TargetUserName"}, "#text": "jsmith"},
                        {"#attributes": {"Name": "TargetDomainName"}, "#text": "CORP"},
                        {"#attributes": {"Name": "IpAddress"}, "#text": "192.168.1.100"},
                    ]
                }
            }
        });

        let event = parser.parse_record(&record, "security.evtx", 0).unwrap();
        assert_eq!(event.category, vec!["authentication"]);
        assert_eq!(event.action.as_deref(), Some("user_logon"));
        assert_eq!(event.outcome, Some(EventOutcome::Success));
        assert_eq!(event.user.name.as_deref(), Some("jsmith"));
        assert_eq!(event.user.domain.as_deref(), Some("CORP"));
        assert_eq!(event.network.source_ip.as_deref(), Some("192.168.1.100"));
        assert_eq!(event.timestamp.to_rfc3339(), "2026-01-15T10:30:00+00:00");
    }

    #[test]
    fn can_parse_detects_magic_bytes() {
        let parser = EvtxParser;
        assert!(parser.can_parse(None, Some(EVTX_MAGIC), None));
        assert!(parser.can_parse(Some("security.evtx"), None, None));
        assert!(!parser.can_parse(Some("access.log"), Some(b"not evtx"), None));
    }
}
