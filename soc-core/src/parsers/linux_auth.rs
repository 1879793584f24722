use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Parser, ParserCategory, ParserMetadata};
use crate::error::Result;
use crate::models::event::{EventOutcome, HostFacets, NetworkFacets, UserFacets};
use crate::models::{EventKind, ParsedEvent};

/// `Mon DD HH:MM:SS host sshd[pid]: ...` syslog-style prefix.
static SYSLOG_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<mon>\w{3})\s+(?P<day>\d{1,2})\s(?P<time>\d{2}:\d{2}:\d{2})\s(?P<host>\S+)\s(?P<proc>\w+)(\[(?P<pid>\d+)\])?:\s(?P<rest>.*)$").unwrap()
});

static SSH_FAILED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Failed password for (invalid user )?(?P<user>\S+) from (?P<ip>[0-9a-fA-F:.]+) port (?P<port>\d+)").unwrap()
});

static SSH_ACCEPTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Accepted (password|publickey) for (?P<user>\S+) from (?P<ip>[0-9a-fA-F:.]+) port (?P<port>\d+)").unwrap()
});

static SUDO_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<user>\S+)\s*:.*COMMAND=(?P<cmd>.*)$").unwrap()
});

pub struct LinuxAuthParser;

impl LinuxAuthParser {
    fn parse_timestamp(mon: &str, day: &str, time: &str) -> Option<DateTime<Utc>> {
        let year = Utc::now().year();
        let naive = NaiveDateTime::parse_from_str(&format!("{year} {mon} {day} {time}"), "%Y %b %e %H:%M:%S").ok()?;
        Utc.from_local_datetime(&naive).single()
    }

    fn parse_line(&self, line: &str, source_file: &str, line_no: u64) -> Option<ParsedEvent> {
        let caps = SYSLOG_PREFIX.captures(line)?;
        let timestamp = Self::parse_timestamp(&caps["mon"], &caps["day"], &caps["time"])?;
        let host = caps["host"].to_string();
        let rest = caps["rest"].to_string();

        let mut event = ParsedEvent::new(timestamp, "linux_auth", source_file);
        event.source_line = Some(line_no);
        event.kind = EventKind::Event;
        event.message = Some(rest.clone());
        event.host = HostFacets { name: Some(host), ..Default::default() };

        if let Some(m) = SSH_FAILED.captures(&rest) {
            event.category = vec!["authentication".into()];
            event.event_type = vec!["start".into()];
            event.action = Some("ssh_login_failed".into());
            event.outcome = Some(EventOutcome::Failure);
            event.user = UserFacets { name: Some(m["user"].to_string()), ..Default::default() };
            event.network = NetworkFacets {
                source_ip: Some(m["ip"].to_string()),
                source_port: m["port"].parse().ok(),
                ..Default::default()
            };
        } else if let Some(m) = SSH_ACCEPTED.captures(&rest) {
            event.category = vec!["authentication".into()];
            event.event_type = vec!["start".into()];
            event.action = Some("ssh_login_succeeded".into());
            event.outcome = Some(EventOutcome::Success);
            event.user = UserFacets { name: Some(m["user"].to_string()), ..Default::default() };
            event.network = NetworkFacets {
                source_ip: Some(m["ip"].to_string()),
                source_port: m["port"].parse().ok(),
                ..Default::default()
            };
        } else if let Some(m) = SUDO_COMMAND.captures(&rest) {
            event.category = vec!["process".into()];
            event.event_type = vec!["start".into()];
            event.action = Some("sudo_command".into());
            event.user = UserFacets { name: Some(m["user"].to_string()), ..Default::default() };
            event.process.command_line = Some(m["cmd"].trim().to_string());
        } else {
            event.category = vec!["authentication".into()];
            event.action = Some("auth_log_entry".into());
        }

        Some(event)
    }
}

impl Parser for LinuxAuthParser {
    fn metadata(&self) -> ParserMetadata {
        ParserMetadata {
            name: "linux_auth",
            category: ParserCategory::Logs,
            description: "Linux /var/log/auth.log and secure syslog authentication records",
            supported_extensions: &[".log"],
            supported_mime_types: &["text/plain"],
            priority: 50,
        }
    }

    fn can_parse(&self, path: Option<&str>, head_bytes: Option<&[u8]>, _mime: Option<&str>) -> bool {
        let name_match = path
            .map(|p| {
                let lower = p.to_ascii_lowercase();
                lower.ends_with("auth.log") || lower.ends_with("secure")
            })
            .unwrap_or(false);
        let content_match = head_bytes
            .and_then(|b| std::str::from_utf8(b).ok())
            .map(|s| SYSLOG_PREFIX.is_match(s.lines().next().unwrap_or("")))
            .unwrap_or(false);
        name_match || content_match
    }

    fn parse(&self, source: &[u8], source_name: &str) -> Result<Vec<ParsedEvent>> {
        let text = String::from_utf8_lossy(source);
        let mut events = Vec::new();
        let mut failures = 0u32;
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if failures >= super::DEFAULT_FAILURE_CEILING {
                break;
            }
            match self.parse_line(line, source_name, idx as u64) {
                Some(event) => events.push(event),
                None => failures += 1,
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_failed_ssh_login() {
        let parser = LinuxAuthParser;
        let line = "Jan 15 10:30:00 web01 sshd[1234]: Failed password for invalid user admin from 203.0.113.5 port 52344 ssh2";
        let event = parser.parse_line(line, "auth.log", 0).unwrap();
        assert_eq!(event.action.as_deref(), Some("ssh_login_failed"));
        assert_eq!(event.outcome, Some(EventOutcome::Failure));
        assert_eq!(event.user.name.as_deref(), Some("admin"));
        assert_eq!(event.network.source_ip.as_deref(), Some("203.0.113.5"));
    }

    #[test]
    fn unparseable_line_does_not_abort_the_stream() {
        let parser = LinuxAuthParser;
        let body = "not a syslog line\nJan 15 10:30:00 web01 sshd[1]: Accepted password for bob from 10.0.0.1 port 22 ssh2\n";
        let events = parser.parse(body.as_bytes(), "auth.log").unwrap();
        assert_eq!(events.len(), 1);
    }
}
