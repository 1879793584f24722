mod shellwords;

use sha2::{Digest, Sha256};
use std::net::IpAddr;

use crate::models::ecs::ECS_VERSION;
use crate::models::event::ParsedEvent;
use crate::models::EcsDocument;

/// Internal namespace for fields the pipeline needs for replay/debugging
/// but that aren't part of the ECS contract proper (spec §4.2).
const INTERNAL_NAMESPACE: &str = "_pipeline";

#[derive(Debug, Clone)]
pub struct NormalizeWarning(pub String);

#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub document: EcsDocument,
    pub warnings: Vec<NormalizeWarning>,
}

/// Turns a `ParsedEvent` into a search-ready ECS document (spec §4.2).
/// Pure function of its input — two normalizations of the same event
/// produce byte-identical documents (spec §8 universal invariant).
pub fn normalize(event: &ParsedEvent) -> NormalizeOutcome {
    let mut warnings = Vec::new();
    let mut fields = serde_json::Map::new();

    fields.insert("@timestamp".into(), serde_json::json!(event.timestamp.to_rfc3339()));
    fields.insert("ecs".into(), serde_json::json!({"version": ECS_VERSION}));
    fields.insert("event".into(), build_event_fields(event, &mut warnings));

    if let Some(message) = &event.message {
        fields.insert("message".into(), serde_json::json!(message));
    }

    if let Some(host) = build_host_fields(event) {
        fields.insert("host".into(), host);
    }
    if let Some(user) = build_user_fields(event) {
        fields.insert("user".into(), user);
    }
    if let Some(process) = build_process_fields(event) {
        fields.insert("process".into(), process);
    }
    if let Some(file) = build_file_fields(event) {
        fields.insert("file".into(), file);
    }
    let (source, destination, network) = build_network_fields(event);
    if let Some(v) = source {
        fields.insert("source".into(), v);
    }
    if let Some(v) = destination {
        fields.insert("destination".into(), v);
    }
    if let Some(v) = network {
        fields.insert("network".into(), v);
    }
    if let Some(url) = build_url_fields(event) {
        fields.insert("url".into(), url);
    }
    if !event.labels.is_empty() {
        fields.insert("labels".into(), serde_json::json!(event.labels));
    }
    if !event.tags.is_empty() {
        fields.insert("tags".into(), serde_json::json!(event.tags));
    }
    fields.insert(
        INTERNAL_NAMESPACE.into(),
        serde_json::json!({
            "source_type": event.source_type,
            "source_file": event.source_file,
            "indexed_at": chrono::Utc::now().to_rfc3339(),
        }),
    );

    if event.category.is_empty() {
        warnings.push(NormalizeWarning("missing event.category".into()));
    }

    let id = generate_doc_id(event);
    NormalizeOutcome { document: EcsDocument { id, fields }, warnings }
}

fn build_event_fields(event: &ParsedEvent, warnings: &mut Vec<NormalizeWarning>) -> serde_json::Value {
    let kind = serde_json::to_value(event.kind).unwrap();
    let category = if event.category.is_empty() { vec!["process".to_string()] } else { event.category.clone() };
    let event_type = if event.event_type.is_empty() { vec!["info".to_string()] } else { event.event_type.clone() };

    let mut obj = serde_json::json!({
        "kind": kind,
        "category": category,
        "type": event_type,
        "original": event.message.clone().unwrap_or_default(),
        "created": chrono::Utc::now().to_rfc3339(),
    });
    if let Some(action) = &event.action {
        obj["action"] = serde_json::json!(action);
    }
    if let Some(outcome) = event.outcome {
        obj["outcome"] = serde_json::to_value(outcome).unwrap();
    }
    if let Some(severity) = event.severity {
        obj["severity"] = serde_json::json!(severity);
    }
    if event.message.is_none() {
        warnings.push(NormalizeWarning("missing message".into()));
    }
    obj
}

fn build_host_fields(event: &ParsedEvent) -> Option<serde_json::Value> {
    let h = &event.host;
    if h.name.is_none() && h.ips.is_empty() && h.macs.is_empty() {
        return None;
    }
    let ips: Vec<&String> = h.ips.iter().filter(|ip| validate_ip(ip)).collect();
    let macs: Vec<String> = h.macs.iter().map(|m| normalize_mac(m)).collect();
    let mut obj = serde_json::json!({});
    if let Some(name) = &h.name {
        obj["name"] = serde_json::json!(name);
    }
    if !ips.is_empty() {
        obj["ip"] = serde_json::json!(ips);
    }
    if !macs.is_empty() {
        obj["mac"] = serde_json::json!(macs);
    }
    if let Some(os) = &h.os_name {
        obj["os"] = serde_json::json!({"name": os, "version": h.os_version});
    }
    Some(obj)
}

fn build_user_fields(event: &ParsedEvent) -> Option<serde_json::Value> {
    let u = &event.user;
    if u.name.is_none() && u.domain.is_none() && u.id.is_none() {
        return None;
    }
    Some(serde_json::json!({"name": u.name, "domain": u.domain, "id": u.id}))
}

fn build_process_fields(event: &ParsedEvent) -> Option<serde_json::Value> {
    let p = &event.process;
    if p.name.is_none() && p.pid.is_none() && p.command_line.is_none() {
        return None;
    }
    let args = p.command_line.as_deref().map(shellwords::split);
    Some(serde_json::json!({
        "name": p.name,
        "pid": p.pid,
        "parent": {"pid": p.ppid},
        "executable": p.executable,
        "command_line": p.command_line,
        "args": args,
    }))
}

fn build_file_fields(event: &ParsedEvent) -> Option<serde_json::Value> {
    let f = &event.file;
    if f.name.is_none() && f.path.is_none() && f.sha256.is_none() && f.sha1.is_none() && f.md5.is_none() {
        return None;
    }
    let hash = [&f.sha256, &f.sha1, &f.md5]
        .iter()
        .find_map(|h| h.as_ref())
        .map(|h| detect_hash_type(h).map(|t| (t, h.to_lowercase())));
    let mut obj = serde_json::json!({"name": f.name, "path": f.path});
    if let Some(Some((hash_type, hash_value))) = hash {
        obj["hash"] = serde_json::json!({hash_type: hash_value});
    }
    Some(obj)
}

fn build_network_fields(
    event: &ParsedEvent,
) -> (Option<serde_json::Value>, Option<serde_json::Value>, Option<serde_json::Value>) {
    let n = &event.network;
    let source = if n.source_ip.is_some() || n.source_port.is_some() {
        Some(serde_json::json!({"ip": n.source_ip, "port": n.source_port}))
    } else {
        None
    };
    let destination = if n.destination_ip.is_some() || n.destination_port.is_some() {
        Some(serde_json::json!({"ip": n.destination_ip, "port": n.destination_port}))
    } else {
        None
    };
    let network = if n.protocol.is_some() || n.direction.is_some() {
        Some(serde_json::json!({"protocol": n.protocol, "direction": n.direction}))
    } else {
        None
    };
    (source, destination, network)
}

fn build_url_fields(event: &ParsedEvent) -> Option<serde_json::Value> {
    let full = event.url.full.as_ref()?;
    let (scheme, domain, port, path, query) = parse_url_components(full);
    Some(serde_json::json!({
        "full": full,
        "scheme": scheme,
        "domain": domain,
        "port": port,
        "path": path,
        "query": query,
    }))
}

fn validate_ip(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok()
}

fn normalize_mac(value: &str) -> String {
    value
        .split([':', '-'])
        .map(|octet| octet.to_lowercase())
        .collect::<Vec<_>>()
        .join(":")
}

/// Detects hash type by hex length (spec §4.2: 32=md5, 40=sha1,
/// 64=sha256, 128=sha512).
fn detect_hash_type(hex: &str) -> Option<&'static str> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        32 => Some("md5"),
        40 => Some("sha1"),
        64 => Some("sha256"),
        128 => Some("sha512"),
        _ => None,
    }
}

fn parse_url_components(full: &str) -> (Option<String>, Option<String>, Option<u16>, Option<String>, Option<String>) {
    let Some((scheme, rest)) = full.split_once("://") else {
        return (None, None, None, None, None);
    };
    let (authority, path_and_query) = rest.split_once('/').map(|(a, b)| (a, format!("/{b}"))).unwrap_or((rest, String::new()));
    let (domain, port) = match authority.split_once(':') {
        Some((d, p)) => (d.to_string(), p.parse().ok()),
        None => (authority.to_string(), None),
    };
    let (path, query) = match path_and_query.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (path_and_query, None),
    };
    (Some(scheme.to_string()), Some(domain), port, Some(path).filter(|p| !p.is_empty()), query)
}

/// `sha256(timestamp_iso | source_type | source_file | source_line | message)[:20]`
/// (spec §3). Guarantees duplicate suppression on replay.
fn generate_doc_id(event: &ParsedEvent) -> String {
    let key = format!(
        "{}|{}|{}|{}|{}",
        event.timestamp.to_rfc3339(),
        event.source_type,
        event.source_file,
        event.source_line.unwrap_or(0),
        event.message.as_deref().unwrap_or(""),
    );
    let digest = Sha256::digest(key.as_bytes());
    format!("{digest:x}")[..20].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::{EventKind, EventOutcome, UserFacets};
    use crate::models::ParsedEvent;

    fn sample_event() -> ParsedEvent {
        let mut event = ParsedEvent::new(chrono::Utc::now(), "windows_evtx", "security.evtx");
        event.kind = EventKind::Event;
        event.category = vec!["authentication".into()];
        event.action = Some("user_logon".into());
        event.outcome = Some(EventOutcome::Success);
        event.user = UserFacets { name: Some("jsmith".into()), domain: Some("CORP".into()), id: None };
        event
    }

    #[test]
    fn normalization_is_deterministic() {
        let event = sample_event();
        let a = normalize(&event);
        let b = normalize(&event);
        assert_eq!(a.document.id, b.document.id);
        assert_eq!(serde_json::to_string(&a.document.fields).unwrap(), serde_json::to_string(&b.document.fields).unwrap());
    }

    #[test]
    fn hash_type_detected_by_length() {
        assert_eq!(detect_hash_type(&"a".repeat(32)), Some("md5"));
        assert_eq!(detect_hash_type(&"a".repeat(40)), Some("sha1"));
        assert_eq!(detect_hash_type(&"a".repeat(64)), Some("sha256"));
        assert_eq!(detect_hash_type(&"a".repeat(128)), Some("sha512"));
        assert_eq!(detect_hash_type("not-hex"), None);
    }

    #[test]
    fn mac_address_lowercased_and_colon_joined() {
        assert_eq!(normalize_mac("AA-BB-CC-DD-EE-FF"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn url_components_derived_from_full_url() {
        let (scheme, domain, port, path, query) = parse_url_components("https://bad.example.com:8443/x?y=1");
        assert_eq!(scheme.as_deref(), Some("https"));
        assert_eq!(domain.as_deref(), Some("bad.example.com"));
        assert_eq!(port, Some(8443));
        assert_eq!(path.as_deref(), Some("/x"));
        assert_eq!(query.as_deref(), Some("y=1"));
    }

    #[test]
    fn missing_category_produces_warning_not_rejection() {
        let mut event = sample_event();
        event.category = vec![];
        let outcome = normalize(&event);
        assert!(outcome.warnings.iter().any(|w| w.0.contains("category")));
    }
}
