use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::ioc::IocMatch;
use crate::models::IocType;

const CONTEXT_CHARS: usize = 50;

static FALSE_POSITIVE_DOMAINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["example.com", "example.org", "example.net", "localhost.localdomain", "test.com", "test.local", "schema.org", "w3.org", "microsoft.com", "google.com"]
        .into_iter()
        .collect()
});

static FALSE_POSITIVE_IPS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["0.0.0.0", "127.0.0.1", "255.255.255.255", "1.1.1.1", "8.8.8.8", "8.8.4.4"].into_iter().collect());

static VALID_TLDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "com", "org", "net", "edu", "gov", "mil", "int", "io", "co", "me", "info", "biz", "tv", "cc", "us", "uk", "ca", "au", "de", "fr", "jp", "cn", "ru",
        "br", "in", "eu", "xyz", "online", "site", "tech", "app", "dev",
    ]
    .into_iter()
    .collect()
});

static IPV4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b").unwrap());
static IPV6_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:[0-9a-fA-F]{1,4}:){2,7}[0-9a-fA-F]{1,4}\b|\b::1\b").unwrap());
static MD5_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-fA-F0-9]{32}\b").unwrap());
static SHA1_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-fA-F0-9]{40}\b").unwrap());
static SHA256_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-fA-F0-9]{64}\b").unwrap());
static SHA512_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-fA-F0-9]{128}\b").unwrap());
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b").unwrap());
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://(?:[-\w.]|(?:%[\da-fA-F]{2}))+(?::\d+)?(?:/[-\w./?%&=+#~!@$*,;:()]*)?").unwrap());
static DOMAIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}\b").unwrap());
static CVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCVE-\d{4}-\d{4,}\b").unwrap());
static MITRE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:T|TA)\d{4}(?:\.\d{3})?\b").unwrap());
static FILEPATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:[A-Za-z]:\\(?:[^\\/:*?"<>|\r\n]+\\)*[^\\/:*?"<>|\r\n]*)|(?:/(?:[^/\x00]+/)*[^/\x00]+)"#).unwrap());
static REGISTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:HKEY_(?:LOCAL_MACHINE|CURRENT_USER|CLASSES_ROOT|USERS|CURRENT_CONFIG)|HKLM|HKCU|HKCR|HKU|HKCC)\\\S+").unwrap());
static BITCOIN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:[13][a-km-zA-HJ-NP-Z1-9]{25,34}|bc1[ac-hj-np-z02-9]{11,71})\b").unwrap());

static REFANG_DOT_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\.\]|\[dot\]|\(\.\)").unwrap());
static REFANG_COLON_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[:\]").unwrap());
static REFANG_HXXP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)hxxp").unwrap());
static REFANG_AT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\[at\]|\[@\]|\(at\)").unwrap());

/// Restores common defanging conventions (`1.2.3[.]4`, `hxxp://`, `user[at]host`)
/// before extraction, per the analyst-notes convention the indicator model is
/// grounded on.
fn refang(text: &str) -> String {
    let text = REFANG_DOT_BRACKET.replace_all(text, ".");
    let text = REFANG_COLON_BRACKET.replace_all(&text, ":");
    let text = REFANG_HXXP.replace_all(&text, "http");
    let text = REFANG_AT.replace_all(&text, "@");
    text.into_owned()
}

fn normalize(value: &str, ioc_type: IocType) -> String {
    match ioc_type {
        IocType::Md5 | IocType::Sha1 | IocType::Sha256 | IocType::Sha512 | IocType::Domain | IocType::Url | IocType::Email => value.to_lowercase(),
        IocType::Cve | IocType::MitreTechnique => value.to_uppercase(),
        _ => value.to_string(),
    }
}

fn validate(value: &str, ioc_type: IocType) -> bool {
    match ioc_type {
        IocType::Domain => {
            let parts: Vec<&str> = value.split('.').collect();
            if parts.len() < 2 {
                return false;
            }
            let tld = parts.last().unwrap().to_lowercase();
            if !VALID_TLDS.contains(tld.as_str()) && tld.len() != 2 {
                return false;
            }
            !parts.iter().all(|p| p.chars().all(|c| c.is_ascii_digit()))
        }
        IocType::Filepath => value.len() >= 5,
        IocType::Ipv4 => value.split('.').filter_map(|p| p.parse::<u16>().ok()).filter(|&p| p <= 255).count() == 4,
        _ => true,
    }
}

fn is_false_positive(value: &str, ioc_type: IocType) -> bool {
    match ioc_type {
        IocType::Domain => FALSE_POSITIVE_DOMAINS.contains(value),
        IocType::Ipv4 => {
            if FALSE_POSITIVE_IPS.contains(value) {
                return true;
            }
            let parts: Vec<u16> = value.split('.').filter_map(|p| p.parse().ok()).collect();
            if parts.len() != 4 {
                return false;
            }
            parts[0] == 10 || (parts[0] == 172 && (16..=31).contains(&parts[1])) || (parts[0] == 192 && parts[1] == 168)
        }
        IocType::Md5 | IocType::Sha1 | IocType::Sha256 | IocType::Sha512 => {
            let lower = value.to_lowercase();
            lower == "0".repeat(value.len()) || lower == "f".repeat(value.len())
        }
        _ => false,
    }
}

const PATTERN_ORDER: &[(IocType, &Lazy<Regex>)] = &[
    (IocType::Ipv4, &IPV4_RE),
    (IocType::Ipv6, &IPV6_RE),
    (IocType::Md5, &MD5_RE),
    (IocType::Sha1, &SHA1_RE),
    (IocType::Sha256, &SHA256_RE),
    (IocType::Sha512, &SHA512_RE),
    (IocType::Email, &EMAIL_RE),
    (IocType::Url, &URL_RE),
    (IocType::Domain, &DOMAIN_RE),
    (IocType::Cve, &CVE_RE),
    (IocType::MitreTechnique, &MITRE_RE),
    (IocType::Filepath, &FILEPATH_RE),
    (IocType::RegistryKey, &REGISTRY_RE),
    (IocType::Bitcoin, &BITCOIN_RE),
];

/// Extracts and deduplicates indicators of compromise from free text (spec
/// §4.5): refangs defanged indicators, matches each pattern family in turn,
/// normalizes case per type, validates (domain TLDs, IPv4 octets, minimum
/// path length), and drops known false positives (private ranges, example.*
/// domains, all-zero/all-f hashes).
pub fn extract(text: &str) -> Vec<IocMatch> {
    let refanged = refang(text);
    let mut matches = Vec::new();
    let mut seen = HashSet::new();

    for (ioc_type, pattern) in PATTERN_ORDER {
        for m in pattern.find_iter(&refanged) {
            let normalized = normalize(m.as_str(), *ioc_type);
            let key = (normalized.clone(), *ioc_type);
            if seen.contains(&key) {
                continue;
            }
            if !validate(&normalized, *ioc_type) {
                continue;
            }
            if is_false_positive(&normalized, *ioc_type) {
                continue;
            }
            seen.insert(key);

            let ctx_start = m.start().saturating_sub(CONTEXT_CHARS);
            let ctx_end = (m.end() + CONTEXT_CHARS).min(refanged.len());
            matches.push(IocMatch {
                value: normalized,
                ioc_type: *ioc_type,
                start: m.start(),
                end: m.end(),
                context: refanged[ctx_start..ctx_end].to_string(),
            });
        }
    }

    matches.sort_by_key(|m| m.start);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ip_and_domain_from_mixed_text() {
        let matches = extract("beacon reached out to 45.33.12.9 and evil-domain.xyz over https://evil-domain.xyz/c2");
        let types: Vec<IocType> = matches.iter().map(|m| m.ioc_type).collect();
        assert!(types.contains(&IocType::Ipv4));
        assert!(types.contains(&IocType::Domain));
        assert!(types.contains(&IocType::Url));
    }

    #[test]
    fn refangs_defanged_indicators_before_matching() {
        let matches = extract("connection to 45[.]33[.]12[.]9 via hxxp://evil-domain[.]xyz");
        assert!(matches.iter().any(|m| m.ioc_type == IocType::Ipv4 && m.value == "45.33.12.9"));
    }

    #[test]
    fn filters_private_ips_and_example_domains() {
        let matches = extract("internal host 192.168.1.5 reached example.com");
        assert!(!matches.iter().any(|m| m.value == "192.168.1.5"));
        assert!(!matches.iter().any(|m| m.value == "example.com"));
    }

    #[test]
    fn deduplicates_repeated_indicators() {
        let matches = extract("8.8.8.9 talked to 8.8.8.9 again");
        assert_eq!(matches.iter().filter(|m| m.value == "8.8.8.9").count(), 1);
    }

    #[test]
    fn extracts_cve_and_mitre_technique_ids() {
        let matches = extract("exploited cve-2021-44228 matching technique T1059.001");
        assert!(matches.iter().any(|m| m.ioc_type == IocType::Cve && m.value == "CVE-2021-44228"));
        assert!(matches.iter().any(|m| m.ioc_type == IocType::MitreTechnique && m.value == "T1059.001"));
    }
}
