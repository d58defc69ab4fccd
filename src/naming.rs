//! Pure name-minting functions. No I/O, no fallible parsing beyond what the
//! inputs themselves require.

/// Strips a leading `mlab-` from a GCP project id, leaving the rest untouched.
fn strip_mlab_prefix(project: &str) -> &str {
    project.strip_prefix("mlab-").unwrap_or(project)
}

/// `"autojoin-" + strip(project) + "-measurement-lab-org"`
pub fn project_zone(project: &str) -> String {
    format!("autojoin-{}-measurement-lab-org", strip_mlab_prefix(project))
}

/// `"autojoin-" + org + "-" + strip(project) + "-measurement-lab-org"`
pub fn org_zone(org: &str, project: &str) -> String {
    format!(
        "autojoin-{}-{}-measurement-lab-org",
        org,
        strip_mlab_prefix(project)
    )
}

/// `org + "." + strip(project) + ".measurement-lab.org."` (trailing dot mandatory).
pub fn org_dns(org: &str, project: &str) -> String {
    format!("{}.{}.measurement-lab.org.", org, strip_mlab_prefix(project))
}

/// `service + "-" + site + "-" + machine + "." + org + "." + strip(project) + ".measurement-lab.org"`
pub fn hostname(service: &str, site: &str, machine: &str, org: &str, project: &str) -> String {
    format!(
        "{}-{}-{}.{}.{}.measurement-lab.org",
        service,
        site,
        machine,
        org,
        strip_mlab_prefix(project)
    )
}

/// `iata + decimal(asn)`
pub fn site(iata: &str, asn: u32) -> String {
    format!("{}{}", iata, asn)
}

/// Lowercase hex of the four bytes of an IPv4 address, e.g. `192.168.0.1 -> "c0a80001"`.
pub fn machine(ipv4: std::net::Ipv4Addr) -> String {
    let [a, b, c, d] = ipv4.octets();
    format!("{:02x}{:02x}{:02x}{:02x}", a, b, c, d)
}

/// The parsed components of a hostname minted by [`hostname`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostnameParts {
    pub service: String,
    pub site: String,
    pub machine: String,
    pub org: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HostnameParseError {
    #[error("hostname {0:?} does not have the expected service-site-machine.org.rest shape")]
    Malformed(String),
}

/// Inverse of [`hostname`] restricted to the parts the tracker/GC need: service,
/// site, machine and org. The project suffix is discarded since the GC only
/// needs enough to rebuild the org zone name, which the caller supplies
/// separately.
pub fn parse_hostname(hostname: &str) -> Result<HostnameParts, HostnameParseError> {
    let mut label_and_rest = hostname.splitn(2, '.');
    let first_label = label_and_rest
        .next()
        .ok_or_else(|| HostnameParseError::Malformed(hostname.to_string()))?;
    let rest = label_and_rest
        .next()
        .ok_or_else(|| HostnameParseError::Malformed(hostname.to_string()))?;

    let mut parts = first_label.splitn(3, '-');
    let service = parts
        .next()
        .ok_or_else(|| HostnameParseError::Malformed(hostname.to_string()))?;
    let site = parts
        .next()
        .ok_or_else(|| HostnameParseError::Malformed(hostname.to_string()))?;
    let machine = parts
        .next()
        .ok_or_else(|| HostnameParseError::Malformed(hostname.to_string()))?;

    let org = rest
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HostnameParseError::Malformed(hostname.to_string()))?;

    if service.is_empty() || site.is_empty() || machine.is_empty() {
        return Err(HostnameParseError::Malformed(hostname.to_string()));
    }

    Ok(HostnameParts {
        service: service.to_string(),
        site: site.to_string(),
        machine: machine.to_string(),
        org: org.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn mints_fresh_registration_hostname() {
        let site = site("lga", 12345);
        let machine = machine(Ipv4Addr::new(192, 168, 0, 1));
        let host = hostname("ndt", &site, &machine, "bar", "mlab-sandbox");
        assert_eq!(host, "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org");
    }

    #[test]
    fn machine_is_lowercase_hex_of_octets() {
        assert_eq!(machine(Ipv4Addr::new(192, 168, 0, 1)), "c0a80001");
        assert_eq!(machine(Ipv4Addr::new(0, 0, 0, 0)), "00000000");
        assert_eq!(machine(Ipv4Addr::new(255, 255, 255, 255)), "ffffffff");
    }

    #[test]
    fn zones_strip_mlab_prefix() {
        assert_eq!(project_zone("mlab-sandbox"), "autojoin-sandbox-measurement-lab-org");
        assert_eq!(project_zone("sandbox"), "autojoin-sandbox-measurement-lab-org");
        assert_eq!(org_zone("bar", "mlab-sandbox"), "autojoin-bar-sandbox-measurement-lab-org");
        assert_eq!(org_dns("bar", "mlab-sandbox"), "bar.sandbox.measurement-lab.org.");
    }

    #[test]
    fn parses_minted_hostname_back_into_parts() {
        let host = "ndt-lga12345-c0a80001.bar.sandbox.measurement-lab.org";
        let parts = parse_hostname(host).unwrap();
        assert_eq!(parts.service, "ndt");
        assert_eq!(parts.site, "lga12345");
        assert_eq!(parts.machine, "c0a80001");
        assert_eq!(parts.org, "bar");
    }

    #[test]
    fn rejects_malformed_hostnames() {
        assert!(parse_hostname("not-a-hostname").is_err());
        assert!(parse_hostname("ndt-lga12345.bar.sandbox.measurement-lab.org").is_err());
    }
}
