//! Outbound URL guard: only public http(s) hosts, checked literally and after DNS.

use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use url::{Host, Url};

use super::FetchError;

const DNS_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves host names for the guard; tests substitute fixed answers.
#[allow(async_fn_in_trait)]
pub trait DnsResolver {
    async fn lookup(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, FetchError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDnsResolver;

impl DnsResolver for TokioDnsResolver {
    async fn lookup(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, FetchError> {
        let addrs = tokio::time::timeout(
            DNS_LOOKUP_TIMEOUT,
            tokio::net::lookup_host((host, port)),
        )
        .await
        .map_err(|_| FetchError::DnsResolution("lookup timed out".to_string()))?
        .map_err(|e| FetchError::DnsResolution(e.to_string()))?;
        Ok(addrs.map(|a| a.ip()).collect())
    }
}

/// Parse and vet `raw`, resolving domain names through `resolver`.
pub(super) async fn guard_url(raw: &str, resolver: &impl DnsResolver) -> Result<Url, FetchError> {
    let url = parse_public_url(raw)?;
    if let Some(Host::Domain(domain)) = url.host() {
        let port = url.port_or_known_default().unwrap_or(80);
        for ip in resolver.lookup(domain, port).await? {
            if is_internal_ip(ip) {
                return Err(FetchError::InternalHost);
            }
        }
    }
    Ok(url)
}

/// Scheme and literal-host checks only; no network access.
pub(super) fn parse_public_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidScheme);
    }
    let internal = match url.host() {
        None => true,
        Some(Host::Ipv4(v4)) => is_internal_ip(IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => is_internal_ip(IpAddr::V6(v6)),
        Some(Host::Domain(domain)) => is_internal_domain(domain),
    };
    if internal {
        return Err(FetchError::InternalHost);
    }
    Ok(url)
}

fn is_internal_domain(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    domain == "localhost"
        || [".localhost", ".local", ".internal", ".arpa"]
            .iter()
            .any(|suffix| domain.ends_with(suffix))
}

fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || is_v6_link_local(&v6)
                || is_v6_unique_local(&v6)
                || v6.to_ipv4_mapped().is_some_and(is_internal_v4)
        }
    }
}

fn is_internal_v4(v4: Ipv4Addr) -> bool {
    let [first, second, ..] = v4.octets();
    v4.is_loopback()
        || v4.is_private()
        || v4.is_link_local()
        || v4.is_unspecified()
        || v4.is_broadcast()
        || first == 0
        // carrier-grade NAT, 100.64.0.0/10
        || (first == 100 && (64..=127).contains(&second))
}

fn is_v6_link_local(v6: &Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xffc0) == 0xfe80
}

fn is_v6_unique_local(v6: &Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xfe00) == 0xfc00
}

/// Drop `user:password@` before a URL reaches the logs.
pub(super) fn redact_credentials(raw: &str) -> Cow<'_, str> {
    if !raw.contains('@') {
        return Cow::Borrowed(raw);
    }
    match Url::parse(raw) {
        Ok(mut url) if !url.username().is_empty() || url.password().is_some() => {
            let _ = url.set_username("");
            let _ = url.set_password(None);
            Cow::Owned(url.to_string())
        }
        _ => Cow::Borrowed(raw),
    }
}
