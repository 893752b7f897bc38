//! Client IP extraction from HTTP headers
//!
//! Anonymous visits are keyed by the caller's IP address, which behind a
//! reverse proxy lives in `X-Forwarded-For` rather than the socket peer
//! address. How many trailing hops of that chain to trust is configuration;
//! with zero trusted proxies the header is ignored entirely.

use axum::http::HeaderMap;
use std::net::IpAddr;

use crate::config::AnalyticsConfig;

/// Extract the client IP address for visit attribution.
///
/// Falls back to the socket peer address when the forwarding chain is
/// absent, unparsable, or not trusted.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: IpAddr,
    config: &AnalyticsConfig,
) -> IpAddr {
    if config.trusted_proxy_count == 0 {
        return socket_addr;
    }
    forwarded_client_ip(headers, config.trusted_proxy_count).unwrap_or(socket_addr)
}

/// Walk the `X-Forwarded-For` chain right to left past the trusted hops.
///
/// Each trusted proxy appends one entry, so the client is the entry just
/// before the trailing `trusted` ones. Shorter chains fall back to the
/// leftmost entry.
fn forwarded_client_ip(headers: &HeaderMap, trusted: usize) -> Option<IpAddr> {
    let chain = headers.get("x-forwarded-for")?.to_str().ok()?;

    let ips: Vec<IpAddr> = chain
        .split(',')
        .filter_map(|part| part.trim().parse::<IpAddr>().ok())
        .collect();

    if ips.is_empty() {
        return None;
    }

    if ips.len() > trusted {
        Some(ips[ips.len() - trusted - 1])
    } else {
        ips.first().copied()
    }
}
