//! Public address resolution
//!
//! Cloud hosts expose their public IPv4 on a link-local metadata endpoint.
//! Anywhere else the first non-loopback interface address is the best
//! guess.

use nix::ifaddrs::getifaddrs;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Instance metadata path returning the public IPv4 as plain text
pub const METADATA_URL: &str = "http://169.254.169.254/latest/meta-data/public-ipv4";

pub const METADATA_TIMEOUT: Duration = Duration::from_millis(800);

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("Metadata request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Metadata returned {0:?}, not an IPv4 address")]
    Malformed(String),
}

/// Resolve the address players should connect to, if any
pub async fn resolve_public_address(http: reqwest::Client) -> Option<Ipv4Addr> {
    match metadata_address(&http, METADATA_URL).await {
        Ok(addr) => {
            info!(addr = %addr, source = "metadata", "Resolved public address");
            return Some(addr);
        }
        Err(e) => debug!(error = %e, "Metadata endpoint unavailable, using local interfaces"),
    }

    let local = local_ipv4();
    match local {
        Some(addr) => info!(addr = %addr, source = "interface", "Resolved public address"),
        None => warn!("No usable IPv4 address found"),
    }
    local
}

/// Query a metadata endpoint for a plain-text IPv4 address
pub async fn metadata_address(http: &reqwest::Client, url: &str) -> Result<Ipv4Addr, AddressError> {
    let body = http
        .get(url)
        .timeout(METADATA_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let body = body.trim();
    body.parse()
        .map_err(|_| AddressError::Malformed(body.to_string()))
}

/// First IPv4 address of a local interface that is not loopback
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let interfaces = match getifaddrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!(error = %e, "Failed to enumerate network interfaces");
            return None;
        }
    };

    first_routable(interfaces.filter_map(|ifa| {
        ifa.address
            .as_ref()
            .and_then(|addr| addr.as_sockaddr_in())
            .map(|sin| sin.ip())
    }))
}

fn first_routable(candidates: impl IntoIterator<Item = Ipv4Addr>) -> Option<Ipv4Addr> {
    candidates
        .into_iter()
        .find(|ip| !ip.is_loopback() && !ip.is_unspecified())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/latest/meta-data/public-ipv4", listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        url
    }

    #[test]
    fn loopback_is_skipped() {
        let picked = first_routable([
            Ipv4Addr::LOCALHOST,
            Ipv4Addr::UNSPECIFIED,
            Ipv4Addr::new(10, 0, 3, 7),
            Ipv4Addr::new(192, 168, 1, 2),
        ]);
        assert_eq!(picked, Some(Ipv4Addr::new(10, 0, 3, 7)));
        assert_eq!(first_routable([Ipv4Addr::LOCALHOST]), None);
    }

    #[tokio::test]
    async fn metadata_body_is_trimmed() {
        let url = serve_once("203.0.113.7\n").await;
        let addr = metadata_address(&reqwest::Client::new(), &url).await.unwrap();
        assert_eq!(addr, Ipv4Addr::new(203, 0, 113, 7));
    }

    #[tokio::test]
    async fn metadata_garbage_is_rejected() {
        let url = serve_once("<html>not here</html>").await;
        let result = metadata_address(&reqwest::Client::new(), &url).await;
        assert!(matches!(result, Err(AddressError::Malformed(_))));
    }

    #[tokio::test]
    async fn metadata_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let result = metadata_address(&reqwest::Client::new(), &url).await;
        assert!(matches!(result, Err(AddressError::Http(_))));
    }
}
