//! Streaming endpoint URLs.

use sha2::{Digest, Sha256};
use studio_ipc::Channel;
use url::Url;

use crate::error::ApiError;
use crate::ApiResult;

/// URL of a base streaming channel of a studio, authenticated by `token`.
///
/// The meters channel lives on a per-session host; see [`meters_url`].
pub fn stream_url(api_host: &str, channel: Channel, server_id: &str, token: &str) -> ApiResult<Url> {
    let mut url = Url::parse(&format!("wss://{api_host}"))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(api_host.to_string()))?;
        segments.pop_if_empty().extend(["api", "servers", server_id]);
        match channel {
            Channel::Server => {}
            Channel::Subscriptions => {
                segments.push("subscriptions");
            }
            Channel::Devices => {
                segments.push("devices");
            }
            Channel::Meters => {
                return Err(ApiError::InvalidUrl(
                    "meters are served per session".to_string(),
                ))
            }
        }
    }
    url.query_pairs_mut().append_pair("auth_code", token);
    Ok(url)
}

/// URL of the meters channel of a live session.
pub fn meters_url(meters_domain: &str, server_id: &str, session_id: &str) -> ApiResult<Url> {
    let mut url = Url::parse(&format!("wss://{session_id}.{meters_domain}/meters"))?;
    url.query_pairs_mut()
        .append_pair("auth_code", &meters_auth_code(server_id, session_id));
    Ok(url)
}

/// Link that hands a studio over to the desktop client to join it.
pub fn join_url(server_id: &str) -> ApiResult<Url> {
    if server_id.is_empty() {
        return Err(ApiError::InvalidUrl("no studio to join".to_string()));
    }
    let mut url = Url::parse("jacktrip://join/")?;
    let original = url.to_string();
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl(original))?
        .pop_if_empty()
        .push(server_id);
    Ok(url)
}

/// Credential of the meters channel, derived from the studio and session.
pub fn meters_auth_code(server_id: &str, session_id: &str) -> String {
    let digest = Sha256::digest(format!("jktp-{server_id}-{session_id}").as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_urls() {
        let url = stream_url("app.example.org", Channel::Server, "srv1", "tok").unwrap();
        assert_eq!(url.as_str(), "wss://app.example.org/api/servers/srv1?auth_code=tok");

        let url = stream_url("app.example.org", Channel::Devices, "srv1", "tok").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://app.example.org/api/servers/srv1/devices?auth_code=tok"
        );

        assert!(stream_url("app.example.org", Channel::Meters, "srv1", "tok").is_err());
    }

    #[test]
    fn test_token_is_query_encoded() {
        let url = stream_url("app.example.org", Channel::Subscriptions, "srv1", "a b&c").unwrap();
        assert_eq!(url.query(), Some("auth_code=a+b%26c"));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("srv1").unwrap().as_str(), "jacktrip://join/srv1");
        assert_eq!(join_url("a/b").unwrap().as_str(), "jacktrip://join/a%2Fb");
        assert!(join_url("").is_err());
    }

    #[test]
    fn test_meters_auth_code() {
        assert_eq!(
            meters_auth_code("srv1", "s1"),
            "91dcd9ad25051728908f17132019e822f64761d3137d7da351372cd8ff3eb068"
        );
    }

    #[test]
    fn test_meters_url() {
        let url = meters_url("example.cloud", "srv1", "s1").unwrap();
        assert_eq!(url.host_str(), Some("s1.example.cloud"));
        assert_eq!(url.path(), "/meters");
        assert!(url
            .query()
            .unwrap()
            .ends_with("91dcd9ad25051728908f17132019e822f64761d3137d7da351372cd8ff3eb068"));
    }
}
