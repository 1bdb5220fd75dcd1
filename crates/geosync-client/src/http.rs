//! Shared request plumbing: URL building, status checks and body decoding.

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::ClientError;

/// Append percent-encoded path segments to `base`.
///
/// Segments are taken verbatim (a `/` inside a segment is encoded, not
/// treated as a separator). An empty trailing segment produces a trailing
/// slash.
pub(crate) fn join_segments<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
    endpoint: &str,
) -> Result<Url, ClientError> {
    let mut url = base.clone();
    {
        let mut path = url.path_segments_mut().map_err(|()| ClientError::Url {
            endpoint: endpoint.to_string(),
            base: base.to_string(),
        })?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}

/// Drop the last path segment: `https://h/geoserver/rest` -> `https://h/geoserver`.
pub(crate) fn parent_url(base: &Url) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().pop();
    }
    url
}

/// Turn a non-2xx response into [`ClientError::Api`].
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
    endpoint: &str,
) -> Result<reqwest::Response, ClientError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    Err(api_error(resp, endpoint).await)
}

/// Consume a response into [`ClientError::Api`], keeping the body for
/// diagnostics.
pub(crate) async fn api_error(resp: reqwest::Response, endpoint: &str) -> ClientError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    ClientError::Api {
        endpoint: endpoint.to_string(),
        status,
        body,
    }
}

/// Read the body and decode it as JSON.
///
/// Bodies are read as text first so that a shape mismatch reports as
/// [`ClientError::Decode`] rather than as a transport failure.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    endpoint: &str,
) -> Result<T, ClientError> {
    let text = resp.text().await.map_err(|e| ClientError::Http {
        endpoint: endpoint.to_string(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| ClientError::Decode {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_segments_encodes_each_segment() {
        let base = Url::parse("http://gs.local/geoserver/rest").unwrap();
        let url = join_segments(&base, ["workspaces", "HS-1", "zones parcels"], "t").unwrap();
        assert_eq!(
            url.as_str(),
            "http://gs.local/geoserver/rest/workspaces/HS-1/zones%20parcels"
        );
    }

    #[test]
    fn join_segments_handles_trailing_slash_base() {
        let base = Url::parse("http://gs.local/geoserver/rest/").unwrap();
        let url = join_segments(&base, ["workspaces"], "t").unwrap();
        assert_eq!(url.as_str(), "http://gs.local/geoserver/rest/workspaces");
    }

    #[test]
    fn join_segments_empty_last_segment_gives_trailing_slash() {
        let base = Url::parse("http://hs.local/hsapi").unwrap();
        let url = join_segments(&base, ["resource", "abc", "file_list", ""], "t").unwrap();
        assert_eq!(url.as_str(), "http://hs.local/hsapi/resource/abc/file_list/");
    }

    #[test]
    fn parent_url_drops_last_segment() {
        let base = Url::parse("http://gs.local/geoserver/rest").unwrap();
        assert_eq!(parent_url(&base).as_str(), "http://gs.local/geoserver");
        let hs = Url::parse("http://hs.local/hsapi/").unwrap();
        assert_eq!(parent_url(&hs).as_str(), "http://hs.local/");
    }
}
