//! URL utilities for consistent URL handling
//!
//! Both the request/response base and the real-time base are user supplied,
//! so trailing and leading slashes are normalized before joining.

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use jarvis_client::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/api"), "http://localhost:8000/api");
/// assert_eq!(normalize_base_url("http://localhost:8000/api/"), "http://localhost:8000/api");
/// assert_eq!(normalize_base_url("http://localhost:8000/api///"), "http://localhost:8000/api");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Construct a complete endpoint URL from a base URL and a path
///
/// # Examples
///
/// ```
/// use jarvis_client::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:8000/api", "/jarvis/chat"),
///     "http://localhost:8000/api/jarvis/chat"
/// );
/// assert_eq!(
///     construct_api_url("http://localhost:8000/api/", "health"),
///     "http://localhost:8000/api/health"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Address of a named real-time channel: `{realtime-base}/{channel id}`.
///
/// Channel ids may contain slashes (`agent/42`); they are kept verbatim.
pub fn channel_url(realtime_base: &str, channel_id: &str) -> String {
    construct_api_url(realtime_base, channel_id)
}
