//! Loop-guard header recognizing the relay's own internal calls.

// crates.io
use oauth2::http::{
	HeaderMap, HeaderValue,
	header::{AUTHORIZATION, HeaderName},
};

/// Marker attached to internal calls the pipeline makes against the local server.
///
/// A request carrying the marker is never snapshotted, pre-checked, or relayed, which keeps
/// the pipeline from re-entering itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoopGuard;
impl LoopGuard {
	/// Header name carrying the marker.
	pub const HEADER: &str = "X-Sync-Hint";
	/// Sentinel value of [`LoopGuard::HEADER`].
	pub const SENTINEL: &str = "NO-REMOTE-SAVE";

	/// Returns `true` when any value of the guard header equals the sentinel, ignoring case.
	pub fn should_skip(headers: &HeaderMap) -> bool {
		headers.get_all(Self::HEADER).iter().any(|value| {
			value.to_str().map(|value| value.trim().eq_ignore_ascii_case(Self::SENTINEL)).unwrap_or(false)
		})
	}

	/// Adds the marker to `headers`, replacing any previous guard value.
	pub fn inject(headers: &mut HeaderMap) {
		headers.insert(
			HeaderName::from_static("x-sync-hint"),
			HeaderValue::from_static(Self::SENTINEL),
		);
	}

	/// Headers for an internal call: the marker plus the caller's `Authorization`, if any.
	pub fn guarded_headers(authorization: Option<&str>) -> HeaderMap {
		let mut headers = HeaderMap::new();

		Self::inject(&mut headers);

		if let Some(value) = authorization.and_then(|value| HeaderValue::from_str(value).ok()) {
			headers.insert(AUTHORIZATION, value);
		}

		headers
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn sentinel_matches_case_insensitively() {
		let mut headers = HeaderMap::new();

		assert!(!LoopGuard::should_skip(&headers));

		headers.insert("x-sync-hint", HeaderValue::from_static("no-remote-save"));

		assert!(LoopGuard::should_skip(&headers));

		headers.insert("x-sync-hint", HeaderValue::from_static("something-else"));

		assert!(!LoopGuard::should_skip(&headers));
	}

	#[test]
	fn any_header_value_can_carry_the_sentinel() {
		let mut headers = HeaderMap::new();

		headers.append("x-sync-hint", HeaderValue::from_static("other"));
		headers.append("x-sync-hint", HeaderValue::from_static("NO-REMOTE-SAVE"));

		assert!(LoopGuard::should_skip(&headers));
	}

	#[test]
	fn guarded_headers_carry_marker_and_authorization() {
		let headers = LoopGuard::guarded_headers(Some("Bearer caller"));

		assert!(LoopGuard::should_skip(&headers));
		assert_eq!(
			headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
			Some("Bearer caller")
		);
		assert!(LoopGuard::guarded_headers(None).get(AUTHORIZATION).is_none());
	}
}
