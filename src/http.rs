//! Transport primitives for the upstream credential call.
//!
//! The module exposes [`UpstreamTransport`] so tests and downstream crates can swap the HTTP
//! stack without touching the gateway's admission control or response classification. A
//! transport performs exactly one POST and hands back the raw status and body; everything
//! else (timeouts, status mapping, JSON parsing) belongs to [`crate::gateway::Gateway`].

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// self
use crate::{_prelude::*, error::UpstreamError};

/// Boxed future returned by [`UpstreamTransport::post_json`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<UpstreamResponse, UpstreamError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of POSTing a JSON body to the upstream.
///
/// Implementations must be `Send + Sync + 'static` so a single transport can back a gateway
/// shared by every request handler.
pub trait UpstreamTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `body` as JSON to `url` and returns the raw response.
	///
	/// Network-level failures map to [`UpstreamError::Transport`]; any HTTP response,
	/// successful or not, is returned as an [`UpstreamResponse`].
	fn post_json<'a>(&'a self, url: &'a Url, body: &'a serde_json::Value) -> TransportFuture<'a>;
}

/// Raw status + body captured from the upstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl UpstreamResponse {
	/// Builds a response from a status and body.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, body: body.into() }
	}

	/// Returns `true` for the statuses the upstream uses to signal a created account.
	pub fn is_success(&self) -> bool {
		matches!(self.status, 200 | 201)
	}

	/// Body decoded lossily as UTF-8 for logs.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Debug for ReqwestTransport {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestTransport(..)")
	}
}
#[cfg(feature = "reqwest")]
impl UpstreamTransport for ReqwestTransport {
	fn post_json<'a>(&'a self, url: &'a Url, body: &'a serde_json::Value) -> TransportFuture<'a> {
		Box::pin(async move {
			let response = self
				.0
				.post(url.clone())
				.json(body)
				.send()
				.await
				.map_err(UpstreamError::transport)?;
			let status = response.status().as_u16();
			let body = response.bytes().await.map_err(UpstreamError::transport)?;

			Ok(UpstreamResponse::new(status, body.to_vec()))
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn only_200_and_201_count_as_success() {
		assert!(UpstreamResponse::new(200, "{}").is_success());
		assert!(UpstreamResponse::new(201, "{}").is_success());
		assert!(!UpstreamResponse::new(204, "").is_success());
		assert!(!UpstreamResponse::new(500, "error").is_success());
	}

	#[test]
	fn body_text_is_lossy() {
		let response = UpstreamResponse::new(502, vec![b'b', b'a', b'd', 0xFF]);

		assert!(response.body_text().starts_with("bad"));
	}
}
