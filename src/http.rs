//! Token-endpoint transport.
//!
//! The OAuth facade asks a [`TokenHttpClient`] for one `oauth2` client handle per token
//! request. The handle writes the response status and the throttling hint into a
//! [`ResponseMetadataSlot`], which the error mappers read after a failed request. The
//! provider's Auth0 tenant throttles with `429` and either `Retry-After` or
//! `X-RateLimit-Reset` (UNIX seconds); [`ResponseMetadata::from_response`] honors both.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError,
	http::{
		HeaderMap, StatusCode,
		header::{AsHeaderName, RETRY_AFTER},
	},
};
#[cfg(feature = "reqwest")] use oauth2::{HttpRequest, HttpResponse};
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Transport the token requests go through.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Error emitted by the underlying HTTP stack.
	type TransportError: 'static + Send + Sync + StdError;

	/// Per-request handle; its futures must be `Send` so flows can box them.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle that clears `slot` before sending and fills it once a response arrives.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Status and throttling hint of the last token-endpoint response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: Option<u16>,
	/// How long to wait before retrying.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Reads the metadata of a response received at `now`.
	///
	/// `Retry-After` (delta seconds or HTTP date) wins over `X-RateLimit-Reset`. Hints that
	/// point at the past are dropped.
	pub fn from_response(status: StatusCode, headers: &HeaderMap, now: OffsetDateTime) -> Self {
		Self { status: Some(status.as_u16()), retry_after: retry_after(headers, now) }
	}
}

/// Hand-off point between a transport handle and the error mapper.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Replaces the recorded metadata.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Removes and returns the recorded metadata.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Default reqwest transport, also handed to the downstream energy client.
///
/// Custom clients should disable redirect following; the token endpoint answers directly.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ReqwestHandle { client: self.0.clone(), slot }
	}
}

/// Per-request handle handed out by [`ReqwestHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let response = self
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().clone();

			self.slot.store(ResponseMetadata::from_response(
				status,
				&headers,
				OffsetDateTime::now_utc(),
			));

			let mut mapped = HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*mapped.status_mut() = status;
			*mapped.headers_mut() = headers;

			Ok(mapped)
		})
	}
}

fn retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let delay = match header_str(headers, RETRY_AFTER) {
		Some(raw) => match raw.parse::<u32>() {
			Ok(secs) => return Some(Duration::seconds(secs.into())),
			Err(_) => OffsetDateTime::parse(raw, &Rfc2822).ok()? - now,
		},
		None => {
			let reset = header_str(headers, RATE_LIMIT_RESET)?.parse::<i64>().ok()?;

			OffsetDateTime::from_unix_timestamp(reset).ok()? - now
		},
	};

	delay.is_positive().then_some(delay)
}

fn header_str(headers: &HeaderMap, name: impl AsHeaderName) -> Option<&str> {
	headers.get(name)?.to_str().ok().map(str::trim)
}
