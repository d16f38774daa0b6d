//! Per-call request description and its translation into an HTTP request.

// crates.io
use oauth2::{
	HttpRequest,
	http::{
		HeaderName,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
	},
};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*, auth::TokenSecret, config::Endpoints, error::ConfigError, obs::CallKind,
};

/// Media type used for JSON request and response documents.
pub const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";
const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// Where a request is sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
	/// Path appended to the configured base URL.
	Path(String),
	/// Absolute URL used verbatim.
	Url(Url),
}
impl Target {
	/// Resolves the target against `endpoints`.
	pub fn resolve(&self, endpoints: &Endpoints) -> Result<Url, ConfigError> {
		match self {
			Self::Path(path) => endpoints.resolve(path),
			Self::Url(url) => Ok(url.clone()),
		}
	}
}
impl From<&str> for Target {
	fn from(path: &str) -> Self {
		Self::Path(path.to_owned())
	}
}
impl From<String> for Target {
	fn from(path: String) -> Self {
		Self::Path(path)
	}
}
impl From<Url> for Target {
	fn from(url: Url) -> Self {
		Self::Url(url)
	}
}

/// Payload attached to a request.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
	/// No body.
	#[default]
	Empty,
	/// JSON document sent as [`JSON_API_MEDIA_TYPE`].
	Json(serde_json::Value),
	/// URL-encoded form fields, in order.
	Form(Vec<(String, String)>),
	/// Pre-encoded bytes with an explicit media type.
	Raw {
		/// `Content-Type` header value.
		content_type: HeaderValue,
		/// Encoded payload.
		bytes: Vec<u8>,
	},
}

/// Transport options supplied by the caller.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Extra headers; the pipeline's `Authorization` and `User-Agent` take precedence.
	pub headers: HeaderMap,
	/// Query parameters appended to the resolved URL.
	pub query: Vec<(String, String)>,
	/// Request payload.
	pub body: RequestBody,
}
impl RequestOptions {
	/// Adds a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);

		self
	}

	/// Adds a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets a JSON body.
	pub fn with_json(mut self, body: serde_json::Value) -> Self {
		self.body = RequestBody::Json(body);

		self
	}

	/// Sets a URL-encoded form body.
	pub fn with_form<K, V>(mut self, fields: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		self.body =
			RequestBody::Form(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect());

		self
	}

	/// Sets a pre-encoded body.
	pub fn with_raw(mut self, content_type: HeaderValue, bytes: impl Into<Vec<u8>>) -> Self {
		self.body = RequestBody::Raw { content_type, bytes: bytes.into() };

		self
	}
}

/// Everything needed to issue one logical call; rebuilt into a fresh [`HttpRequest`] per
/// attempt.
#[derive(Clone, Debug)]
pub struct RequestContext {
	/// HTTP method.
	pub method: Method,
	/// Destination.
	pub target: Target,
	/// Token refresh calls skip the bearer header and the quota throttle.
	pub kind: CallKind,
	/// Caller-supplied options.
	pub options: RequestOptions,
}
impl RequestContext {
	/// Creates a resource call context.
	pub fn new(method: Method, target: impl Into<Target>, options: RequestOptions) -> Self {
		Self { method, target: target.into(), kind: CallKind::Resource, options }
	}

	/// Creates the context for the refresh-token exchange.
	pub fn token_refresh(token_url: Url, form: &[(&str, &str)]) -> Self {
		Self {
			method: Method::POST,
			target: Target::Url(token_url),
			kind: CallKind::TokenRefresh,
			options: RequestOptions::default().with_form(form.iter().copied()),
		}
	}

	/// Builds the HTTP request for one attempt.
	pub fn build(
		&self,
		endpoints: &Endpoints,
		bearer: Option<&TokenSecret>,
		user_agent: Option<&HeaderValue>,
	) -> Result<HttpRequest, ConfigError> {
		let mut url = self.target.resolve(endpoints)?;

		if !self.options.query.is_empty() {
			url.query_pairs_mut().extend_pairs(self.options.query.iter());
		}

		let (content_type, body) = match &self.options.body {
			RequestBody::Empty => (None, Vec::new()),
			RequestBody::Json(value) =>
				(Some(HeaderValue::from_static(JSON_API_MEDIA_TYPE)), value.to_string().into_bytes()),
			RequestBody::Form(fields) => {
				let encoded = form_urlencoded::Serializer::new(String::new())
					.extend_pairs(fields.iter())
					.finish();

				(Some(HeaderValue::from_static(FORM_MEDIA_TYPE)), encoded.into_bytes())
			},
			RequestBody::Raw { content_type, bytes } => (Some(content_type.clone()), bytes.clone()),
		};
		let mut request = oauth2::http::Request::builder()
			.method(self.method.clone())
			.uri(url.as_str())
			.body(body)?;
		let headers = request.headers_mut();

		headers.extend(self.options.headers.clone());

		if self.kind == CallKind::Resource && !headers.contains_key(ACCEPT) {
			headers.insert(ACCEPT, HeaderValue::from_static(JSON_API_MEDIA_TYPE));
		}
		if let Some(content_type) = content_type {
			headers.entry(CONTENT_TYPE).or_insert(content_type);
		}
		if let Some(user_agent) = user_agent {
			headers.insert(USER_AGENT, user_agent.clone());
		}
		if let Some(bearer) = bearer {
			headers.insert(AUTHORIZATION, bearer.authorization()?);
		}

		Ok(request)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::config::{DEFAULT_BASE_URL, DEFAULT_TOKEN_URL};

	fn endpoints() -> Endpoints {
		Endpoints::parse(DEFAULT_BASE_URL, DEFAULT_TOKEN_URL).expect("Default endpoints are valid.")
	}

	#[test]
	fn resource_request_carries_auth_agent_and_query() {
		let context = RequestContext::new(
			Method::GET,
			"/prospects",
			RequestOptions::default().with_query("page[size]", "50"),
		);
		let agent = HeaderValue::from_static("tap-outreach <ops@example.com>");
		let request = context
			.build(&endpoints(), Some(&TokenSecret::new("abc")), Some(&agent))
			.expect("Request should build.");

		assert_eq!(request.method(), Method::GET);
		assert_eq!(
			request.uri().to_string(),
			"https://api.outreach.io/api/v2/prospects?page%5Bsize%5D=50"
		);
		assert_eq!(request.headers()[AUTHORIZATION], "Bearer abc");
		assert_eq!(request.headers()[USER_AGENT], "tap-outreach <ops@example.com>");
		assert_eq!(request.headers()[ACCEPT], JSON_API_MEDIA_TYPE);
		assert!(request.body().is_empty());
	}

	#[test]
	fn absolute_urls_bypass_the_base() {
		let url = Url::parse("https://api.outreach.io/api/v2/prospects?page%5Bafter%5D=xyz")
			.expect("Fixture URL should parse.");
		let context = RequestContext::new(Method::GET, url.clone(), RequestOptions::default());
		let request = context.build(&endpoints(), None, None).expect("Request should build.");

		assert_eq!(request.uri().to_string(), url.as_str());
		assert!(!request.headers().contains_key(AUTHORIZATION));
		assert!(!request.headers().contains_key(USER_AGENT));
	}

	#[test]
	fn json_bodies_set_media_type() {
		let context = RequestContext::new(
			Method::PATCH,
			"prospects/7",
			RequestOptions::default()
				.with_json(serde_json::json!({ "data": { "type": "prospect", "id": 7 } })),
		);
		let request = context.build(&endpoints(), None, None).expect("Request should build.");
		let body: serde_json::Value =
			serde_json::from_slice(request.body()).expect("Body should be JSON.");

		assert_eq!(request.method(), Method::PATCH);
		assert_eq!(request.headers()[CONTENT_TYPE], JSON_API_MEDIA_TYPE);
		assert_eq!(body["data"]["id"], 7);
	}

	#[test]
	fn token_refresh_posts_form_without_bearer() {
		let token_url = endpoints().token;
		let context = RequestContext::token_refresh(
			token_url,
			&[("refresh_token", "r t"), ("grant_type", "refresh_token")],
		);
		let request = context.build(&endpoints(), None, None).expect("Request should build.");

		assert_eq!(context.kind, CallKind::TokenRefresh);
		assert_eq!(request.method(), Method::POST);
		assert_eq!(request.uri().to_string(), DEFAULT_TOKEN_URL);
		assert_eq!(request.headers()[CONTENT_TYPE], FORM_MEDIA_TYPE);
		assert_eq!(request.body().as_slice(), b"refresh_token=r+t&grant_type=refresh_token");
	}

	#[test]
	fn caller_headers_are_kept_unless_overridden() {
		let context = RequestContext::new(
			Method::POST,
			"mailings",
			RequestOptions::default()
				.with_header(ACCEPT, HeaderValue::from_static("application/json"))
				.with_header(AUTHORIZATION, HeaderValue::from_static("Bearer stale"))
				.with_raw(HeaderValue::from_static("text/plain"), "hello"),
		);
		let request = context
			.build(&endpoints(), Some(&TokenSecret::new("fresh")), None)
			.expect("Request should build.");

		assert_eq!(request.headers()[ACCEPT], "application/json");
		assert_eq!(request.headers()[AUTHORIZATION], "Bearer fresh");
		assert_eq!(request.headers()[CONTENT_TYPE], "text/plain");
		assert_eq!(request.body().as_slice(), b"hello");
	}
}
