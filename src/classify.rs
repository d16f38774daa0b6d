//! Maps completed HTTP responses onto the pipeline's outcome taxonomy.
//!
//! Only 5xx and 429 responses are transient. A 422 carries a structured JSON:API error document
//! describing the rejected field, and every other 4xx is a fatal client-side contract
//! violation. Anything below 400 is a success and keeps its full header set so the quota
//! throttle can inspect it.

// crates.io
use oauth2::{HttpResponse, http::header::RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransientError};

/// Tagged result of a single attempt.
#[derive(Debug)]
pub enum ClassifiedOutcome {
	/// Status below 400; the response carries the payload and every header.
	Success(HttpResponse),
	/// HTTP 429 with the server-declared wait, when one was supplied.
	RateLimited {
		/// Parsed `retry-after` hint.
		retry_after: Option<Duration>,
		/// Raw response body.
		body: String,
	},
	/// HTTP 5xx.
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// HTTP 422.
	ValidationError {
		/// HTTP status code.
		status: u16,
		/// Structured rejection details.
		detail: ErrorDocument,
	},
	/// Any other status of 400 or above.
	OtherHttpError {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
}
impl ClassifiedOutcome {
	/// Classifies a completed response; `now` anchors HTTP-date `retry-after` values.
	pub fn classify(response: HttpResponse, now: OffsetDateTime) -> Self {
		let status = response.status();

		if status.as_u16() >= 500 {
			return Self::ServerError { status: status.as_u16(), body: body_text(&response) };
		}
		if status == StatusCode::TOO_MANY_REQUESTS {
			return Self::RateLimited {
				retry_after: parse_retry_after(response.headers(), now),
				body: body_text(&response),
			};
		}
		if status == StatusCode::UNPROCESSABLE_ENTITY {
			return Self::ValidationError {
				status: status.as_u16(),
				detail: ErrorDocument::from_body(response.body()),
			};
		}
		if status.as_u16() >= 400 {
			return Self::OtherHttpError { status: status.as_u16(), body: body_text(&response) };
		}

		Self::Success(response)
	}

	/// Returns `true` when the retry controller may attempt the call again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::RateLimited { .. } | Self::ServerError { .. })
	}

	/// Converts the outcome into the successful response or the matching [`Error`].
	pub fn into_result(self) -> Result<HttpResponse> {
		match self {
			Self::Success(response) => Ok(response),
			Self::RateLimited { retry_after, body } =>
				Err(TransientError::RateLimited { retry_after, body }.into()),
			Self::ServerError { status, body } =>
				Err(TransientError::Server { status, body }.into()),
			Self::ValidationError { status, detail } => Err(Error::Validation { status, detail }),
			Self::OtherHttpError { status, body } => Err(Error::Http { status, body }),
		}
	}
}

/// JSON:API error document returned with validation failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
	/// Individual error entries.
	pub errors: Vec<ErrorObject>,
}
impl ErrorDocument {
	/// Parses the server's error document, or synthesizes one from the raw body when the
	/// server did not return a usable document.
	pub fn from_body(body: &[u8]) -> Self {
		match serde_json::from_slice::<Self>(body) {
			Ok(document) if !document.errors.is_empty() => document,
			_ => {
				let text = String::from_utf8_lossy(body);
				let text = text.trim();
				let detail = if text.is_empty() {
					"Request payload failed validation.".to_owned()
				} else {
					text.to_owned()
				};

				Self {
					errors: vec![ErrorObject {
						id: Some("validationError".into()),
						source: ErrorSource { pointer: Some("/data".into()), parameter: None },
						title: Some("Validation Error".into()),
						detail: Some(detail),
					}],
				}
			},
		}
	}
}
impl Display for ErrorDocument {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut first = true;

		for error in &self.errors {
			if !first {
				f.write_str("; ")?;
			}

			first = false;

			match (&error.source.pointer, error.detail.as_deref().or(error.title.as_deref())) {
				(Some(pointer), Some(message)) => write!(f, "{pointer}: {message}")?,
				(None, Some(message)) => f.write_str(message)?,
				(Some(pointer), None) => write!(f, "{pointer}: invalid")?,
				(None, None) => f.write_str("invalid")?,
			}
		}

		if first {
			f.write_str("no error details")?;
		}

		Ok(())
	}
}

/// One entry of an [`ErrorDocument`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
	/// Provider error identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	/// Location of the offending input.
	#[serde(default)]
	pub source: ErrorSource,
	/// Short summary.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	/// Human-readable explanation.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub detail: Option<String>,
}

/// Pointer to the part of the request that caused an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSource {
	/// JSON pointer into the request document.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pointer: Option<String>,
	/// Offending query parameter.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parameter: Option<String>,
}

/// Parses `retry-after` as delta seconds, falling back to an HTTP date relative to `now`.
pub fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	// IMF-fixdate carries a literal `GMT` zone.
	let dated = raw.strip_suffix(" GMT").map(|head| format!("{head} +0000"));

	if let Ok(moment) = OffsetDateTime::parse(dated.as_deref().unwrap_or(raw), &Rfc2822) {
		let delta = moment - now;

		return Some(if delta.is_positive() { delta } else { Duration::ZERO });
	}

	None
}

fn body_text(response: &HttpResponse) -> String {
	String::from_utf8_lossy(response.body()).into_owned()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const NOW: OffsetDateTime = macros::datetime!(2025-01-01 00:00 UTC);

	fn response(status: u16, headers: &[(&'static str, &str)], body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() =
			StatusCode::from_u16(status).expect("Status fixture should be valid.");

		for (name, value) in headers {
			response.headers_mut().insert(
				*name,
				HeaderValue::from_str(value).expect("Header fixture should be valid."),
			);
		}

		response
	}

	#[test]
	fn server_errors_are_retryable() {
		for status in [500, 502, 503, 504, 599] {
			let outcome = ClassifiedOutcome::classify(response(status, &[], "oops"), NOW);

			assert!(matches!(
				&outcome,
				ClassifiedOutcome::ServerError { status: s, body } if *s == status && body == "oops"
			));
			assert!(outcome.is_retryable());
		}
	}

	#[test]
	fn rate_limit_reads_retry_after_seconds() {
		let outcome =
			ClassifiedOutcome::classify(response(429, &[("retry-after", "30")], ""), NOW);

		assert!(matches!(
			outcome,
			ClassifiedOutcome::RateLimited { retry_after: Some(d), .. } if d == Duration::seconds(30)
		));

		let err = outcome.into_result().expect_err("429 should map to an error.");

		assert!(err.is_retryable());
		assert_eq!(err.retry_after(), Some(Duration::seconds(30)));
	}

	#[test]
	fn rate_limit_accepts_http_dates_and_missing_hints() {
		let dated = ClassifiedOutcome::classify(
			response(429, &[("retry-after", "Wed, 01 Jan 2025 00:00:45 GMT")], ""),
			NOW,
		);

		assert!(matches!(
			dated,
			ClassifiedOutcome::RateLimited { retry_after: Some(d), .. } if d == Duration::seconds(45)
		));

		let bare = ClassifiedOutcome::classify(response(429, &[], ""), NOW);

		assert!(matches!(bare, ClassifiedOutcome::RateLimited { retry_after: None, .. }));
	}

	#[test]
	fn validation_keeps_server_document() {
		let body = r#"{"errors":[{"id":"validationError","source":{"pointer":"/data/attributes/emails"},"title":"Validation Error","detail":"Contacts contact is using an excluded email address."}]}"#;
		let outcome = ClassifiedOutcome::classify(response(422, &[], body), NOW);

		assert!(!outcome.is_retryable());

		match outcome.into_result() {
			Err(Error::Validation { status, detail }) => {
				assert_eq!(status, 422);
				assert_eq!(
					detail.errors[0].source.pointer.as_deref(),
					Some("/data/attributes/emails")
				);
				assert_eq!(
					detail.to_string(),
					"/data/attributes/emails: Contacts contact is using an excluded email address."
				);
			},
			other => panic!("Unexpected outcome: {other:?}."),
		}
	}

	#[test]
	fn validation_synthesizes_document_from_plain_body() {
		let outcome = ClassifiedOutcome::classify(response(422, &[], "email excluded"), NOW);

		match outcome {
			ClassifiedOutcome::ValidationError { detail, .. } => {
				let entry = &detail.errors[0];

				assert_eq!(entry.id.as_deref(), Some("validationError"));
				assert_eq!(entry.source.pointer.as_deref(), Some("/data"));
				assert_eq!(entry.detail.as_deref(), Some("email excluded"));
			},
			other => panic!("Unexpected outcome: {other:?}."),
		}
	}

	#[test]
	fn other_client_errors_are_fatal() {
		for status in [400, 401, 403, 404, 409] {
			let outcome = ClassifiedOutcome::classify(response(status, &[], "nope"), NOW);

			assert!(!outcome.is_retryable());
			assert!(matches!(
				outcome.into_result(),
				Err(Error::Http { status: s, .. }) if s == status
			));
		}
	}

	#[test]
	fn success_keeps_headers_and_body() {
		let outcome = ClassifiedOutcome::classify(
			response(200, &[("x-ratelimit-remaining", "10")], "{\"data\":[]}"),
			NOW,
		);
		let ok = outcome.into_result().expect("2xx should be a success.");

		assert_eq!(ok.body(), b"{\"data\":[]}");
		assert_eq!(
			ok.headers().get("x-ratelimit-remaining").and_then(|v| v.to_str().ok()),
			Some("10")
		);
		assert!(matches!(
			ClassifiedOutcome::classify(response(304, &[], ""), NOW),
			ClassifiedOutcome::Success(_)
		));
	}
}
