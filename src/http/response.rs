//! Conversion of processor responses into hyper responses.

use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use http_body_util::Full;

use crate::message::HttpResponse;

/// Build the wire response. Invalid header entries are skipped.
pub fn into_hyper(response: HttpResponse) -> Response<Full<Bytes>> {
    let mut out = Response::new(Full::new(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers.to_header_map();
    out
}

/// Reply used when the session went away before answering.
pub fn unavailable() -> Response<Full<Bytes>> {
    let mut out = Response::new(Full::new(Bytes::from_static(b"Connection closed")));
    *out.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    out.headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_status_headers_and_body() {
        let response = HttpResponse::text(StatusCode::TOO_MANY_REQUESTS, "slow down")
            .with_header("retry-after", "1");
        let out = into_hyper(response);

        assert_eq!(out.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(out.headers()["retry-after"], "1");
        assert_eq!(out.headers()["content-type"], "text/plain; charset=utf-8");
    }
}
