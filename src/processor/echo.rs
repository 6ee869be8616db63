//! Processor that answers every request with its own body.

use http::StatusCode;

use crate::message::properties::keys;
use crate::message::{HttpMessage, HttpResponse};
use crate::processor::{spawn, MessageProcessor, ProcessorError};
use crate::session::ResponseCorrelator;

#[derive(Debug, Default, Clone, Copy)]
pub struct EchoProcessor;

impl EchoProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl MessageProcessor for EchoProcessor {
    fn receive(&self, message: HttpMessage, correlator: ResponseCorrelator) -> Result<(), ProcessorError> {
        let (head, properties, body) = message.into_parts();
        let content_type = head.headers.get("content-type").map(str::to_string);
        let request_id = properties.get_str(keys::REQUEST_ID).map(str::to_string);

        spawn(async move {
            let body = match body.collect().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(exchange = %correlator.exchange(), error = %e, "Echo body incomplete");
                    return;
                }
            };

            let mut response = HttpResponse::new(StatusCode::OK).with_body(body);
            if let Some(content_type) = content_type {
                response = response.with_header("content-type", content_type);
            }
            if let Some(request_id) = request_id {
                response = response.with_header("x-request-id", request_id);
            }
            correlator.complete(response);
        })
    }
}
