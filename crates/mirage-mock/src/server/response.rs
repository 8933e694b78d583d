//! Response construction shared by the runtime, proxy and admin handlers.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use tracing::warn;

pub type HttpResponse = Response<Full<Bytes>>;

/// `{"errors": [{"code": "404", "message": "..."}]}`
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    errors: [ErrorDetail<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: &'a str,
}

pub fn reply(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

pub fn empty_reply(status: StatusCode) -> HttpResponse {
    reply(status, Bytes::new())
}

pub fn json_reply<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => reply(status, bytes).with_header(CONTENT_TYPE.as_str(), "application/json"),
        Err(e) => {
            warn!("Cannot serialize response body: {}", e);
            empty_reply(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

pub fn error_reply(status: StatusCode, message: &str) -> HttpResponse {
    json_reply(
        status,
        &ErrorBody {
            errors: [ErrorDetail {
                code: status.as_str(),
                message,
            }],
        },
    )
}

/// Contract statuses are range-checked at compile time; anything hyper
/// still rejects degrades to 500.
pub fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Header writes that skip, with a warning, names or values that are not
/// valid HTTP instead of failing the response.
pub trait ResponseHeaders: Sized {
    fn set_header(&mut self, name: &str, value: &str);

    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }
}

impl ResponseHeaders for HttpResponse {
    fn set_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers_mut().insert(name, value);
            }
            _ => warn!("Skipping invalid response header '{}'", name),
        }
    }
}

pub async fn read_body(req: Request<Incoming>) -> Result<Bytes, hyper::Error> {
    Ok(req.into_body().collect().await?.to_bytes())
}
