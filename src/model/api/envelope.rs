use rocket::{
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// The body of every response: either `{ ok: true, result }` or
/// `{ ok: false, errorKind, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn success(result: T) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error_kind: None,
            message: None,
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error_kind: Some(kind),
            message: Some(message.into()),
        }
    }
}

/// A successful handler result, wrapped in an [`Envelope`] on the way out.
#[derive(Debug)]
pub struct Reply<T>(pub T);

impl<'r, 'o: 'r, T: Serialize> Responder<'r, 'o> for Reply<T> {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        Json(Envelope::success(self.0)).respond_to(req)
    }
}
