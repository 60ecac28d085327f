use rocket::{
    catch, catchers,
    http::Status,
    response::status::Custom,
    serde::json::{Error as JsonError, Json},
    Catcher, Request, Route,
};

use crate::error::{Error, ErrorKind, Result};
use crate::model::api::{Envelope, GuardRejection};

mod candidates;
mod ledgers;
mod treasury;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(ledgers::routes());
    routes.extend(candidates::routes());
    routes.extend(voting::routes());
    routes.extend(treasury::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// A JSON request body that may have failed to parse.
type Body<'r, T> = std::result::Result<Json<T>, JsonError<'r>>;

/// Unwrap a request body, reporting parse failures in the usual envelope.
fn body<T>(data: Body<'_, T>) -> Result<T> {
    data.map(Json::into_inner)
        .map_err(|e| Error::bad_request(format!("Malformed request body: {e}")))
}

/// Render framework-level failures (no matching route, failed guards, panics)
/// in the same envelope as ledger errors.
#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> Custom<Json<Envelope<()>>> {
    let kind = match status.code {
        401 => ErrorKind::Unauthorized,
        404 => ErrorKind::NotFound,
        code if code >= 500 => ErrorKind::Internal,
        _ => ErrorKind::BadRequest,
    };
    let message = match &req.local_cache(|| GuardRejection(None)).0 {
        Some(reason) => reason.clone(),
        None => format!("{status} for {} {}", req.method(), req.uri()),
    };
    Custom(status, Json(Envelope::failure(kind, message)))
}
