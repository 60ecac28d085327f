use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::error::Error;
use crate::model::address::Address;

/// Header carrying the address of whoever is invoking an operation.
pub const CALLER_HEADER: &str = "X-Caller-Address";

/// The invoking address, taken from [`CALLER_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub Address);

/// Why the last request guard failed, kept for the catchers.
#[derive(Debug, Default)]
pub struct GuardRejection(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Caller {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let result = match req.headers().get_one(CALLER_HEADER) {
            Some(value) => value.parse::<Address>(),
            None => Err(Error::bad_request(format!("Missing {CALLER_HEADER} header"))),
        };
        match result {
            Ok(address) => Outcome::Success(Caller(address)),
            Err(e) => {
                req.local_cache(|| GuardRejection(Some(e.to_string())));
                Outcome::Error((Status::BadRequest, e))
            }
        }
    }
}
