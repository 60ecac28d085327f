use log::{error, info, warn};
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::StatusClass,
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket,
};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::model::{address::Address, api::CALLER_HEADER};

/// A unique identifier for a particular request.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RequestId {
    /// Atomically get the next ID. Wraps back to zero after `usize::MAX`.
    pub fn next() -> RequestId {
        static REQUEST_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);
        RequestId(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Allow the ID to be accessed via request guard.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r RequestId {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(req.local_cache(RequestId::next))
    }
}

/// A rocket fairing that logs every request and response, tagged with the
/// request's ID.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let protocol = if rocket.config().tls_enabled() {
            "https"
        } else {
            "http"
        };
        let ip = &rocket.config().address;
        let port = &rocket.config().port;
        info!("Server launched on {protocol}://{ip}:{port}");
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let id = req.local_cache(RequestId::next);
        let caller = caller_label(req.headers().get_one(CALLER_HEADER));
        info!("->req{id} {} {} as {caller}", req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let id = req.local_cache(RequestId::next);
        let code = res.status();
        let log_msg = format!("<-rsp{id} {code} {}", route_label(req));
        match code.class() {
            StatusClass::ServerError => error!("{log_msg}"),
            StatusClass::ClientError => warn!("{log_msg}"),
            _ => info!("{log_msg}"),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, stopping gracefully...");
    }
}

/// How the invoking address appears in the request log: normalised when it
/// parses, flagged when it does not.
fn caller_label(header: Option<&str>) -> String {
    match header {
        None => "anonymous".to_string(),
        Some(raw) => match raw.parse::<Address>() {
            Ok(address) => address.to_string(),
            Err(_) => format!("invalid caller {raw:?}"),
        },
    }
}

/// The matched route, named if it has a name.
fn route_label(req: &Request<'_>) -> String {
    match req.route() {
        Some(route) => match &route.name {
            Some(name) => format!("{name} ({})", route.uri),
            None => route.uri.to_string(),
        },
        None => "UNKNOWN ROUTE".to_string(),
    }
}

/// Send log output to the console for the rest of the test run. Safe to call
/// from every test.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use log::LevelFilter;
    use log4rs::{
        append::console::ConsoleAppender,
        config::{Appender, Config, Logger, Root},
        encode::pattern::PatternEncoder,
    };
    use std::sync::Once;

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let console = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{l:<5} {M} - {m}{n}")))
            .build();
        let config = Config::builder()
            .appender(Appender::builder().build("console", Box::new(console)))
            .logger(Logger::builder().build("rocket", LevelFilter::Warn))
            .logger(Logger::builder().build("_", LevelFilter::Warn))
            .build(Root::builder().appender("console").build(LevelFilter::Debug));
        // Another test harness may have installed a logger already.
        if let Ok(config) = config {
            let _ = log4rs::init_config(config);
        }
    });
}

#[cfg(test)]
mod tests {
    use rocket::{get, local::asynchronous::Client, routes};

    use super::*;

    #[test]
    fn ids_increase() {
        let first = RequestId::next();
        let second = RequestId::next();
        assert!(second > first);
    }

    #[test]
    fn callers_are_logged_normalised() {
        assert_eq!(caller_label(None), "anonymous");
        assert_eq!(
            caller_label(Some("0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266")),
            Address::owner_example().to_string()
        );
        assert_eq!(
            caller_label(Some("not an address")),
            "invalid caller \"not an address\""
        );
    }

    #[get("/whoami")]
    fn whoami(id: &RequestId) -> String {
        id.to_string()
    }

    async fn whoami_as_seen_by(client: &Client) -> usize {
        let response = client.get("/whoami").dispatch().await;
        response.into_string().await.unwrap().parse().unwrap()
    }

    #[rocket::async_test]
    async fn each_request_gets_a_fresh_id() {
        init_test_logging();
        let rocket = rocket::build()
            .mount("/", routes![whoami])
            .attach(LoggerFairing);
        let client = Client::tracked(rocket).await.unwrap();

        let first = whoami_as_seen_by(&client).await;
        let second = whoami_as_seen_by(&client).await;
        assert!(second > first);
    }
}
