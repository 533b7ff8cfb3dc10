// Linkauth — Gateway Module
//
// HTTP front end for the credential store. Privileged routes require Basic
// credentials of a system account; store outcomes map to status codes.

mod auth;
mod error;
mod routes;
mod server;

pub use auth::{parse_basic, BasicCredentials, SystemCaller};
pub use error::{ApiError, ErrorDetails, ErrorResponse};
pub use routes::{router, GatewayState};
pub use server::GatewayServer;
