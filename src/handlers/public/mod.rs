//! Routes reachable without a token: token acquisition and renewal, and
//! the notification socket, which authenticates in-band.

pub mod auth;
pub mod notifications;
