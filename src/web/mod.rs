//! Web front end: sign-in, member pages and the admin panel

mod admin;
mod auth;
mod member;
mod oauth;
mod pages;
mod server;

pub use oauth::IdentityProvider;
pub use server::{start_web_server, AppState, WebServerConfig};
