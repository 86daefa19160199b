pub mod bootstrap;
pub mod calendar_api;
pub mod clock;
pub mod commands;
pub mod dashboard;
pub mod error;
pub mod oauth;
pub mod refresh;
pub mod session;
