pub mod config;
pub mod credential_store;
pub mod error;
pub mod event_mapper;
pub mod google_calendar_client;
pub mod key_value_store;
pub mod logging;
pub mod oauth_client;
pub mod persistent_cache;
