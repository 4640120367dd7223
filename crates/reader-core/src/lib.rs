pub mod config;
pub mod cookies;
pub mod credentials;
pub mod error;
pub mod model;
pub mod observable;
pub mod paging;
pub mod prefs;
pub mod secrets;
pub mod session;
