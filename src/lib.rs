pub mod booking;
pub mod captcha;
pub mod compactor;
pub mod config;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod seed;
pub mod server;
pub mod store;
pub mod wal;
