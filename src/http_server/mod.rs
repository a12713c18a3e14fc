//! # HTTP surface
//!
//! Thin axum layer over [`crate::Vault`]. Handlers translate requests into
//! vault calls and outcomes into status codes; no protocol logic lives here.
//!
//! # Endpoints
//!
//! - `GET /db-backup` - list backup records, newest first
//! - `POST /db-backup` - take a manual backup
//! - `DELETE /db-backup/:id` - remove a backup record
//! - `POST /db-restore` - restore from `{url}`
//! - `POST /update-metadata` - replace a record's metadata
//! - `GET /auto-status` - whether automatic backups are enabled

pub mod backup_routes;
pub mod config;
pub mod server;

pub use backup_routes::backup_routes;
pub use config::HttpServerConfig;
pub use server::HttpServer;
