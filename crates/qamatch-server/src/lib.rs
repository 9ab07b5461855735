//! # qamatch-server
//!
//! Axum HTTP transport for semantic question/answer matching.
//!
//! | Route | Purpose |
//! |---|---|
//! | `POST /match` | best record for a query within a partition (form or JSON) |
//! | `POST /backfill` | encode records with missing or malformed vectors |
//! | `GET /records` | list records and whether each has a usable vector |
//! | `GET /health` | uptime, model id, dimension |
//! | `GET /metrics` | Prometheus text format |

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use errors::ApiError;
pub use handlers::{MatchResponse, RecordsResponse};
pub use server::{AppState, QaServer};
pub use shutdown::ShutdownCoordinator;
