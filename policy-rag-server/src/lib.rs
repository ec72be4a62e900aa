//! HTTP surface for `policy-rag`.
//!
//! The service exposes two routes:
//!
//! - `POST /chat` with `{"question": "..."}` answers one question
//! - `GET /health` reports liveness and the number of indexed chunks
//!
//! [`build_pipeline`] turns [`Settings`] into a ready [`RagPipeline`]
//! (corpus loaded and indexed), and [`run_server`] serves it until ctrl-c.
//!
//! [`RagPipeline`]: policy_rag::RagPipeline

pub mod bootstrap;
pub mod server;
pub mod settings;
pub mod telemetry;

pub use bootstrap::{Bootstrapped, IndexedCorpus, build_pipeline, index_corpus};
pub use server::{AppState, ChatRequest, ServerConfig, app_router, run_server};
pub use settings::{LogFormat, Settings};
pub use telemetry::init_telemetry;
