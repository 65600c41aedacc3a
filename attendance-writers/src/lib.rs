//! Async write pipeline: bounded-queue workers for the backend and ERP
//! systems, the voice-event log, per-camera viewer ref-counting, and the
//! relay side-effect. See `SPEC_FULL.md` §4.8–§4.10.

pub mod db_writer;
pub mod erp;
pub mod error;
mod http_client;
pub mod relay;
pub mod stream_viewers;
pub mod voice;

pub use db_writer::DbWriter;
pub use erp::{ErpPushQueue, OnError};
pub use error::{Error, Result};
pub use relay::RelayNotifier;
pub use stream_viewers::ViewerRegistry;
pub use voice::VoiceLog;
