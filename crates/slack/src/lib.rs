//! Slack integration for the TARS reaction stats bot.
//!
//! - **Socket Mode** (`socket`) - envelope loop with acknowledgement, reconnects and shutdown
//! - **Events** (`events`) - decoding of Socket Mode frames into typed payloads
//! - **Interactive** (`interactive`) - shortcuts, view submissions and block actions
//! - **Slash Commands** (`commands`) - `/stats [days]`
//! - **Registries** (`registry`) - one handler per routing key, per payload family
//! - **Block Kit** (`blocks`) - messages and the interval modal
//! - **Web API** (`api`, `web`) - `MessagingApi` and its reqwest implementation
//!
//! # Architecture
//!
//! ```text
//! SocketTransport → SocketModeRunner → SlackRouter → {Event,Command,Interactive}Registry
//!                                                        ↓
//!                                    Handler → MessagingApi (SlackWebClient)
//! ```

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod interactive;
pub mod registry;
pub mod socket;
pub mod web;

pub use api::{collect_history, ApiError, FileUpload, HistoryPage, MessagingApi};
pub use events::{decode_envelope, EventPayload, EventType, SlackEnvelope, SlackPayload};
pub use interactive::{InteractionKind, InteractionPayload};
pub use registry::{
    CommandRegistry, DispatchError, EventContext, EventRegistry, Handler, HandlerOutcome,
    InteractiveRegistry, RegistryFamily, SlackRouter,
};
pub use socket::{NoopSocketTransport, ReconnectPolicy, SocketModeRunner, SocketTransport};
pub use web::SlackWebClient;
