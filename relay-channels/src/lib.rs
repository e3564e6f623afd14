//! Relay Channels - Bot Framework webhook relay to a Flowise prediction
//! endpoint.
//!
//! ## Architecture
//!
//! The service receives activities from a Bot Framework channel (Teams, Web
//! Chat, Emulator) on `/api/messages`, forwards message text to a Flowise
//! chatflow keyed by a per-user session, and sends the answer back through
//! the connector API.
//!
//! ```text
//! Channel → POST /api/messages → Relay → Flowise prediction API
//!    ↑                             ↓
//!    └──── connector send ←── reply text
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod activity;
pub mod connector;
pub mod flowise;
pub mod relay;
pub mod routes;
pub mod session;
pub mod traits;

// Re-export commonly used types
pub use activity::{Activity, ChannelAccount, ConversationAccount};
pub use connector::BotConnector;
pub use flowise::FlowiseClient;
pub use relay::{
    Relay, EMPTY_ANSWER_FALLBACK, PROCESSING_ERROR_REPLY, RESET_CONFIRMATION, TURN_ERROR_REPLY,
};
pub use routes::{build_router, create_state, RelayState};
pub use session::{is_reset, InMemorySessionStore, SessionResolver, SessionStore, RESET_COMMAND};
pub use traits::PredictionService;

use relay_common::config::Config;
use std::net::SocketAddr;

/// Start the relay HTTP server.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from((
        config.server.bind.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let state = create_state(config);
    let router = build_router(state);

    tracing::info!("Starting Flowise relay on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
