//! Arbor Client - Remote tree store access
//!
//! One-shot request/response exchanges (`RemoteClient`), the streaming
//! subscription (`subscribe`/`Subscription`), and the local `Mirror` that
//! applies inbound events through the core mutation engine. The two
//! halves share no mutable state; the mirror's consistency comes entirely
//! from ordered, deterministic event application.

pub mod mirror;
pub mod remote;
pub mod stream;

pub use mirror::Mirror;
pub use remote::RemoteClient;
pub use stream::{subscribe, StreamEvent, Subscription};
