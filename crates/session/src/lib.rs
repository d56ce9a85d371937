//! Client side of a hosted game: moves are shown immediately, then confirmed
//! or rolled back when the server answers.

pub mod error;
pub mod session;

pub use error::SessionError;
pub use session::{drive, ConnectionStatus, Session, SessionEvent, SyncState, TransportEvent};
