pub mod connection;
pub mod frames;
pub mod session_hub;

pub use connection::{run_session, spawn_reply};
pub use frames::{parse_agent_frame, FrameEvent, ServerFrame};
pub use session_hub::{Session, SessionHub, SessionId};
