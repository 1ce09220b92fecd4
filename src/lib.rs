pub mod cli;
pub mod config;
pub mod engine;
mod logging;
pub mod player;
pub mod styles;
pub mod synth;
mod telemetry;
pub mod terminal_restore;
pub mod virtual_speaker;

pub use engine::{Engine, SessionEvent, SessionSnapshot, Status};
pub use logging::{init_logging, log_event, log_event_path, log_user_text};
pub use telemetry::init_tracing;
