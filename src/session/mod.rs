//! Session orchestration: state, state machine and the async runtime around it

pub mod driver;
pub mod orchestrator;
pub mod state;

pub use driver::{SessionCommand, SessionDriver, SessionEvent, SessionHandle, SessionServices};
pub use orchestrator::{Effect, SessionOrchestrator};
pub use state::{
    Checklist, Feedback, FeedbackTone, Phase, SessionRun, SessionSnapshot, SharedSnapshot, Stamp,
    StyleProfile, TranscriptLog,
};
