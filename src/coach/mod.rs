//! Coaching text: spoken lines per style and remote reply generation

pub mod prompts;
pub mod reply;

pub use prompts::{closing_line, drill_line, welcome_line, FALLBACK_REPLY};
pub use reply::{reply_or_fallback, CoachingReply, MistralCoach, ReplyRequest};
