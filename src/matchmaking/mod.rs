//! Matchmaking
//!
//! Waitlist, pair registry, the pairing policy over them, and the event loop
//! that serializes every change.

pub mod matchmaker;
pub mod operations;
pub mod registry;
pub mod results;
pub mod waitlist;

pub use matchmaker::{Matchmaker, MatchmakerHandle, Notices};
pub use operations::MatchmakingState;
pub use registry::PairRegistry;
pub use results::{MatchmakingSnapshot, RegisterOutcome, UnregisterOutcome};
pub use waitlist::Waitlist;
