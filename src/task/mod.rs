//! Fetch tasks and the hand-off of their results
//!
//! A [`FetchTask`] runs on its own, reporting its [`FetchPhase`] as it goes.
//! Once it settles, [`FetchHandle::finish`] delivers a completed report to a
//! [`CompletionHandler`] on the caller's side, unless the task was canceled.

mod handoff;
mod orchestrator;
mod types;

pub use handoff::{CompletionHandler, StoreHandoff};
pub use orchestrator::{FetchHandle, FetchTask};
pub use types::{FetchOutcome, FetchPhase, FetchReport, Settlement};
