//! Judging engine: turns a submission into a verdict.
//!
//! Control flow: [`controller::JudgeEngine`] builds an
//! [`builder::ExecutionRequest`], runs it on the remote sandbox
//! ([`remote::RemoteClient`]) or the local fallback
//! ([`fallback::LocalFallbackExecutor`]), and folds the ordered outcomes into a
//! verdict with [`evaluator::aggregate`].

pub mod builder;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod fallback;
pub mod languages;
pub mod remote;

#[cfg(test)]
mod controller_tests;

pub use controller::{CaseResult, JudgeEngine, RunRequest, RunResponse, SubmitRequest, SubmitResponse};
pub use error::{ExecutionError, JudgeError};
pub use languages::LanguageRegistry;
