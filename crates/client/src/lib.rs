//! Client side of toolshell.
//!
//! This crate provides the network seam and its reqwest implementation, the
//! offline cache agent that sits in front of it, and the in-page navigator
//! that swaps content regions through whichever [`fetch::Network`] it is given.

pub mod agent;
pub mod fetch;
pub mod navigator;

#[cfg(test)]
mod testing;

pub use agent::{ActivationReport, AgentConfig, AgentState, AgentStatus, CacheAgent, InstallReport};
pub use fetch::{CapturedResponse, FetchClient, FetchConfig, Network, Request, RequestMode, ResponseSource};
pub use navigator::{
    HeadlessPage, LinkDecision, LinkTarget, NavigationOutcome, Navigator, NavigatorConfig, PageHost, parse_page,
};
