//! Command grammar and per-event rule dispatch for Warden.
//!
//! [`command_grammar`] holds the pure, data-described command recognizers;
//! [`rule_engine`] consumes one classified event, authorizes the sender,
//! evaluates the rule set in fixed order, and emits outbound actions
//! through an [`warden_gateway::ActionSink`].

pub mod command_grammar;
pub mod rule_engine;

pub use command_grammar::*;
pub use rule_engine::*;
