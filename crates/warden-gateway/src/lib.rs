//! Gateway wire contract for Warden.
//!
//! Provides inbound event classification, the message-segment model and its
//! accessor API, sender identity and privilege checks, and the outbound
//! action envelope submitted through an [`ActionSink`].
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use warden_gateway::{classify_inbound_frame, InboundEvent};
//!
//! let raw = r#"{
//!   "post_type": "message",
//!   "message_type": "group",
//!   "sender": { "user_id": 555, "role": "member" },
//!   "group_id": 100,
//!   "message_id": 42,
//!   "raw_message": "hello",
//!   "message": [ { "type": "text", "data": { "text": "hello" } } ]
//! }"#;
//!
//! let event = classify_inbound_frame(raw)?;
//! let InboundEvent::Group(message) = event else {
//!     panic!("expected a group message");
//! };
//! assert_eq!(message.group_id, 100);
//! assert_eq!(message.raw_text, "hello");
//! # Ok(())
//! # }
//! ```

pub mod gateway_action;
pub mod gateway_event;

pub use gateway_action::*;
pub use gateway_event::*;
