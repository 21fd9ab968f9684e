//! Chat channel membership.
//!
//! [`ChannelMembershipController`] keeps the channels joined on the chat
//! connection in line with the desired set pushed by the fleet loop, without
//! exceeding the platform's join throttle ([`JoinBucket`]).

pub mod bucket;
pub mod controller;

pub use bucket::JoinBucket;
pub use controller::{ChannelMembershipController, MembershipConfig, ReconcileReport};
