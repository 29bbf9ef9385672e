//! Daemon that grants a rolling budget of unrestricted computer use, tops it up while a code
//! editor is in front and blocks distracting sites and applications once it runs out.
//!
//! [budget] holds the decision logic, [daemon] drives it and [platform] talks to the operating
//! system.

pub mod budget;
pub mod cli;
pub mod daemon;
pub mod platform;
pub mod utils;
