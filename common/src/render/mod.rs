//! Compiles an evaluated [`Service`](crate::Service) into service manager formats.
//!
//! `plist` builds the ordered launchd job dictionary; `systemd` writes the
//! `.service` and `.timer` unit texts. Neither validates anything: they render
//! what the definition block produced and skip features whose inputs are
//! missing.

pub mod plist;
pub mod systemd;

pub use plist::{Dictionary, PlistValue, SESSION_TYPES};
