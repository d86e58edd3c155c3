//!
//! # tagemu core
//!
//! Emulates an NFC figure ("virtual amiibo") and the reader it sits on, well enough for
//! a client to drive it exactly like real hardware:
//! - [`tag`]: the tag aggregate, its on-disk layouts and their migration;
//! - [`area`]: per-application save data stored alongside each tag;
//! - [`locator`]: restartable discovery of every stored tag, upgrading old ones on the way;
//! - [`emulation`]: the process-wide active tag and connection intent, plus the per-session
//!   reconciler that turns intent into appear/disappear events;
//! - [`session`]: the reader state machine one client drives;
//! - [`service`]: the global query surface.
//!

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod area;
pub mod config;
pub mod emulation;
pub mod locator;
pub mod logging;
pub mod result;
pub mod service;
pub mod session;
pub mod tag;
pub(crate) mod util;

pub use config::Config;
pub use emulation::{Activation, ConnectionIntent, EmulationState};
pub use service::{EmulationService, ServiceError};
pub use session::{DeviceState, ServiceState, Session, SessionError};
pub use tag::{TagData, TagIdentity, VirtualTag};
