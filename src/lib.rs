//! QR Tight Studio - composes a QR code with a framed center logo and exports
//! a tightly cropped PNG.
//!
//! Two raster pipelines do the real work:
//! * [`ops::logo`] flattens an uploaded logo onto a bordered circle/square badge.
//! * [`ops::export`] crops the rendered QR surface to a minimal quiet zone and
//!   adds a bottom banner or a full border frame.
//!
//! [`session::Session`] owns the editable parameters and wires the pipelines
//! together; [`ai`] fetches palette suggestions from a remote model.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;
pub mod ai;
pub mod cli;
pub mod color;
pub mod io;
pub mod ops;
pub mod session;
pub mod style;

pub use color::Color;
pub use session::{ExportResult, Session};
pub use style::{FrameStyle, FrameVariant, LogoShape, LogoStyle, QrStyle};
