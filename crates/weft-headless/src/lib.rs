//! Chromium-backed page driver, speaking CDP through `chromiumoxide`.
//!
//! The driver does as little as possible natively: navigation and
//! screenshots go over the protocol, everything element-level goes
//! through a small JavaScript helper injected into the page.

pub mod cdp;
pub mod driver;
mod eval;
mod js;

pub use driver::HeadlessDriver;
