//! Pieces shared by the Surveyload crates
//!
//! [`types`] holds the questionnaire identity and the export vocabulary the
//! Headquarters API speaks. [`logging`] installs the tracing subscriber used by
//! the binary. Fallible helpers here return [`CommonError`].
//!
//! ```no_run
//! use surveyload_common::types::QuestionnaireIdentity;
//!
//! fn main() -> surveyload_common::Result<()> {
//!     let identity: QuestionnaireIdentity = "0d4f2a3b8c1e4f5a9b7c6d5e4f3a2b1c$3".parse()?;
//!     assert_eq!(identity.version(), 3);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

pub use error::{CommonError, Result};
