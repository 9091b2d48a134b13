//! # certweave
//!
//! Template-driven X.509 certificate assembly.
//!
//! ## Crates
//!
//! - `certweave_x509` - templates, SAN and extension encoding, issuance
//! - `certweave-cli` - command line front end (binary `certweave`)

pub use certweave_x509;
pub use certweave_x509::prelude;
