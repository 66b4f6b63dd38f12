//! Schema-driven intake engine for Migration Factory imports.
//!
//! This crate has no async, network or database dependencies. It turns an
//! uploaded spreadsheet into validated, reconciled entity change-sets:
//!
//! - [`schema`] / [`schema_index`]: the typed entity schema model and lookups.
//! - [`tabular`]: CSV and workbook decoding into flat rows.
//! - [`intake`]: header resolution, coercion, validation, relationship
//!   materialization and reconciliation against live data.
//! - [`template`]: headers-only import templates.

pub mod conditions;
pub mod error;
pub mod intake;
pub mod live;
pub mod schema;
pub mod schema_index;
pub mod tabular;
pub mod template;
pub mod types;
