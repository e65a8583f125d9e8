//! Submission packaging.
//!
//! define.xml (ODM 1.3.2 + define-2.0), the clinical Study Data Reviewer's
//! Guide in Markdown, and the eCTD directory layout. ERROR findings block
//! packaging unless explicitly allowed.

pub mod csdrg;
pub mod define_xml;
pub mod ectd;

pub use crate::csdrg::{render_csdrg, write_csdrg};
pub use crate::define_xml::{DefineEntry, DefineXmlOptions, write_define_xml};
pub use crate::ectd::{PackageRequest, SubmissionLayout, package_submission};
