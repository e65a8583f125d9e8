//! Pure, deterministic value transforms.
//!
//! No I/O anywhere in this crate. Each transform takes a value (or a pair
//! of values) and returns a value; the execution engine composes them
//! through the [`TransformRegistry`] and the derivation handlers.

pub mod datetime;
pub mod epoch;
pub mod impute;
pub mod recode;
pub mod registry;
pub mod studyday;
pub mod visit;
pub mod widths;

pub use crate::datetime::{DateForm, date_of, is_valid_iso8601, parse_date_form, parse_string_date_to_iso};
pub use crate::epoch::{ElementRange, assign_epoch, overlapping_elements};
pub use crate::impute::{ImputeMethod, date_imputation_flag, impute_partial_date, time_imputation_flag};
pub use crate::recode::{
    compose_usubjid, country_alpha3, numeric_to_yn, recode_ethnic, recode_race, recode_sex,
};
pub use crate::registry::{TransformRegistry, ValueTransform};
pub use crate::studyday::{study_day, study_day_from_strings};
pub use crate::visit::{PlannedVisit, VisitMap};
pub use crate::widths::{MAX_CHAR_BYTES, is_ascii_clean, optimal_width, width_violations};
