pub mod action_kind;
pub mod coordinates;
pub mod location;
pub mod validation;

pub use action_kind::ActionKind;
pub use coordinates::Coordinates;
pub use location::{LocationError, PermissionState};
pub use validation::{IssueCode, ValidationIssue, ValidationResult};
