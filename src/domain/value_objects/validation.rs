use serde::{Deserialize, Serialize};
use std::fmt;

/// バリデーション失敗・警告の分類コード。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    RequiredFieldMissing,
    UnknownInteractionType,
    InactiveInteractionType,
    LocationExpected,
    CoordinateUnpaired,
    CoordinateOutOfRange,
    NullIsland,
    InvalidDate,
    DateFarFromNow,
    CompletedInFuture,
    CompletedBeforeScheduled,
    FollowUpNotInFuture,
    FieldTooLong,
    MissingCompletionDate,
    FollowUpDateRequired,
    NegativeDuration,
    DurationTooLong,
    TooManyAttachments,
    LongDescription,
    ShortSubject,
    FileTooLarge,
    UnsupportedFileType,
    InvalidFileName,
    LargeFileOnMobile,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::RequiredFieldMissing => "required_field_missing",
            IssueCode::UnknownInteractionType => "unknown_interaction_type",
            IssueCode::InactiveInteractionType => "inactive_interaction_type",
            IssueCode::LocationExpected => "location_expected",
            IssueCode::CoordinateUnpaired => "coordinate_unpaired",
            IssueCode::CoordinateOutOfRange => "coordinate_out_of_range",
            IssueCode::NullIsland => "null_island",
            IssueCode::InvalidDate => "invalid_date",
            IssueCode::DateFarFromNow => "date_far_from_now",
            IssueCode::CompletedInFuture => "completed_in_future",
            IssueCode::CompletedBeforeScheduled => "completed_before_scheduled",
            IssueCode::FollowUpNotInFuture => "follow_up_not_in_future",
            IssueCode::FieldTooLong => "field_too_long",
            IssueCode::MissingCompletionDate => "missing_completion_date",
            IssueCode::FollowUpDateRequired => "follow_up_date_required",
            IssueCode::NegativeDuration => "negative_duration",
            IssueCode::DurationTooLong => "duration_too_long",
            IssueCode::TooManyAttachments => "too_many_attachments",
            IssueCode::LongDescription => "long_description",
            IssueCode::ShortSubject => "short_subject",
            IssueCode::FileTooLarge => "file_too_large",
            IssueCode::UnsupportedFileType => "unsupported_file_type",
            IssueCode::InvalidFileName => "invalid_file_name",
            IssueCode::LargeFileOnMobile => "large_file_on_mobile",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// フィールド単位のバリデーション指摘。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub code: IssueCode,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: IssueCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }
}

/// エラーは永続化をブロックし、警告は通知のみ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn push_error(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        code: IssueCode,
    ) {
        self.errors.push(ValidationIssue::new(field, message, code));
        self.is_valid = false;
    }

    pub fn push_warning(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        code: IssueCode,
    ) {
        self.warnings
            .push(ValidationIssue::new(field, message, code));
    }

    pub fn error_on(&self, field: &str) -> Option<&ValidationIssue> {
        self.errors.iter().find(|issue| issue.field == field)
    }

    pub fn warning_on(&self, field: &str) -> Option<&ValidationIssue> {
        self.warnings.iter().find(|issue| issue.field == field)
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::valid()
    }
}
