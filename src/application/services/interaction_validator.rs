use crate::domain::entities::{AttachmentMeta, InteractionDraft};
use crate::domain::value_objects::{IssueCode, ValidationResult};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

const MAX_SUBJECT_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_OUTCOME_LEN: usize = 1000;
const MAX_FOLLOW_UP_NOTES_LEN: usize = 500;
const MAX_LOCATION_NOTES_LEN: usize = 200;
const MAX_DURATION_MINUTES: f64 = 1440.0;
const MAX_ATTACHMENTS: usize = 10;
const MIN_SUBJECT_LEN_ADVISORY: usize = 3;
const LONG_DESCRIPTION_ADVISORY: usize = 1000;
const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;
const MOBILE_UPLOAD_WARN_BYTES: u64 = 2 * 1024 * 1024;
const COORDINATE_PRECISION: u32 = 6;

const ALLOWED_ATTACHMENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "application/pdf",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// インタラクション種別のメタデータ。`update_settings` で差し替える。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionTypeMeta {
    pub active: bool,
    pub requires_location: bool,
}

/// インタラクション記録のクロスフィールド業務ルールを検査する
/// ルールエンジン。状態は種別設定のみで、検証自体は純粋。
///
/// エラーは永続化をブロックし、警告は通知のみ。GPS不良や大きい
/// ファイルといった現場の劣化条件でも記録自体は失わせない方針。
pub struct InteractionValidator {
    types: RwLock<HashMap<i64, InteractionTypeMeta>>,
}

impl InteractionValidator {
    pub fn new() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
        }
    }

    pub fn update_settings(&self, types: HashMap<i64, InteractionTypeMeta>) {
        if let Ok(mut guard) = self.types.write() {
            *guard = types;
        }
    }

    /// テキストのトリム・booleanの補完・座標丸め・duration の床関数。
    /// 冪等であること: sanitize(sanitize(x)) == sanitize(x)。
    pub fn sanitize_interaction(&self, draft: &InteractionDraft) -> InteractionDraft {
        let mut out = draft.clone();

        out.subject = trim_opt(&out.subject);
        out.description = trim_opt(&out.description);
        out.outcome = trim_opt(&out.outcome);
        out.follow_up_notes = trim_opt(&out.follow_up_notes);
        out.location_notes = trim_opt(&out.location_notes);

        out.is_completed = Some(out.is_completed.unwrap_or(false));
        out.follow_up_required = Some(out.follow_up_required.unwrap_or(false));

        let factor = 10f64.powi(COORDINATE_PRECISION as i32);
        out.latitude = out.latitude.map(|lat| (lat * factor).round() / factor);
        out.longitude = out.longitude.map(|lon| (lon * factor).round() / factor);

        out.duration_minutes = out
            .duration_minutes
            .map(|minutes| minutes.floor().max(0.0));

        out
    }

    pub fn validate_interaction(&self, draft: &InteractionDraft) -> ValidationResult {
        let mut result = ValidationResult::valid();

        self.check_required_fields(draft, &mut result);
        self.check_type(draft, &mut result);
        self.check_coordinates(draft, &mut result);
        self.check_dates(draft, &mut result);
        self.check_field_lengths(draft, &mut result);
        self.check_business_rules(draft, &mut result);
        self.check_mobile_usability(draft, &mut result);

        result
    }

    /// 添付メタデータ単体の検査。転送サービスとは独立に呼べる。
    pub fn validate_attachment(&self, attachment: &AttachmentMeta) -> ValidationResult {
        let mut result = ValidationResult::valid();

        if attachment.size_bytes > MAX_ATTACHMENT_BYTES {
            result.push_error(
                "attachment",
                format!(
                    "File size exceeds the {} MB limit",
                    MAX_ATTACHMENT_BYTES / (1024 * 1024)
                ),
                IssueCode::FileTooLarge,
            );
        } else if attachment.size_bytes > MOBILE_UPLOAD_WARN_BYTES {
            result.push_warning(
                "attachment",
                "Large files upload slowly on mobile connections",
                IssueCode::LargeFileOnMobile,
            );
        }

        if !ALLOWED_ATTACHMENT_TYPES.contains(&attachment.content_type.as_str()) {
            result.push_error(
                "attachment",
                format!("File type {} is not allowed", attachment.content_type),
                IssueCode::UnsupportedFileType,
            );
        }

        result
    }

    fn check_required_fields(&self, draft: &InteractionDraft, result: &mut ValidationResult) {
        if draft.organization_id.is_none() {
            result.push_error(
                "organizationId",
                "Organization is required",
                IssueCode::RequiredFieldMissing,
            );
        }
        if draft.type_id.is_none() {
            result.push_error(
                "typeId",
                "Interaction type is required",
                IssueCode::RequiredFieldMissing,
            );
        }
        if draft.subject.as_deref().map_or(true, |s| s.trim().is_empty()) {
            result.push_error(
                "subject",
                "Subject is required",
                IssueCode::RequiredFieldMissing,
            );
        }
    }

    fn check_type(&self, draft: &InteractionDraft, result: &mut ValidationResult) {
        let Some(type_id) = draft.type_id else {
            return;
        };
        let types = match self.types.read() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if types.is_empty() {
            // 設定が未投入のうちは種別の存在検査を保留する
            return;
        }

        match types.get(&type_id) {
            None => {
                result.push_error(
                    "typeId",
                    format!("Unknown interaction type: {type_id}"),
                    IssueCode::UnknownInteractionType,
                );
            }
            Some(meta) => {
                if !meta.active {
                    result.push_warning(
                        "typeId",
                        "Interaction type is inactive",
                        IssueCode::InactiveInteractionType,
                    );
                }
                if meta.requires_location
                    && draft.latitude.is_none()
                    && draft.longitude.is_none()
                {
                    result.push_warning(
                        "latitude",
                        "This interaction type usually includes a GPS location",
                        IssueCode::LocationExpected,
                    );
                }
            }
        }
    }

    fn check_coordinates(&self, draft: &InteractionDraft, result: &mut ValidationResult) {
        match (draft.latitude, draft.longitude) {
            (Some(_), None) => {
                result.push_error(
                    "longitude",
                    "Longitude must accompany latitude",
                    IssueCode::CoordinateUnpaired,
                );
            }
            (None, Some(_)) => {
                result.push_error(
                    "latitude",
                    "Latitude must accompany longitude",
                    IssueCode::CoordinateUnpaired,
                );
            }
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) {
                    result.push_error(
                        "latitude",
                        format!("Latitude out of range: {lat}"),
                        IssueCode::CoordinateOutOfRange,
                    );
                }
                if !(-180.0..=180.0).contains(&lon) {
                    result.push_error(
                        "longitude",
                        format!("Longitude out of range: {lon}"),
                        IssueCode::CoordinateOutOfRange,
                    );
                }
                // (0,0) は未設定のセンチネルである可能性が高い
                if lat == 0.0 && lon == 0.0 {
                    result.push_warning(
                        "latitude",
                        "Coordinates (0, 0) look like an unset default",
                        IssueCode::NullIsland,
                    );
                }
            }
            (None, None) => {}
        }
    }

    fn check_dates(&self, draft: &InteractionDraft, result: &mut ValidationResult) {
        let now = Utc::now();
        let scheduled = parse_date_field(&draft.scheduled_date, "scheduledDate", result);
        let completed = parse_date_field(&draft.completed_date, "completedDate", result);
        let follow_up = parse_date_field(&draft.follow_up_date, "followUpDate", result);

        if let Some(scheduled) = scheduled {
            let offset = scheduled - now;
            if offset > Duration::days(365) || offset < Duration::days(-365) {
                result.push_warning(
                    "scheduledDate",
                    "Scheduled date is more than a year away from today",
                    IssueCode::DateFarFromNow,
                );
            }
        }

        if let Some(completed) = completed {
            if completed > now {
                result.push_error(
                    "completedDate",
                    "Completed date cannot be in the future",
                    IssueCode::CompletedInFuture,
                );
            }
            if let Some(scheduled) = scheduled {
                if completed < scheduled {
                    result.push_warning(
                        "completedDate",
                        "Completed before the scheduled date",
                        IssueCode::CompletedBeforeScheduled,
                    );
                }
            }
        }

        if let Some(follow_up) = follow_up {
            if follow_up <= now {
                result.push_warning(
                    "followUpDate",
                    "Follow-up date should be in the future",
                    IssueCode::FollowUpNotInFuture,
                );
            }
        }
    }

    fn check_field_lengths(&self, draft: &InteractionDraft, result: &mut ValidationResult) {
        check_length(&draft.subject, "subject", MAX_SUBJECT_LEN, result);
        check_length(&draft.description, "description", MAX_DESCRIPTION_LEN, result);
        check_length(&draft.outcome, "outcome", MAX_OUTCOME_LEN, result);
        check_length(
            &draft.follow_up_notes,
            "followUpNotes",
            MAX_FOLLOW_UP_NOTES_LEN,
            result,
        );
        check_length(
            &draft.location_notes,
            "locationNotes",
            MAX_LOCATION_NOTES_LEN,
            result,
        );
    }

    fn check_business_rules(&self, draft: &InteractionDraft, result: &mut ValidationResult) {
        if draft.is_completed.unwrap_or(false) && draft.completed_date.is_none() {
            result.push_warning(
                "completedDate",
                "Completed interactions usually carry a completion date",
                IssueCode::MissingCompletionDate,
            );
        }

        if draft.follow_up_required.unwrap_or(false) && draft.follow_up_date.is_none() {
            result.push_error(
                "followUpDate",
                "Follow-up date is required when follow-up is requested",
                IssueCode::FollowUpDateRequired,
            );
        }

        if let Some(duration) = draft.duration_minutes {
            if duration < 0.0 {
                result.push_error(
                    "durationMinutes",
                    "Duration cannot be negative",
                    IssueCode::NegativeDuration,
                );
            } else if duration > MAX_DURATION_MINUTES {
                result.push_warning(
                    "durationMinutes",
                    "Duration exceeds 24 hours",
                    IssueCode::DurationTooLong,
                );
            }
        }

        if let Some(attachments) = &draft.attachments {
            if attachments.len() > MAX_ATTACHMENTS {
                result.push_warning(
                    "attachments",
                    format!("More than {MAX_ATTACHMENTS} attachments on one interaction"),
                    IssueCode::TooManyAttachments,
                );
            }
        }
    }

    fn check_mobile_usability(&self, draft: &InteractionDraft, result: &mut ValidationResult) {
        if let Some(description) = &draft.description {
            if description.chars().count() > LONG_DESCRIPTION_ADVISORY {
                result.push_warning(
                    "description",
                    "Long descriptions are hard to review on a phone",
                    IssueCode::LongDescription,
                );
            }
        }
        if let Some(subject) = &draft.subject {
            let trimmed = subject.trim();
            if !trimmed.is_empty() && trimmed.chars().count() < MIN_SUBJECT_LEN_ADVISORY {
                result.push_warning(
                    "subject",
                    "Very short subjects are hard to find later",
                    IssueCode::ShortSubject,
                );
            }
        }
    }
}

impl Default for InteractionValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_opt(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|s| s.trim().to_string())
}

fn check_length(
    value: &Option<String>,
    field: &str,
    max_len: usize,
    result: &mut ValidationResult,
) {
    if let Some(value) = value {
        if value.chars().count() > max_len {
            result.push_error(
                field,
                format!("{field} exceeds {max_len} characters"),
                IssueCode::FieldTooLong,
            );
        }
    }
}

fn parse_date_field(
    raw: &Option<String>,
    field: &str,
    result: &mut ValidationResult,
) -> Option<DateTime<Utc>> {
    let raw = raw.as_deref()?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Some(parsed.with_timezone(&Utc)),
        Err(_) => {
            result.push_error(
                field,
                format!("Malformed date: {raw}"),
                IssueCode::InvalidDate,
            );
            None
        }
    }
}
