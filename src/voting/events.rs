// Events accepted by the draft machine and the effects it emits

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::voting::errors::{DraftError, SubmissionError};
use crate::voting::types::{Confirmation, Draft, DraftField, OptionId, Receipt, VotingId};
use crate::voting::validation::FieldViolation;

/// Typed form of the generic `CHANGE {id, value}` setter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "id", content = "value", rename_all = "camelCase")]
pub enum FieldChange {
    Title(String),
    Description(String),
    StartDate(Option<DateTime<Utc>>),
    ShouldStartImmediately(bool),
    VotingDuration(u64),
    PublicVotingDuration(u64),
    CommitteeSize(u32),
    Quorum(u32),
    IsFreeVoting(bool),
    VotingMinPayment(Option<f64>),
    OracleReward(f64),
    WinnerThreshold(u32),
}

impl FieldChange {
    pub fn field(&self) -> DraftField {
        match self {
            FieldChange::Title(_) => DraftField::Title,
            FieldChange::Description(_) => DraftField::Description,
            FieldChange::StartDate(_) => DraftField::StartDate,
            FieldChange::ShouldStartImmediately(_) => DraftField::ShouldStartImmediately,
            FieldChange::VotingDuration(_) => DraftField::VotingDuration,
            FieldChange::PublicVotingDuration(_) => DraftField::PublicVotingDuration,
            FieldChange::CommitteeSize(_) => DraftField::CommitteeSize,
            FieldChange::Quorum(_) => DraftField::Quorum,
            FieldChange::IsFreeVoting(_) => DraftField::IsFreeVoting,
            FieldChange::VotingMinPayment(_) => DraftField::VotingMinPayment,
            FieldChange::OracleReward(_) => DraftField::OracleReward,
            FieldChange::WinnerThreshold(_) => DraftField::WinnerThreshold,
        }
    }

    /// Write the value into the draft. Whole-network handling of the
    /// committee size is the machine's job, not this setter's.
    pub fn apply(self, draft: &mut Draft) {
        match self {
            FieldChange::Title(value) => draft.title = value,
            FieldChange::Description(value) => draft.description = value,
            FieldChange::StartDate(value) => draft.start_date = value,
            FieldChange::ShouldStartImmediately(value) => draft.should_start_immediately = value,
            FieldChange::VotingDuration(value) => draft.voting_duration = value,
            FieldChange::PublicVotingDuration(value) => draft.public_voting_duration = value,
            FieldChange::CommitteeSize(value) => draft.committee_size = value,
            FieldChange::Quorum(value) => draft.quorum = value,
            FieldChange::IsFreeVoting(value) => draft.is_free_voting = value,
            FieldChange::VotingMinPayment(value) => draft.voting_min_payment = value,
            FieldChange::OracleReward(value) => draft.oracle_reward = value,
            FieldChange::WinnerThreshold(value) => draft.winner_threshold = value,
        }
    }
}

/// Everything the machine reacts to: presentation events first, then the
/// internal completions delivered by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftEvent {
    Change { change: FieldChange },
    SetOptions { id: OptionId, value: String },
    AddOption,
    RemoveOption { id: OptionId },
    SetWholeNetwork { checked: bool },
    Publish,
    Cancel,
    Confirm(Confirmation),

    PrerequisitesReady { fee_per_gas: f64 },
    PreloadTimeout,
    DeployResolved { voting_id: VotingId },
    DeployRejected { message: String },
    StartResolved { receipt: Receipt },
    StartRejected { message: String },
}

impl DraftEvent {
    /// Build a `CHANGE` event from a presentation field id and raw value.
    ///
    /// Numbers may arrive as JSON numbers or numeric strings (custom numeric
    /// entry); an empty string clears optional fields.
    pub fn change(id: &str, value: Value) -> Result<DraftEvent, DraftError> {
        let field = DraftField::from_id(id).ok_or_else(|| DraftError::UnknownField {
            id: id.to_string(),
        })?;
        if field.is_read_only() {
            return Err(DraftError::ReadOnlyField { field });
        }

        let change = match field {
            DraftField::Title => FieldChange::Title(as_text(field, value)?),
            DraftField::Description => FieldChange::Description(as_text(field, value)?),
            DraftField::StartDate => FieldChange::StartDate(as_date(field, value)?),
            DraftField::ShouldStartImmediately => {
                FieldChange::ShouldStartImmediately(as_bool(field, value)?)
            }
            DraftField::VotingDuration => FieldChange::VotingDuration(as_unsigned(field, value)?),
            DraftField::PublicVotingDuration => {
                FieldChange::PublicVotingDuration(as_unsigned(field, value)?)
            }
            DraftField::CommitteeSize => {
                FieldChange::CommitteeSize(narrow(field, as_unsigned(field, value)?)?)
            }
            DraftField::Quorum => FieldChange::Quorum(narrow(field, as_unsigned(field, value)?)?),
            DraftField::WinnerThreshold => {
                FieldChange::WinnerThreshold(narrow(field, as_unsigned(field, value)?)?)
            }
            DraftField::IsFreeVoting => FieldChange::IsFreeVoting(as_bool(field, value)?),
            DraftField::VotingMinPayment => {
                FieldChange::VotingMinPayment(as_optional_amount(field, value)?)
            }
            DraftField::OracleReward => FieldChange::OracleReward(as_amount(field, value)?),
            DraftField::IsWholeNetwork => {
                return Ok(DraftEvent::SetWholeNetwork {
                    checked: as_bool(field, value)?,
                })
            }
            DraftField::Options
            | DraftField::Balance
            | DraftField::Stake
            | DraftField::FeePerGas
            | DraftField::Epoch
            | DraftField::FromAddress => {
                return Err(invalid(field, "not settable through CHANGE"));
            }
        };
        Ok(DraftEvent::Change { change })
    }

    /// Name used in logs and rejection errors
    pub fn name(&self) -> &'static str {
        match self {
            DraftEvent::Change { .. } => "CHANGE",
            DraftEvent::SetOptions { .. } => "SET_OPTIONS",
            DraftEvent::AddOption => "ADD_OPTION",
            DraftEvent::RemoveOption { .. } => "REMOVE_OPTION",
            DraftEvent::SetWholeNetwork { .. } => "SET_WHOLE_NETWORK",
            DraftEvent::Publish => "PUBLISH",
            DraftEvent::Cancel => "CANCEL",
            DraftEvent::Confirm(_) => "CONFIRM",
            DraftEvent::PrerequisitesReady { .. } => "PREREQUISITES_READY",
            DraftEvent::PreloadTimeout => "PRELOAD_TIMEOUT",
            DraftEvent::DeployResolved { .. } => "DEPLOY_RESOLVED",
            DraftEvent::DeployRejected { .. } => "DEPLOY_REJECTED",
            DraftEvent::StartResolved { .. } => "START_RESOLVED",
            DraftEvent::StartRejected { .. } => "START_REJECTED",
        }
    }

    /// Draft mutations, only valid while editing
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            DraftEvent::Change { .. }
                | DraftEvent::SetOptions { .. }
                | DraftEvent::AddOption
                | DraftEvent::RemoveOption { .. }
                | DraftEvent::SetWholeNetwork { .. }
        )
    }

    /// Events produced by the service rather than the presentation layer
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            DraftEvent::PrerequisitesReady { .. }
                | DraftEvent::PreloadTimeout
                | DraftEvent::DeployResolved { .. }
                | DraftEvent::DeployRejected { .. }
                | DraftEvent::StartResolved { .. }
                | DraftEvent::StartRejected { .. }
        )
    }
}

impl From<FieldChange> for DraftEvent {
    fn from(change: FieldChange) -> Self {
        DraftEvent::Change { change }
    }
}

/// Side effects requested by a transition, executed by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "camelCase")]
pub enum Effect {
    DeployVoting {
        draft: Draft,
        confirmation: Confirmation,
    },
    StartVoting {
        voting_id: VotingId,
        confirmation: Confirmation,
    },
    ReportViolations { violations: Vec<FieldViolation> },
    ConfirmRejected { violations: Vec<FieldViolation> },
    NotifyDone {
        did_start: bool,
        voting_id: VotingId,
    },
    NotifyError { error: SubmissionError },
}

fn invalid(field: DraftField, reason: impl Into<String>) -> DraftError {
    DraftError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn as_text(field: DraftField, value: Value) -> Result<String, DraftError> {
    match value {
        Value::String(text) => Ok(text),
        Value::Null => Ok(String::new()),
        other => Err(invalid(field, format!("expected text, got {other}"))),
    }
}

fn as_bool(field: DraftField, value: Value) -> Result<bool, DraftError> {
    match value {
        Value::Bool(flag) => Ok(flag),
        Value::String(text) => text
            .parse::<bool>()
            .map_err(|_| invalid(field, format!("expected a boolean, got {text:?}"))),
        other => Err(invalid(field, format!("expected a boolean, got {other}"))),
    }
}

fn as_number(field: DraftField, value: Value) -> Result<Option<f64>, DraftError> {
    let number = match value {
        Value::Null => None,
        Value::Number(number) => number.as_f64(),
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(
            text.trim()
                .parse::<f64>()
                .map_err(|_| invalid(field, format!("{text:?} is not a number")))?,
        ),
        other => return Err(invalid(field, format!("expected a number, got {other}"))),
    };
    match number {
        Some(n) if !n.is_finite() => Err(invalid(field, "number must be finite")),
        other => Ok(other),
    }
}

fn as_amount(field: DraftField, value: Value) -> Result<f64, DraftError> {
    Ok(as_number(field, value)?.unwrap_or(0.0))
}

fn as_optional_amount(field: DraftField, value: Value) -> Result<Option<f64>, DraftError> {
    as_number(field, value)
}

/// Whole, non-negative number; blank input counts as zero so validation can
/// report it
fn as_unsigned(field: DraftField, value: Value) -> Result<u64, DraftError> {
    let number = as_number(field, value)?.unwrap_or(0.0);
    if number < 0.0 || number.fract() != 0.0 {
        return Err(invalid(field, format!("expected a whole number, got {number}")));
    }
    if number > u64::MAX as f64 {
        return Err(invalid(field, "number is too large"));
    }
    Ok(number as u64)
}

fn narrow(field: DraftField, value: u64) -> Result<u32, DraftError> {
    u32::try_from(value).map_err(|_| invalid(field, format!("{value} is too large")))
}

fn as_date(field: DraftField, value: Value) -> Result<Option<DateTime<Utc>>, DraftError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => parse_date(&text)
            .map(Some)
            .ok_or_else(|| invalid(field, format!("{text:?} is not a date"))),
        other => Err(invalid(field, format!("expected a date, got {other}"))),
    }
}

/// RFC 3339, or the `YYYY-MM-DDTHH:MM` form of a `datetime-local` input
/// (read as UTC)
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| chrono::NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_change_maps_form_ids() {
        assert_eq!(
            DraftEvent::change("desc", json!("About")).unwrap(),
            DraftEvent::Change {
                change: FieldChange::Description("About".into())
            }
        );
        assert_eq!(
            DraftEvent::change("quorum", json!(35)).unwrap(),
            FieldChange::Quorum(35).into()
        );
    }

    #[test]
    fn test_change_accepts_numeric_strings() {
        assert_eq!(
            DraftEvent::change("votingDuration", json!("7200")).unwrap(),
            FieldChange::VotingDuration(7200).into()
        );
        assert_eq!(
            DraftEvent::change("oracleReward", json!("2.5")).unwrap(),
            FieldChange::OracleReward(2.5).into()
        );
        assert_eq!(
            DraftEvent::change("votingMinPayment", json!("")).unwrap(),
            FieldChange::VotingMinPayment(None).into()
        );
    }

    #[test]
    fn test_whole_network_checkbox_becomes_dedicated_event() {
        assert_eq!(
            DraftEvent::change("isWholeNetwork", json!(true)).unwrap(),
            DraftEvent::SetWholeNetwork { checked: true }
        );
    }

    #[test]
    fn test_change_rejects_bad_input() {
        assert!(matches!(
            DraftEvent::change("colour", json!("red")),
            Err(DraftError::UnknownField { .. })
        ));
        assert!(matches!(
            DraftEvent::change("feePerGas", json!(1)),
            Err(DraftError::ReadOnlyField {
                field: DraftField::FeePerGas
            })
        ));
        assert!(matches!(
            DraftEvent::change("committeeSize", json!(-3)),
            Err(DraftError::InvalidValue { .. })
        ));
        assert!(matches!(
            DraftEvent::change("quorum", json!("abc")),
            Err(DraftError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_start_date_parsing() {
        let expected = Utc.with_ymd_and_hms(2026, 11, 2, 9, 30, 0).unwrap();
        assert_eq!(
            DraftEvent::change("startDate", json!("2026-11-02T09:30")).unwrap(),
            FieldChange::StartDate(Some(expected)).into()
        );
        assert_eq!(
            DraftEvent::change("startDate", json!("2026-11-02T09:30:00Z")).unwrap(),
            FieldChange::StartDate(Some(expected)).into()
        );
        assert_eq!(
            DraftEvent::change("startDate", json!("")).unwrap(),
            FieldChange::StartDate(None).into()
        );
    }

    #[test]
    fn test_event_classification() {
        assert!(DraftEvent::AddOption.is_mutation());
        assert!(!DraftEvent::Publish.is_mutation());
        assert!(DraftEvent::PreloadTimeout.is_internal());
        assert!(!DraftEvent::Cancel.is_internal());
        assert_eq!(DraftEvent::Publish.name(), "PUBLISH");
    }
}
