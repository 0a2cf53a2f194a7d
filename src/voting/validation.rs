// Draft validation, checked once when leaving editing

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::voting::derived::{
    effective_committee_size, min_oracle_reward, voting_min_balance, voting_min_stake,
    NetworkParams,
};
use crate::voting::types::{Confirmation, Draft, DraftField};

const MIN_OPTIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: DraftField,
    pub reason: String,
}

impl FieldViolation {
    fn new(field: DraftField, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Every violated field of a draft, never just the first one
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{} invalid field(s): {}", .violations.len(), summary(.violations))]
pub struct ValidationErrors {
    pub violations: Vec<FieldViolation>,
}

fn summary(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn fields(&self) -> Vec<DraftField> {
        self.violations.iter().map(|v| v.field).collect()
    }

    pub fn contains(&self, field: DraftField) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

#[derive(Default)]
struct Collector(Vec<FieldViolation>);

impl Collector {
    fn check(&mut self, ok: bool, field: DraftField, reason: impl Into<String>) {
        if !ok {
            self.0.push(FieldViolation::new(field, reason));
        }
    }

    fn finish(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors { violations: self.0 })
        }
    }
}

fn is_percentage(value: u32) -> bool {
    (1..=100).contains(&value)
}

/// Validate a draft for publishing
pub fn validate(draft: &Draft, params: &NetworkParams) -> Result<(), ValidationErrors> {
    let mut errors = Collector::default();

    errors.check(
        !draft.title.trim().is_empty(),
        DraftField::Title,
        "title is required",
    );
    let filled = draft.filled_options().count();
    errors.check(
        filled >= MIN_OPTIONS,
        DraftField::Options,
        format!("at least {MIN_OPTIONS} non-empty options are required, got {filled}"),
    );
    errors.check(
        draft.voting_duration > 0,
        DraftField::VotingDuration,
        "voting duration must be positive",
    );
    errors.check(
        draft.public_voting_duration > 0,
        DraftField::PublicVotingDuration,
        "public voting duration must be positive",
    );
    errors.check(
        effective_committee_size(draft, params) >= 1,
        DraftField::CommitteeSize,
        "committee needs at least one oracle",
    );
    errors.check(
        is_percentage(draft.quorum),
        DraftField::Quorum,
        format!("quorum must be in (0, 100], got {}", draft.quorum),
    );
    if !draft.is_free_voting {
        let floor = min_oracle_reward(draft.fee_per_gas, params);
        errors.check(
            draft.oracle_reward.is_finite() && draft.oracle_reward >= floor,
            DraftField::OracleReward,
            format!("reward per oracle must be at least {floor}"),
        );
        if let Some(deposit) = draft.voting_min_payment {
            errors.check(
                deposit.is_finite() && deposit >= 0.0,
                DraftField::VotingMinPayment,
                "voting deposit cannot be negative",
            );
        }
    }
    errors.check(
        is_percentage(draft.winner_threshold),
        DraftField::WinnerThreshold,
        format!(
            "winner threshold must be in (0, 100], got {}",
            draft.winner_threshold
        ),
    );

    errors.finish()
}

/// Check the funding chosen on the review surface against the minimum
/// balance, and the minimum stake when the voting starts right away
pub fn validate_confirmation(
    draft: &Draft,
    confirmation: &Confirmation,
    params: &NetworkParams,
) -> Result<(), ValidationErrors> {
    let mut errors = Collector::default();

    let min_balance = voting_min_balance(
        draft.oracle_reward,
        effective_committee_size(draft, params),
        draft.fee_per_gas,
        params,
    );
    errors.check(
        confirmation.balance >= min_balance,
        DraftField::Balance,
        format!(
            "balance {} is below the required {min_balance}",
            confirmation.balance
        ),
    );
    if draft.should_start_immediately {
        let min_stake = voting_min_stake(draft.fee_per_gas, params);
        errors.check(
            confirmation.stake >= min_stake,
            DraftField::Stake,
            format!("stake {} is below the required {min_stake}", confirmation.stake),
        );
    }
    errors.check(
        !confirmation.from.trim().is_empty(),
        DraftField::FromAddress,
        "funding address is required",
    );

    errors.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voting::types::{OptionId, VotingOption};

    fn option(id: &str, value: &str) -> VotingOption {
        VotingOption {
            id: OptionId::from(id),
            value: value.to_string(),
        }
    }

    fn valid_draft() -> Draft {
        Draft {
            title: "Will it rain?".to_string(),
            description: String::new(),
            options: vec![option("o-0", "Yes"), option("o-1", "No")],
            start_date: None,
            should_start_immediately: false,
            voting_duration: 86_400,
            public_voting_duration: 3_600,
            committee_size: 100,
            is_whole_network: false,
            quorum: 20,
            is_free_voting: false,
            voting_min_payment: None,
            oracle_reward: 1.0,
            fee_per_gas: 0.01,
            winner_threshold: 50,
            epoch: 42,
            from_address: "0xabc".to_string(),
        }
    }

    #[test]
    fn test_valid_draft_passes() {
        assert!(validate(&valid_draft(), &NetworkParams::default()).is_ok());
    }

    #[test]
    fn test_reports_every_violation() {
        let mut draft = valid_draft();
        draft.title = "  ".to_string();
        draft.options = vec![option("o-0", "Yes"), option("o-1", "")];
        draft.quorum = 0;
        draft.winner_threshold = 101;

        let errors = validate(&draft, &NetworkParams::default()).unwrap_err();
        assert_eq!(
            errors.fields(),
            vec![
                DraftField::Title,
                DraftField::Options,
                DraftField::Quorum,
                DraftField::WinnerThreshold
            ]
        );
    }

    #[test]
    fn test_zero_durations_rejected() {
        let mut draft = valid_draft();
        draft.voting_duration = 0;
        draft.public_voting_duration = 0;
        let errors = validate(&draft, &NetworkParams::default()).unwrap_err();
        assert!(errors.contains(DraftField::VotingDuration));
        assert!(errors.contains(DraftField::PublicVotingDuration));
    }

    #[test]
    fn test_reward_floor_waived_for_free_voting() {
        let mut draft = valid_draft();
        draft.oracle_reward = 0.0;
        let errors = validate(&draft, &NetworkParams::default()).unwrap_err();
        assert_eq!(errors.fields(), vec![DraftField::OracleReward]);

        draft.is_free_voting = true;
        draft.voting_min_payment = Some(-1.0);
        assert!(validate(&draft, &NetworkParams::default()).is_ok());
    }

    #[test]
    fn test_whole_network_satisfies_committee_size() {
        let mut draft = valid_draft();
        draft.committee_size = 0;
        assert!(validate(&draft, &NetworkParams::default()).is_err());
        draft.is_whole_network = true;
        assert!(validate(&draft, &NetworkParams::default()).is_ok());
    }

    #[test]
    fn test_confirmation_checks_stake_only_when_starting() {
        let params = NetworkParams::default();
        let mut draft = valid_draft();
        let confirmation = Confirmation {
            from: "0xabc".to_string(),
            balance: 1_000.0,
            stake: 0.0,
        };
        assert!(validate_confirmation(&draft, &confirmation, &params).is_ok());

        draft.should_start_immediately = true;
        let errors = validate_confirmation(&draft, &confirmation, &params).unwrap_err();
        assert_eq!(errors.fields(), vec![DraftField::Stake]);
    }

    #[test]
    fn test_confirmation_rejects_low_balance() {
        let params = NetworkParams::default();
        let confirmation = Confirmation {
            from: "0xabc".to_string(),
            balance: 1.0,
            stake: 0.0,
        };
        let errors = validate_confirmation(&valid_draft(), &confirmation, &params).unwrap_err();
        assert!(errors.contains(DraftField::Balance));
    }
}
