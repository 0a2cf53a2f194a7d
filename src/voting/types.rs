// Core types for the voting draft state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable token identifying one voting option for the lifetime of a draft
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(pub String);

impl OptionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OptionId {
    fn from(value: &str) -> Self {
        OptionId(value.to_string())
    }
}

/// A single answer the committee can vote for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingOption {
    pub id: OptionId,
    pub value: String,
}

impl VotingOption {
    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }
}

/// Identifier of a deployed voting contract, returned by the deploy call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VotingId(pub String);

impl fmt::Display for VotingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Receipt of the start transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: String,
}

/// Acting identity, read once from the identity provider before the
/// machine leaves preload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub epoch: u64,
    pub address: String,
    pub balance: f64,
}

/// Funding parameters chosen by the user on the review surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub from: String,
    pub balance: f64,
    pub stake: f64,
}

/// The in-progress voting proposal.
///
/// Owned exclusively by the machine. Amounts are iDNA, durations are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub options: Vec<VotingOption>,
    pub start_date: Option<DateTime<Utc>>,
    pub should_start_immediately: bool,
    pub voting_duration: u64,
    pub public_voting_duration: u64,
    pub committee_size: u32,
    pub is_whole_network: bool,
    pub quorum: u32,
    pub is_free_voting: bool,
    pub voting_min_payment: Option<f64>,
    pub oracle_reward: f64,
    pub fee_per_gas: f64,
    pub winner_threshold: u32,
    pub epoch: u64,
    pub from_address: String,
}

impl Draft {
    pub fn option(&self, id: &OptionId) -> Option<&VotingOption> {
        self.options.iter().find(|option| &option.id == id)
    }

    /// Options that carry text
    pub fn filled_options(&self) -> impl Iterator<Item = &VotingOption> {
        self.options.iter().filter(|option| !option.is_blank())
    }
}

/// Names of the editable and read-only draft fields, used for
/// field-level error reporting and the generic `CHANGE` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DraftField {
    Title,
    Description,
    Options,
    StartDate,
    ShouldStartImmediately,
    VotingDuration,
    PublicVotingDuration,
    CommitteeSize,
    IsWholeNetwork,
    Quorum,
    IsFreeVoting,
    VotingMinPayment,
    OracleReward,
    FeePerGas,
    WinnerThreshold,
    Epoch,
    FromAddress,
    Balance,
    Stake,
}

impl DraftField {
    /// Resolve a presentation-layer field id. `desc` is the id the form uses
    /// for the description textarea.
    pub fn from_id(id: &str) -> Option<Self> {
        let field = match id {
            "title" => DraftField::Title,
            "desc" | "description" => DraftField::Description,
            "options" => DraftField::Options,
            "startDate" => DraftField::StartDate,
            "shouldStartImmediately" => DraftField::ShouldStartImmediately,
            "votingDuration" => DraftField::VotingDuration,
            "publicVotingDuration" => DraftField::PublicVotingDuration,
            "committeeSize" => DraftField::CommitteeSize,
            "isWholeNetwork" => DraftField::IsWholeNetwork,
            "quorum" => DraftField::Quorum,
            "isFreeVoting" => DraftField::IsFreeVoting,
            "votingMinPayment" => DraftField::VotingMinPayment,
            "oracleReward" => DraftField::OracleReward,
            "feePerGas" => DraftField::FeePerGas,
            "winnerThreshold" => DraftField::WinnerThreshold,
            "epoch" => DraftField::Epoch,
            "fromAddress" => DraftField::FromAddress,
            "balance" => DraftField::Balance,
            "stake" => DraftField::Stake,
            _ => return None,
        };
        Some(field)
    }

    pub fn id(&self) -> &'static str {
        match self {
            DraftField::Title => "title",
            DraftField::Description => "description",
            DraftField::Options => "options",
            DraftField::StartDate => "startDate",
            DraftField::ShouldStartImmediately => "shouldStartImmediately",
            DraftField::VotingDuration => "votingDuration",
            DraftField::PublicVotingDuration => "publicVotingDuration",
            DraftField::CommitteeSize => "committeeSize",
            DraftField::IsWholeNetwork => "isWholeNetwork",
            DraftField::Quorum => "quorum",
            DraftField::IsFreeVoting => "isFreeVoting",
            DraftField::VotingMinPayment => "votingMinPayment",
            DraftField::OracleReward => "oracleReward",
            DraftField::FeePerGas => "feePerGas",
            DraftField::WinnerThreshold => "winnerThreshold",
            DraftField::Epoch => "epoch",
            DraftField::FromAddress => "fromAddress",
            DraftField::Balance => "balance",
            DraftField::Stake => "stake",
        }
    }

    /// Fields seeded from identity or network context
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            DraftField::FeePerGas | DraftField::Epoch | DraftField::FromAddress
        )
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_ids_round_trip_through_lookup() {
        for field in [
            DraftField::Title,
            DraftField::Description,
            DraftField::CommitteeSize,
            DraftField::WinnerThreshold,
            DraftField::FromAddress,
        ] {
            assert_eq!(DraftField::from_id(field.id()), Some(field));
        }
    }

    #[test]
    fn test_form_description_alias() {
        assert_eq!(DraftField::from_id("desc"), Some(DraftField::Description));
        assert_eq!(DraftField::from_id("nope"), None);
    }

    #[test]
    fn test_read_only_fields() {
        assert!(DraftField::FeePerGas.is_read_only());
        assert!(DraftField::Epoch.is_read_only());
        assert!(!DraftField::Quorum.is_read_only());
    }

    #[test]
    fn test_blank_option_detection() {
        let option = VotingOption {
            id: OptionId::from("a-1"),
            value: "   ".to_string(),
        };
        assert!(option.is_blank());
    }
}
