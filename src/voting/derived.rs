// Derived values: pure functions of the draft and network parameters

use serde::{Deserialize, Serialize};

use crate::voting::types::Draft;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;

/// Network constants that turn the fee per gas into reward, balance and
/// stake floors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkParams {
    /// Committee size used when the voting targets the whole network
    pub network_size: u32,
    /// Gas units that price the minimum reward per oracle
    pub min_reward_gas: f64,
    /// Gas units that price the minimum stake for an immediate start
    pub min_stake_gas: f64,
    /// Gas units the deploy and start transactions consume on top of rewards
    pub deploy_overhead_gas: f64,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self {
            network_size: 10_000,
            min_reward_gas: 100.0,
            min_stake_gas: 3_000.0,
            deploy_overhead_gas: 2_000.0,
        }
    }
}

/// Floor reward per oracle
pub fn min_oracle_reward(fee_per_gas: f64, params: &NetworkParams) -> f64 {
    fee_per_gas.max(0.0) * params.min_reward_gas
}

/// Total funds the deploying address must hold: the committee payout pool
/// plus the protocol overhead scaled by fee
pub fn voting_min_balance(
    oracle_reward: f64,
    committee_size: u32,
    fee_per_gas: f64,
    params: &NetworkParams,
) -> f64 {
    let reward = oracle_reward.max(min_oracle_reward(fee_per_gas, params));
    let pool = reward * f64::from(committee_size);
    pool + fee_per_gas.max(0.0) * params.deploy_overhead_gas
}

/// Minimum stake required to start the voting right after deploy
pub fn voting_min_stake(fee_per_gas: f64, params: &NetworkParams) -> f64 {
    fee_per_gas.max(0.0) * params.min_stake_gas
}

/// Votes needed for a valid result: `ceil(committee * quorum / 100)`
pub fn required_votes(committee_size: u32, quorum: u32) -> u64 {
    (u64::from(committee_size) * u64::from(quorum)).div_ceil(100)
}

pub fn effective_committee_size(draft: &Draft, params: &NetworkParams) -> u32 {
    if draft.is_whole_network {
        params.network_size
    } else {
        draft.committee_size
    }
}

/// Everything the presentation layer derives from a draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedValues {
    pub min_oracle_reward: f64,
    pub voting_min_balance: f64,
    pub voting_min_stake: f64,
    pub committee_size: u32,
    pub required_votes: u64,
}

impl DerivedValues {
    pub fn compute(draft: &Draft, params: &NetworkParams) -> Self {
        let committee_size = effective_committee_size(draft, params);
        Self {
            min_oracle_reward: min_oracle_reward(draft.fee_per_gas, params),
            voting_min_balance: voting_min_balance(
                draft.oracle_reward,
                committee_size,
                draft.fee_per_gas,
                params,
            ),
            voting_min_stake: voting_min_stake(draft.fee_per_gas, params),
            committee_size,
            required_votes: required_votes(committee_size, draft.quorum),
        }
    }
}

/// A selectable duration shortcut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationPreset {
    pub seconds: u64,
    pub label: &'static str,
}

impl DurationPreset {
    const fn new(seconds: u64, label: &'static str) -> Self {
        Self { seconds, label }
    }
}

pub const VOTING_DURATION_PRESETS: [DurationPreset; 5] = [
    DurationPreset::new(12 * HOUR, "12 hours"),
    DurationPreset::new(DAY, "1 day"),
    DurationPreset::new(2 * DAY, "2 days"),
    DurationPreset::new(5 * DAY, "5 days"),
    DurationPreset::new(WEEK, "1 week"),
];

pub const PUBLIC_VOTING_DURATION_PRESETS: [DurationPreset; 4] = [
    DurationPreset::new(HOUR, "1 hour"),
    DurationPreset::new(2 * HOUR, "2 hours"),
    DurationPreset::new(12 * HOUR, "12 hours"),
    DurationPreset::new(DAY, "1 day"),
];

/// Human readable rendering of a duration in seconds, e.g. `1d 12h`
pub fn humanize_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    let parts = [
        (seconds / WEEK, "w"),
        (seconds % WEEK / DAY, "d"),
        (seconds % DAY / HOUR, "h"),
        (seconds % HOUR / MINUTE, "m"),
        (seconds % MINUTE, "s"),
    ];
    parts
        .iter()
        .filter(|(amount, _)| *amount > 0)
        .map(|(amount, unit)| format!("{amount}{unit}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_oracle_reward_scales_with_fee() {
        let params = NetworkParams::default();
        assert_eq!(min_oracle_reward(0.0, &params), 0.0);
        assert_eq!(min_oracle_reward(0.5, &params), 50.0);
    }

    #[test]
    fn test_min_balance_uses_reward_floor() {
        let params = NetworkParams {
            network_size: 100,
            min_reward_gas: 10.0,
            min_stake_gas: 30.0,
            deploy_overhead_gas: 4.0,
        };
        // reward below the floor is lifted to fee * min_reward_gas = 10
        assert_eq!(voting_min_balance(1.0, 3, 1.0, &params), 34.0);
        assert_eq!(voting_min_balance(20.0, 3, 1.0, &params), 64.0);
    }

    #[test]
    fn test_required_votes_rounds_up() {
        assert_eq!(required_votes(100, 20), 20);
        assert_eq!(required_votes(7, 50), 4);
        assert_eq!(required_votes(1, 1), 1);
        assert_eq!(required_votes(0, 50), 0);
    }

    #[test]
    fn test_min_stake() {
        let params = NetworkParams::default();
        assert_eq!(voting_min_stake(0.01, &params), 30.0);
    }

    #[test]
    fn test_presets_are_ascending() {
        assert!(VOTING_DURATION_PRESETS
            .windows(2)
            .all(|pair| pair[0].seconds < pair[1].seconds));
        assert!(PUBLIC_VOTING_DURATION_PRESETS
            .windows(2)
            .all(|pair| pair[0].seconds < pair[1].seconds));
    }

    #[test]
    fn test_humanize_duration() {
        assert_eq!(humanize_duration(0), "0s");
        assert_eq!(humanize_duration(DAY + 12 * HOUR), "1d 12h");
        assert_eq!(humanize_duration(WEEK), "1w");
        assert_eq!(humanize_duration(90), "1m 30s");
    }
}
