// Chain client errors and an in-memory client for the CLI and tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::voting::traits::ChainClient;
use crate::voting::types::{Confirmation, Draft, Receipt, VotingId};

/// Failure of a remote call. Display is the remote message, unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// The node rejected the transaction
    #[error("{0}")]
    Rejected(String),
    /// The node could not be reached
    #[error("{0}")]
    Unavailable(String),
}

impl ChainError {
    pub fn message(&self) -> &str {
        match self {
            ChainError::Rejected(message) | ChainError::Unavailable(message) => message,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    fee_failure: Option<String>,
    deploy_failures: Vec<String>,
    start_failures: Vec<String>,
    deployed: Vec<(VotingId, Draft)>,
    started: Vec<VotingId>,
}

/// Chain client that keeps everything in memory.
///
/// Failures are scripted per call: each queued message fails the next call
/// of that kind, later calls succeed.
#[derive(Debug)]
pub struct SimulatedChainClient {
    fee_per_gas: f64,
    latency: Duration,
    fee_latency: Duration,
    fee_calls: AtomicU64,
    deploy_calls: AtomicU64,
    start_calls: AtomicU64,
    script: Mutex<Script>,
}

impl Default for SimulatedChainClient {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl SimulatedChainClient {
    pub fn new(fee_per_gas: f64) -> Self {
        Self {
            fee_per_gas,
            latency: Duration::ZERO,
            fee_latency: Duration::ZERO,
            fee_calls: AtomicU64::new(0),
            deploy_calls: AtomicU64::new(0),
            start_calls: AtomicU64::new(0),
            script: Mutex::new(Script::default()),
        }
    }

    /// Delay applied to deploy and start calls
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay applied to the fee lookup done during preload
    pub fn with_fee_latency(mut self, latency: Duration) -> Self {
        self.fee_latency = latency;
        self
    }

    pub fn fail_fee_lookup(self, message: &str) -> Self {
        self.lock().fee_failure = Some(message.to_string());
        self
    }

    pub fn fail_next_deploy(&self, message: &str) {
        self.lock().deploy_failures.push(message.to_string());
    }

    pub fn fail_next_start(&self, message: &str) {
        self.lock().start_failures.push(message.to_string());
    }

    pub fn fee_calls(&self) -> u64 {
        self.fee_calls.load(Ordering::SeqCst)
    }

    pub fn deploy_calls(&self) -> u64 {
        self.deploy_calls.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> u64 {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Drafts that were deployed, in order
    pub fn deployed(&self) -> Vec<(VotingId, Draft)> {
        self.lock().deployed.clone()
    }

    pub fn started(&self) -> Vec<VotingId> {
        self.lock().started.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        // a panicking test thread must not hide the script from the others
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn delay(duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[async_trait]
impl ChainClient for SimulatedChainClient {
    async fn fee_per_gas(&self) -> Result<f64, ChainError> {
        self.fee_calls.fetch_add(1, Ordering::SeqCst);
        Self::delay(self.fee_latency).await;
        match self.lock().fee_failure.clone() {
            Some(message) => Err(ChainError::Unavailable(message)),
            None => Ok(self.fee_per_gas),
        }
    }

    async fn deploy_voting(
        &self,
        draft: &Draft,
        _confirmation: &Confirmation,
    ) -> Result<VotingId, ChainError> {
        let call = self.deploy_calls.fetch_add(1, Ordering::SeqCst);
        Self::delay(self.latency).await;

        let mut script = self.lock();
        if !script.deploy_failures.is_empty() {
            return Err(ChainError::Rejected(script.deploy_failures.remove(0)));
        }
        let voting_id = VotingId(format!("0x{:08x}{:08x}", draft.epoch, call + 1));
        script.deployed.push((voting_id.clone(), draft.clone()));
        Ok(voting_id)
    }

    async fn start_voting(
        &self,
        voting_id: &VotingId,
        _confirmation: &Confirmation,
    ) -> Result<Receipt, ChainError> {
        let call = self.start_calls.fetch_add(1, Ordering::SeqCst);
        Self::delay(self.latency).await;

        let mut script = self.lock();
        if !script.start_failures.is_empty() {
            return Err(ChainError::Rejected(script.start_failures.remove(0)));
        }
        if !script.deployed.iter().any(|(id, _)| id == voting_id) {
            return Err(ChainError::Rejected(format!("voting {voting_id} is not deployed")));
        }
        script.started.push(voting_id.clone());
        Ok(Receipt {
            tx_hash: format!("{voting_id}-start-{call}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voting::derived::NetworkParams;
    use crate::voting::machine::{DraftContext, DraftDefaults};

    fn confirmation() -> Confirmation {
        Confirmation {
            from: "0xabc".to_string(),
            balance: 100.0,
            stake: 50.0,
        }
    }

    fn draft() -> Draft {
        DraftContext::new(7, "0xabc", NetworkParams::default(), &DraftDefaults::default()).draft
    }

    #[tokio::test]
    async fn test_scripted_failures_apply_once() {
        let client = SimulatedChainClient::default();
        client.fail_next_deploy("out of gas");

        let error = client.deploy_voting(&draft(), &confirmation()).await.unwrap_err();
        assert_eq!(error.to_string(), "out of gas");

        let voting_id = client.deploy_voting(&draft(), &confirmation()).await.unwrap();
        assert_eq!(client.deploy_calls(), 2);
        assert_eq!(client.deployed().len(), 1);

        client.start_voting(&voting_id, &confirmation()).await.unwrap();
        assert_eq!(client.started(), vec![voting_id]);
    }

    #[tokio::test]
    async fn test_start_requires_deployed_voting() {
        let client = SimulatedChainClient::default();
        let error = client
            .start_voting(&VotingId("0xmissing".into()), &confirmation())
            .await
            .unwrap_err();
        assert!(matches!(error, ChainError::Rejected(_)));
        assert_eq!(client.start_calls(), 1);
    }

    #[tokio::test]
    async fn test_fee_lookup_failure() {
        let client = SimulatedChainClient::new(0.5).fail_fee_lookup("node offline");
        assert_eq!(
            client.fee_per_gas().await,
            Err(ChainError::Unavailable("node offline".into()))
        );
        assert_eq!(client.fee_calls(), 1);
    }
}
