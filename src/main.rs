use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use oracle_voting_draft::config::VotingDraftConfig;
use oracle_voting_draft::telemetry::init_telemetry;
use oracle_voting_draft::voting::derived::{
    humanize_duration, DurationPreset, PUBLIC_VOTING_DURATION_PRESETS, VOTING_DURATION_PRESETS,
};
use oracle_voting_draft::voting::{
    ChannelObserver, Confirmation, DraftEvent, DraftService, DraftSnapshot, FieldChange,
    FieldViolation, Identity, ServiceSettings, Signal, SimulatedChainClient, SubmissionError,
};

#[derive(Parser)]
#[command(name = "oracle-voting-draft")]
#[command(about = "Compose, validate and publish oracle votings")]
#[command(long_about = "Drives the voting draft workflow from a TOML draft file: validate the draft, \
                       estimate the funds it needs, or publish it against an in-memory chain.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file to use instead of voting-draft.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show info level logs on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a draft and list every invalid field
    Validate(DraftArgs),
    /// Show the reward, balance and stake a draft requires
    Estimate(DraftArgs),
    /// Validate, deploy and optionally start a voting
    Publish {
        #[command(flatten)]
        draft: DraftArgs,
        /// Balance committed to the voting
        #[arg(long, help = "Balance committed to the voting, defaults to the required minimum")]
        balance: Option<f64>,
        /// Stake committed when starting immediately
        #[arg(long, help = "Stake for an immediate start, defaults to the required minimum")]
        stake: Option<f64>,
        /// Make the deploy call fail with this message
        #[arg(long, value_name = "MESSAGE")]
        fail_deploy: Option<String>,
        /// Make the start call fail with this message
        #[arg(long, value_name = "MESSAGE")]
        fail_start: Option<String>,
    },
}

#[derive(Args)]
struct DraftArgs {
    /// TOML file describing the draft
    file: PathBuf,
    /// Fee per gas reported by the simulated node
    #[arg(long, default_value = "0.01")]
    fee_per_gas: f64,
    /// Epoch of the acting identity
    #[arg(long, default_value = "1")]
    epoch: u64,
    /// Address of the acting identity
    #[arg(long, default_value = "0x0000000000000000000000000000000000000001")]
    address: String,
    /// Print machine readable JSON
    #[arg(long)]
    json: bool,
}

/// Draft file contents. Every field is optional; missing ones keep the
/// configured defaults.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
struct DraftInput {
    title: Option<String>,
    description: Option<String>,
    options: Vec<String>,
    start_date: Option<String>,
    should_start_immediately: Option<bool>,
    voting_duration: Option<u64>,
    public_voting_duration: Option<u64>,
    committee_size: Option<u32>,
    is_whole_network: Option<bool>,
    quorum: Option<u32>,
    is_free_voting: Option<bool>,
    voting_min_payment: Option<f64>,
    oracle_reward: Option<f64>,
    winner_threshold: Option<u32>,
}

impl DraftInput {
    fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read draft file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse draft file {}", path.display()))
    }

    /// Field events in form order; options are applied separately
    fn field_events(&self) -> Result<Vec<DraftEvent>> {
        let mut events = Vec::new();
        let mut push = |change: Option<FieldChange>| {
            if let Some(change) = change {
                events.push(DraftEvent::from(change));
            }
        };

        push(self.title.clone().map(FieldChange::Title));
        push(self.description.clone().map(FieldChange::Description));
        push(self.should_start_immediately.map(FieldChange::ShouldStartImmediately));
        push(self.voting_duration.map(FieldChange::VotingDuration));
        push(self.public_voting_duration.map(FieldChange::PublicVotingDuration));
        push(self.committee_size.map(FieldChange::CommitteeSize));
        push(self.quorum.map(FieldChange::Quorum));
        push(self.is_free_voting.map(FieldChange::IsFreeVoting));
        push(self.voting_min_payment.map(|v| FieldChange::VotingMinPayment(Some(v))));
        push(self.oracle_reward.map(FieldChange::OracleReward));
        push(self.winner_threshold.map(FieldChange::WinnerThreshold));

        if let Some(start_date) = &self.start_date {
            events.push(DraftEvent::change("startDate", json!(start_date))?);
        }
        if let Some(checked) = self.is_whole_network {
            events.push(DraftEvent::SetWholeNetwork { checked });
        }
        Ok(events)
    }

    fn apply(&self, service: &mut DraftService) -> Result<()> {
        for event in self.field_events()? {
            service.send(event)?;
        }

        while service.snapshot().draft.options.len() < self.options.len() {
            service.send(DraftEvent::AddOption)?;
        }
        let ids: Vec<_> = service
            .snapshot()
            .draft
            .options
            .iter()
            .map(|option| option.id.clone())
            .collect();
        for (id, value) in ids.into_iter().zip(&self.options) {
            service.send(DraftEvent::SetOptions {
                id,
                value: value.clone(),
            })?;
        }
        Ok(())
    }
}

struct Session {
    service: DraftService,
    signals: tokio::sync::mpsc::UnboundedReceiver<Signal>,
}

impl Session {
    /// Start a service, wait out preload and load the draft file into it
    async fn open(
        args: &DraftArgs,
        settings: ServiceSettings,
        client: SimulatedChainClient,
    ) -> Result<Self> {
        let input = DraftInput::load(&args.file)?;
        let identity = Identity {
            epoch: args.epoch,
            address: args.address.clone(),
            balance: 0.0,
        };
        let (observer, signals) = ChannelObserver::channel();
        let mut service =
            DraftService::new(identity, Arc::new(client), Box::new(observer), settings);

        service.start();
        service.settle().await;
        if !service.state().is_editing() {
            bail!("Draft did not become editable, state is {}", service.state());
        }
        input.apply(&mut service)?;
        Ok(Self { service, signals })
    }

    fn drain(&mut self) -> Vec<Signal> {
        let mut signals = Vec::new();
        while let Ok(signal) = self.signals.try_recv() {
            signals.push(signal);
        }
        signals
    }
}

fn print_violations(violations: &[FieldViolation]) {
    for violation in violations {
        println!("  ✗ {}: {}", violation.field, violation.reason);
    }
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn preset_label(seconds: u64, presets: &[DurationPreset]) -> String {
    presets
        .iter()
        .find(|preset| preset.seconds == seconds)
        .map(|preset| preset.label.to_string())
        .unwrap_or_else(|| humanize_duration(seconds))
}

fn print_estimate(snapshot: &DraftSnapshot) {
    let draft = &snapshot.draft;
    let derived = &snapshot.derived;
    println!("📊 Voting estimate");
    println!("  Fee per gas:         {}", draft.fee_per_gas);
    println!("  Committee size:      {}", derived.committee_size);
    println!("  Required votes:      {}", derived.required_votes);
    println!("  Min oracle reward:   {} iDNA", derived.min_oracle_reward);
    println!("  Min balance:         {} iDNA", derived.voting_min_balance);
    println!("  Min stake:           {} iDNA", derived.voting_min_stake);
    println!(
        "  Voting duration:     {}",
        preset_label(draft.voting_duration, &VOTING_DURATION_PRESETS)
    );
    println!(
        "  Summing-up duration: {}",
        preset_label(draft.public_voting_duration, &PUBLIC_VOTING_DURATION_PRESETS)
    );
}

async fn validate(args: DraftArgs, settings: ServiceSettings) -> Result<()> {
    let client = SimulatedChainClient::new(args.fee_per_gas);
    let mut session = Session::open(&args, settings, client).await?;
    session.service.send(DraftEvent::Publish)?;
    let snapshot = session.service.snapshot();

    if args.json {
        print_json(&json!({
            "valid": snapshot.violations.is_empty(),
            "violations": snapshot.violations,
        }))?;
    } else if snapshot.violations.is_empty() {
        println!("✅ Draft is valid");
    } else {
        println!("❌ Draft has {} invalid field(s):", snapshot.violations.len());
        print_violations(&snapshot.violations);
    }

    if !snapshot.violations.is_empty() {
        bail!("Draft validation failed");
    }
    Ok(())
}

async fn estimate(args: DraftArgs, settings: ServiceSettings) -> Result<()> {
    let client = SimulatedChainClient::new(args.fee_per_gas);
    let session = Session::open(&args, settings, client).await?;
    let snapshot = session.service.snapshot();
    if args.json {
        print_json(&json!({
            "feePerGas": snapshot.draft.fee_per_gas,
            "derived": snapshot.derived,
        }))
    } else {
        print_estimate(&snapshot);
        Ok(())
    }
}

async fn publish(
    args: DraftArgs,
    settings: ServiceSettings,
    balance: Option<f64>,
    stake: Option<f64>,
    fail_deploy: Option<String>,
    fail_start: Option<String>,
) -> Result<()> {
    let client = SimulatedChainClient::new(args.fee_per_gas);
    if let Some(message) = &fail_deploy {
        client.fail_next_deploy(message);
    }
    if let Some(message) = &fail_start {
        client.fail_next_start(message);
    }

    let mut session = Session::open(&args, settings, client).await?;
    session.service.send(DraftEvent::Publish)?;
    let violations = session.service.snapshot().violations;
    if !violations.is_empty() {
        if args.json {
            print_json(&json!({ "outcome": "invalid", "violations": violations }))?;
        } else {
            println!("❌ Draft has {} invalid field(s):", violations.len());
            print_violations(&violations);
        }
        bail!("Draft validation failed");
    }

    let derived = session.service.snapshot().derived;
    let confirmation = Confirmation {
        from: args.address.clone(),
        balance: balance.unwrap_or(derived.voting_min_balance),
        stake: stake.unwrap_or(derived.voting_min_stake),
    };
    session.service.send(DraftEvent::Confirm(confirmation))?;
    if session.service.machine().matches("publishing.review") {
        let violations = session.service.snapshot().violations;
        if args.json {
            print_json(&json!({ "outcome": "rejected", "violations": violations }))?;
        } else {
            println!("❌ Funding rejected:");
            print_violations(&violations);
        }
        bail!("Funding does not cover the voting");
    }

    session.service.settle().await;
    let snapshot = session.service.snapshot();
    let signals = session.drain();

    let failure = signals.iter().find_map(|signal| match signal {
        Signal::Error(error) => Some(error.clone()),
        _ => None,
    });
    let done = signals.iter().find_map(|signal| match signal {
        Signal::Done(done) => Some(done.clone()),
        _ => None,
    });

    if args.json {
        print_json(&json!({
            "outcome": if done.is_some() { "done" } else { "failed" },
            "done": done,
            "error": failure,
            "snapshot": snapshot,
        }))?;
    } else if let Some(done) = &done {
        if done.did_start {
            println!("✅ Voting {} deployed and started", done.voting_id);
        } else {
            println!("✅ Voting {} deployed", done.voting_id);
        }
    }

    match failure {
        Some(SubmissionError::Start { voting_id, message }) => {
            if !args.json {
                println!("⚠️  Voting {voting_id} was deployed but could not be started: {message}");
            }
            bail!("{message}")
        }
        Some(SubmissionError::Deploy { message }) => {
            if !args.json {
                println!("❌ Deploy failed: {message}");
            }
            bail!("{message}")
        }
        None if done.is_none() => bail!("Publishing ended in state {}", snapshot.state),
        None => Ok(()),
    }
}

fn load_config(path: Option<&Path>) -> Result<VotingDraftConfig> {
    VotingDraftConfig::load_env_file()?;
    match path {
        Some(path) => VotingDraftConfig::load_from(path),
        None => Ok(oracle_voting_draft::config()?.clone()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if !cli.verbose {
        config.observability.log_level = "warn".to_string();
    }
    init_telemetry(&config.observability)?;
    let settings = ServiceSettings::from(&config);

    match cli.command {
        Commands::Validate(args) => validate(args, settings).await,
        Commands::Estimate(args) => estimate(args, settings).await,
        Commands::Publish {
            draft,
            balance,
            stake,
            fail_deploy,
            fail_start,
        } => publish(draft, settings, balance, stake, fail_deploy, fail_start).await,
    }
}
