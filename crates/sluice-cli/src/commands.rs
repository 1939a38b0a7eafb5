//! CLI command implementations.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sluice_governance::{
    description_hash, hash_proposal, Call, Deployment, ProposalCalls, RevenueTree, SplitPlan,
    World,
};
use sluice_types::{Address, Amount, Index};
use tracing::info;

use crate::config::{SluiceConfig, TreeConfig};
use crate::output::*;

/// Main CLI.
#[derive(Parser, Debug)]
#[command(name = "sluice")]
#[command(about = "Sluice - multi-index governance and treasury engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level, overrides the config file
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the default configuration file
    InitConfig {
        #[arg(short, long, default_value = "sluice.toml")]
        output: PathBuf,
    },

    /// Compute a proposal id without submitting anything
    ProposalId {
        /// Governance index the proposal belongs to
        #[arg(long, default_value_t = 0)]
        index: Index,
        /// Call target, repeat for a batch
        #[arg(long = "target", required = true)]
        targets: Vec<String>,
        /// Native value per call, defaults to 0
        #[arg(long = "value")]
        values: Vec<u64>,
        /// Hex payload per call, empty for a plain transfer
        #[arg(long = "payload")]
        payloads: Vec<String>,
        #[arg(long)]
        description: String,
    },

    /// Deploy a revenue-share tree, fund its root and cascade the split
    Tree {
        /// Tree description (TOML)
        #[arg(short, long)]
        file: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a full propose, vote, queue, execute and split cycle
    Demo {
        /// Value the proposal stores
        #[arg(long, default_value_t = 77)]
        value: u64,
    },
}

/// Execute a command.
pub fn execute(command: Commands, config: &SluiceConfig) -> anyhow::Result<()> {
    match command {
        Commands::InitConfig { output } => init_config(&output),
        Commands::ProposalId {
            index,
            targets,
            values,
            payloads,
            description,
        } => proposal_id(index, &targets, &values, &payloads, &description),
        Commands::Tree { file, json } => tree(&file, json),
        Commands::Demo { value } => demo(config, value),
    }
}

fn init_config(output: &Path) -> anyhow::Result<()> {
    if output.exists() {
        anyhow::bail!("Refusing to overwrite existing file '{}'", output.display());
    }
    SluiceConfig::default().to_file(output)?;
    print_success(&format!("Wrote default configuration to {}", output.display()));
    Ok(())
}

/// Build proposal calls from command-line strings.
pub fn parse_calls(targets: &[String], values: &[u64], payloads: &[String]) -> anyhow::Result<ProposalCalls> {
    let targets = targets
        .iter()
        .map(|t| t.parse::<Address>().with_context(|| format!("Invalid target address '{}'", t)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let values: Vec<Amount> = if values.is_empty() {
        vec![0; targets.len()]
    } else {
        values.iter().map(|v| Amount::from(*v)).collect()
    };
    let payloads = if payloads.is_empty() {
        vec![Vec::new(); targets.len()]
    } else {
        payloads
            .iter()
            .map(|p| {
                let digits = p.strip_prefix("0x").unwrap_or(p);
                hex::decode(digits).with_context(|| format!("Invalid hex payload '{}'", p))
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };
    Ok(ProposalCalls::new(targets, values, payloads))
}

fn proposal_id(
    index: Index,
    targets: &[String],
    values: &[u64],
    payloads: &[String],
    description: &str,
) -> anyhow::Result<()> {
    let calls = parse_calls(targets, values, payloads)?;
    calls.validate(index)?;
    let dh = description_hash(description);
    let id = hash_proposal(index, &calls, &dh);

    println!("Proposal ID:      {}", format_hash(&id));
    println!("Description hash: {}", format_hash(&dh));
    Ok(())
}

#[derive(Serialize)]
struct NodeReport {
    node: usize,
    address: Address,
    balance: Amount,
}

#[derive(Serialize)]
struct TreeReport {
    book: Address,
    token: Address,
    nodes: Vec<NodeReport>,
    splits: Vec<SplitPlan>,
}

/// Deploy and fund the tree described by `config`, returning the report.
fn run_tree(config: &TreeConfig) -> anyhow::Result<TreeReport> {
    let deployer = Address::from_label("deployer");
    let mut world = World::default();
    let shares = config.tree_shares()?;

    let tree = RevenueTree::deploy(&mut world, deployer, config.node_amount, &shares)?;
    info!(nodes = tree.nodes.len(), shares = shares.len(), "tree deployed");
    let splits = tree.distribute(&mut world, deployer, Amount::from(config.amount))?;

    let token = world.token(&tree.token)?;
    let nodes = tree
        .nodes
        .iter()
        .enumerate()
        .map(|(node, address)| NodeReport {
            node,
            address: *address,
            balance: token.balance_of(address),
        })
        .collect();
    Ok(TreeReport {
        book: tree.book,
        token: tree.token,
        nodes,
        splits,
    })
}

fn tree(file: &Path, json: bool) -> anyhow::Result<()> {
    let config = TreeConfig::from_file(file)?;
    let report = run_tree(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_header("Revenue-share tree");
    print_info(&format!(
        "{} nodes, {} share entries, {} funded",
        config.node_amount,
        config.shares.len(),
        format_amount(Amount::from(config.amount))
    ));
    println!("Book:  {}", report.book);
    println!("Token: {}", report.token);
    println!();
    for plan in &report.splits {
        // node i splits share index i
        let address = report
            .nodes
            .iter()
            .find(|n| n.node as Index == plan.index)
            .map(|n| n.address)
            .unwrap_or(Address::ZERO);
        print_split(&address, plan);
    }
    println!();
    let balances: Vec<(String, Address, Amount)> = report
        .nodes
        .iter()
        .map(|n| (format!("valve-{}", n.node), n.address, n.balance))
        .collect();
    print_balance_table(&balances);
    Ok(())
}

fn demo(config: &SluiceConfig, value: u64) -> anyhow::Result<()> {
    let deployment_config = config.deployment();
    let mut world = World::default();
    let owner = Address::from_label("owner");
    let d = Deployment::standard(&mut world, owner, deployment_config)?;
    let root = d.root_treasury()?;

    print_header("Deployment");
    println!("Voting ledger: {}", d.votes);
    println!("Registry:      {}", d.registry);
    println!("Governor:      {}", d.governor);
    println!("Treasury 0:    {}", root);
    println!("Store:         {}", d.store);
    println!();

    print_header("Governance");
    let description = format!("Proposal #1 {} in the Box!", value);
    let calls = ProposalCalls::single(d.store, Call::Store { value: Amount::from(value) }.encode()?);
    let id = world.propose(owner, d.governor, 0, calls.clone(), &description)?;
    println!("Proposed {}", format_hash(&id));
    println!("State: {}", format_state(world.state(&d.governor, 0, &id)?));

    world.mine(deployment_config.governor.voting_delay + 1);
    let weight = world.cast_vote_with_reason(owner, d.governor, 0, &id, 1, "demo")?;
    println!("Voted For with weight {}", format_amount(weight));
    println!("State: {}", format_state(world.state(&d.governor, 0, &id)?));

    world.mine(deployment_config.governor.voting_period + 1);
    println!("State: {}", format_state(world.state(&d.governor, 0, &id)?));

    let dh = description_hash(&description);
    let batch = world.queue(d.governor, 0, &calls, &dh)?;
    println!("Queued on {} with eta {}", format_address(&batch.treasury), batch.eta);

    world.advance_time(deployment_config.min_delay);
    world.mine(1);
    world.execute(d.governor, 0, &calls, &dh)?;
    println!("State: {}", format_state(world.state(&d.governor, 0, &id)?));
    print_success(&format!("Store now holds {}", world.store(&d.store)?.retrieve()));
    println!();

    print_header("Split");
    let (second, third) = (Address::from_label("second"), Address::from_label("third"));
    for to in [second, third] {
        world.send(owner, d.votes, 0, Call::VotesTransfer { from: owner, to, index: 0, amount: 300_000 })?;
    }
    world.send(owner, d.token, 0, Call::TokenMint { to: root, amount: 1_000_000 })?;
    let plan = world.split(owner, root, d.token)?;
    print_split(&root, &plan);

    let token = world.token(&d.token)?;
    let balances: Vec<(String, Address, Amount)> = [("owner", owner), ("second", second), ("third", third), ("treasury", root)]
        .into_iter()
        .map(|(name, addr)| (name.to_string(), addr, token.balance_of(&addr)))
        .collect();
    print_balance_table(&balances);
    Ok(())
}
