//! CLI configuration.
//!
//! `SluiceConfig` holds the deployment parameters; `TreeConfig` describes a
//! revenue-share tree to deploy and fund.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sluice_governance::{DeploymentConfig, GovernorConfig, TreeHolder, TreeShare};
use sluice_types::Address;

/// Deployment configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SluiceConfig {
    #[serde(default)]
    pub governor: GovernorSection,
    #[serde(default)]
    pub timelock: TimelockSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SluiceConfig {
    /// Load configuration from file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: SluiceConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.governor.quorum_percentage > 100 {
            anyhow::bail!(
                "Quorum percentage {} exceeds 100",
                self.governor.quorum_percentage
            );
        }
        if self.governor.voting_period == 0 {
            anyhow::bail!("Voting period cannot be 0");
        }
        match self.logging.format.as_str() {
            "pretty" | "json" => Ok(()),
            other => anyhow::bail!("Unknown log format '{}', expected pretty or json", other),
        }
    }

    pub fn deployment(&self) -> DeploymentConfig {
        DeploymentConfig {
            governor: GovernorConfig {
                quorum_percentage: self.governor.quorum_percentage,
                voting_period: self.governor.voting_period,
                voting_delay: self.governor.voting_delay,
                proposal_threshold: u128::from(self.governor.proposal_threshold),
            },
            min_delay: self.timelock.min_delay,
            ..DeploymentConfig::default()
        }
    }
}

/// Governor parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorSection {
    /// Percent of past total supply that must vote
    pub quorum_percentage: u64,
    /// Voting period in blocks
    pub voting_period: u64,
    /// Voting delay in blocks
    pub voting_delay: u64,
    pub proposal_threshold: u64,
}

impl Default for GovernorSection {
    fn default() -> Self {
        let defaults = GovernorConfig::default();
        Self {
            quorum_percentage: defaults.quorum_percentage,
            voting_period: defaults.voting_period,
            voting_delay: defaults.voting_delay,
            proposal_threshold: 0,
        }
    }
}

/// Timelock parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelockSection {
    /// Seconds between queueing and execution
    pub min_delay: u64,
}

impl Default for TimelockSection {
    fn default() -> Self {
        Self {
            min_delay: DeploymentConfig::default().min_delay,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive
    pub level: String,
    /// Log format (json|pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

/// Who receives share units: another node of the tree or an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HolderSpec {
    Node(usize),
    Address(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareEntry {
    pub node: usize,
    pub holder: HolderSpec,
    pub units: u64,
}

/// Revenue-share tree description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    pub node_amount: usize,
    /// Tokens minted to node 0 before the cascade
    #[serde(default = "default_tree_amount")]
    pub amount: u64,
    #[serde(default)]
    pub shares: Vec<ShareEntry>,
}

fn default_tree_amount() -> u64 {
    1_000_000_000_000_000_000
}

impl TreeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read tree file '{}': {}", path.display(), e))?;
        let config: TreeConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse tree file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.node_amount == 0 {
            anyhow::bail!("Tree needs at least one node");
        }
        for entry in &self.shares {
            if entry.node >= self.node_amount {
                anyhow::bail!("Share entry for node {} but the tree has {} nodes", entry.node, self.node_amount);
            }
            if let HolderSpec::Node(n) = entry.holder {
                if n >= self.node_amount {
                    anyhow::bail!("Holder node {} out of range", n);
                }
            }
        }
        Ok(())
    }

    /// Resolve holder addresses into tree shares.
    pub fn tree_shares(&self) -> anyhow::Result<Vec<TreeShare>> {
        self.shares
            .iter()
            .map(|entry| {
                let holder = match &entry.holder {
                    HolderSpec::Node(n) => TreeHolder::Node(*n),
                    HolderSpec::Address(s) => TreeHolder::Account(
                        s.parse::<Address>()
                            .map_err(|e| anyhow::anyhow!("Invalid holder address '{}': {}", s, e))?,
                    ),
                };
                Ok(TreeShare {
                    node: entry.node,
                    holder,
                    units: u128::from(entry.units),
                })
            })
            .collect()
    }
}
