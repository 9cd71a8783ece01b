// src/cli.rs
use anyhow::{anyhow, bail, Result};

pub const USAGE: &str = "\
crypto-sentiment-agent: news -> sentiment -> trading signals -> social/ledger

USAGE:
    crypto-sentiment-agent [OPTIONS]

OPTIONS:
    --run-once                  Run a single cycle and exit
    --no-social                 Disable the social sink
    --no-ledger                 Disable the ledger sink
    --deploy-contract           Deploy a new tracker contract before starting
    --contract-name <NAME>      Name for --deploy-contract [default: CryptoSentimentTracker]
    --contract-address <ADDR>   Use an existing tracker contract
    --network <NAME>            Ledger network passed to the relay
    --history <ASSET>           Print recorded sentiment for ASSET and exit
    -h, --help                  Print this help
";

pub const DEFAULT_CONTRACT_NAME: &str = "CryptoSentimentTracker";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub run_once: bool,
    pub no_social: bool,
    pub no_ledger: bool,
    pub deploy_contract: bool,
    pub contract_name: String,
    pub contract_address: Option<String>,
    pub network: Option<String>,
    pub history: Option<String>,
    pub help: bool,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            run_once: false,
            no_social: false,
            no_ledger: false,
            deploy_contract: false,
            contract_name: DEFAULT_CONTRACT_NAME.to_string(),
            contract_address: None,
            network: None,
            history: None,
            help: false,
        }
    }
}

impl Cli {
    pub fn from_env() -> Result<Self> {
        Self::parse(std::env::args().skip(1))
    }

    /// Parses arguments without the program name. Accepts `--flag value` and
    /// `--flag=value`.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cli = Cli::default();
        let mut it = args.into_iter().map(Into::into);

        while let Some(arg) = it.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
                _ => (arg.clone(), None),
            };
            let mut value = |name: &str| -> Result<String> {
                let v = match &inline {
                    Some(v) => v.clone(),
                    None => it.next().ok_or_else(|| anyhow!("{name} needs a value"))?,
                };
                if v.trim().is_empty() {
                    bail!("{name} needs a non-empty value");
                }
                Ok(v)
            };

            match flag.as_str() {
                "--run-once" => cli.run_once = true,
                "--no-social" => cli.no_social = true,
                "--no-ledger" => cli.no_ledger = true,
                "--deploy-contract" => cli.deploy_contract = true,
                "--contract-name" => cli.contract_name = value("--contract-name")?,
                "--contract-address" => cli.contract_address = Some(value("--contract-address")?),
                "--network" => cli.network = Some(value("--network")?),
                "--history" => cli.history = Some(value("--history")?),
                "-h" | "--help" => cli.help = true,
                other => bail!("unknown argument: {other}\n\n{USAGE}"),
            }
        }

        if cli.deploy_contract && cli.contract_address.is_some() {
            bail!("--deploy-contract and --contract-address are mutually exclusive");
        }
        if cli.deploy_contract && cli.no_ledger {
            bail!("--deploy-contract cannot be combined with --no-ledger");
        }
        Ok(cli)
    }

    /// A deploy happens only when asked for and no contract address is
    /// configured yet (e.g. through `CONTRACT_ADDRESS`).
    pub fn should_deploy(&self, configured_address: Option<&str>) -> bool {
        self.deploy_contract && !self.no_ledger && configured_address.is_none()
    }
}
