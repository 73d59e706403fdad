use argh::FromArgs;

/// IoP SPV peer connectivity tool.
#[derive(FromArgs)]
pub struct Cli {
    #[argh(subcommand)]
    pub command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
pub enum Command {
    Scan(ScanArgs),
}

/// Connect to the IoP P2P network and report on the peers found.
#[derive(FromArgs)]
#[argh(subcommand, name = "scan")]
pub struct ScanArgs {
    /// keep scanning indefinitely instead of exiting once the pool fills or the timeout elapses
    #[argh(switch, short = 'c')]
    pub continuous: bool,

    /// comma-separated `host:port` list to connect to, instead of resolving a DNS seed
    #[argh(option, short = 'i')]
    pub ips: Option<String>,

    /// target number of simultaneously connected peers
    #[argh(option, short = 'm', default = "3")]
    pub maxnodes: usize,

    /// use the IoP test network
    #[argh(switch, short = 't')]
    pub testnet: bool,

    /// use a local regression-test network (implies no DNS seed; pass -i)
    #[argh(switch, short = 'r')]
    pub regtest: bool,

    /// enable debug-level logging
    #[argh(switch, short = 'd')]
    pub debug: bool,

    /// write a peer report to this path, or "0" to skip writing one
    #[argh(option, short = 'f', default = "String::from(\"0\")")]
    pub file: String,

    /// seconds to scan before exiting when not running with -c
    #[argh(option, short = 's', default = "30")]
    pub timeout: u64,
}
