//! `scan`: connect to an IoP chain's P2P network, drive the handshake with
//! a target number of peers, and report on what was found.
//!
//! This binary is a thin ambient-stack consumer of the `p2p`/`net-poll`
//! crates: it wires chain parameters, callback hooks, and a reactor
//! together the same way `iop-spv.c`'s `scan` command exercises the
//! original C core, but holds none of the interesting logic itself.
mod args;
mod error;

use std::fs;
use std::io::Write as _;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use argh::FromArgs;

use iop_common::{ChainParams, Network, PeerState};
use iop_net_poll::Reactor;
use iop_p2p::{Group, Hooks};

use crate::args::{Cli, Command};
use crate::error::Error;

fn main() -> ExitCode {
    let cli: Cli = argh::from_env();
    let Command::Scan(args) = cli.command;

    init_logging(args.debug);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();
}

fn chain_params(args: &args::ScanArgs) -> (Network, ChainParams) {
    if args.testnet {
        (Network::Testnet, ChainParams::testnet())
    } else if args.regtest {
        (Network::Regtest, ChainParams::regtest())
    } else {
        (Network::Mainnet, ChainParams::mainnet())
    }
}

fn run(args: args::ScanArgs) -> Result<(), Error> {
    let (network, params) = chain_params(&args);
    log::info!("scanning {network} (maxnodes={}, timeout={}s)", args.maxnodes, args.timeout);

    let mut group = Group::new(params, "/iop-spv-scan:0.1.0/");
    group.set_desired_connected(args.maxnodes);

    let handshaken = Arc::new(AtomicUsize::new(0));
    let target = args.maxnodes;
    let continuous = args.continuous;

    let mut reactor = Reactor::new()?;
    let shutdown_handle = reactor.handle();

    let mut hooks = Hooks::default();
    {
        let handshaken = handshaken.clone();
        let shutdown_handle = shutdown_handle.clone();
        hooks.handshake_done = Some(Arc::new(move |peer| {
            let done = handshaken.fetch_add(1, Ordering::SeqCst) + 1;
            log::info!(
                "peer {} handshake complete: height={} user_agent={:?} ({done}/{target})",
                peer.id,
                peer.best_known_height,
                peer.user_agent,
            );
            if !continuous && done >= target {
                if let Err(err) = shutdown_handle.shutdown() {
                    log::warn!("failed to signal shutdown: {err}");
                }
            }
        }));
    }
    {
        let shutdown_handle = shutdown_handle.clone();
        hooks.connection_state_changed = Some(Arc::new(move |peer| {
            if peer.state.intersects(PeerState::ERRORED | PeerState::DISCONNECTED | PeerState::MISBEHAVED) {
                log::debug!("peer {} dropped: {:?}", peer.id, peer.state);
                let _ = &shutdown_handle;
            }
        }));
    }
    group.set_hooks(hooks);

    let attempted = group.add_peers_from_seed(args.ips.as_deref())?;
    if !attempted {
        log::warn!("no peers to connect to");
    }
    log::info!("{} candidate peer(s) discovered", group.peers().len());

    let now = iop_net::LocalTime::now();
    group.connect_next_nodes(&mut reactor, now);

    if !continuous {
        let timeout_handle = shutdown_handle.clone();
        let timeout = Duration::from_secs(args.timeout);
        thread::spawn(move || {
            thread::sleep(timeout);
            let _ = timeout_handle.shutdown();
        });
    }

    spawn_interrupt_handler(shutdown_handle)?;

    reactor.run(&mut group)?;

    report(&group, &args.file)?;

    let connected = group.count_in_state(PeerState::CONNECTED);
    log::info!("scan finished: {connected} peer(s) connected, {} handshaken", handshaken.load(Ordering::SeqCst));

    Ok(())
}

fn spawn_interrupt_handler(handle: iop_net_poll::Handle) -> Result<(), Error> {
    let mut signals = signal_hook::iterator::Signals::new([signal_hook::consts::SIGINT])?;
    thread::spawn(move || {
        if signals.forever().next().is_some() {
            log::info!("received interrupt, shutting down");
            let _ = handle.shutdown();
        }
    });
    Ok(())
}

fn report(group: &Group, path: &str) -> Result<(), Error> {
    if path == "0" {
        return Ok(());
    }

    let mut out = String::new();
    for peer in group.peers() {
        out.push_str(&format!(
            "{}\t{:?}\theight={}\tuser_agent={:?}\n",
            peer.addr, peer.state, peer.best_known_height, peer.user_agent
        ));
    }

    let mut file = fs::File::create(path).map_err(|source| Error::WriteFile {
        path: path.to_string(),
        source,
    })?;
    file.write_all(out.as_bytes()).map_err(|source| Error::WriteFile {
        path: path.to_string(),
        source,
    })?;
    Ok(())
}
