//! tx-dispatcher: queue transactions locally, broadcast them in nonce order.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use tx_dispatcher::{
    DispatchError, Dispatcher, DispatcherConfig, EnqueueRequest, FailureKind, PassReport, ProxyClient,
    QueueStore, TokioClock, WalletSigner,
};

#[derive(Parser)]
#[command(name = "tx-dispatcher", version, about = "Durable, ordered transaction dispatcher")]
struct Cli {
    /// Debug-level logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Queue file location
    #[arg(long, global = true, env = "TX_DISPATCHER_QUEUE_PATH")]
    queue: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append one transaction to the queue
    Enqueue(EnqueueArgs),
    /// Run a single dispatch pass
    Dispatch(DispatchArgs),
    /// Run dispatch passes on an interval until interrupted
    DispatchContinuously(ContinuousArgs),
    /// Remove every queued transaction
    Clean,
    /// Print the queue
    List,
}

#[derive(Args)]
struct EnqueueArgs {
    #[arg(long)]
    receiver: String,
    #[arg(long, default_value = "0")]
    value: String,
    /// Defaults to TX_DISPATCHER_DEFAULT_GAS_PRICE
    #[arg(long)]
    gas_price: Option<String>,
    #[arg(long)]
    gas_limit: String,
    #[arg(long, default_value = "")]
    data: String,
}

#[derive(Args)]
struct DispatchArgs {
    /// JSON-RPC endpoint of the network proxy
    #[arg(long, env = "TX_DISPATCHER_PROXY")]
    proxy: String,
    /// Key file used for signing
    #[arg(long, env = "TX_DISPATCHER_PEM")]
    pem: PathBuf,
}

#[derive(Args)]
struct ContinuousArgs {
    #[command(flatten)]
    target: DispatchArgs,
    /// Seconds between passes
    #[arg(long)]
    interval: u64,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Err(e) = run(cli).await {
        log::error!("{}", e);
        if e.is_retryable() {
            log::error!("This error is transient; the command can be retried.");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), DispatchError> {
    let mut config = DispatcherConfig::from_env()?;
    if let Some(path) = cli.queue {
        config = config.with_queue_path(path);
    }
    let store = QueueStore::new(&config);

    match cli.command {
        Command::Enqueue(args) => {
            let queued = store.enqueue(EnqueueRequest {
                receiver: args.receiver,
                value: Some(args.value),
                gas_price: args.gas_price,
                gas_limit: args.gas_limit,
                data: Some(args.data),
            })?;
            println!("Enqueued #{} -> {}", queued.sequence, queued.receiver);
        }
        Command::Dispatch(args) => {
            let dispatcher = build_dispatcher(&config, store, &args)?;
            let report = dispatcher.run_pass().await?;
            print_report(&report);
            pass_result(&report)?;
        }
        Command::DispatchContinuously(args) => {
            let interval = parse_interval(args.interval)?;
            let dispatcher = build_dispatcher(&config, store, &args.target)?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("[LOOP] Interrupt received, stopping after the current pass");
                    on_interrupt.cancel();
                }
            });

            let summary = tx_dispatcher::run_continuously(
                &dispatcher,
                interval,
                &TokioClock,
                cancel,
            )
            .await;
            println!(
                "Stopped after {} passes: {} transactions accepted, {} passes failed",
                summary.passes, summary.accepted, summary.failed_passes
            );
        }
        Command::Clean => {
            let removed = tx_dispatcher::clean(&store)?;
            println!("Removed {} queued transactions", removed);
        }
        Command::List => {
            let queued = store.read_all()?;
            if queued.is_empty() {
                println!("Queue is empty ({})", store.path().display());
            }
            for tx in queued {
                println!(
                    "#{} -> {} value={} gas_limit={} gas_price={} data={:?} queued_at={}",
                    tx.sequence, tx.receiver, tx.value, tx.gas_limit, tx.gas_price, tx.data, tx.queued_at
                );
            }
        }
    }

    Ok(())
}

fn build_dispatcher(
    config: &DispatcherConfig,
    store: QueueStore,
    args: &DispatchArgs,
) -> Result<Dispatcher, DispatchError> {
    let signer = Arc::new(WalletSigner::from_key_file(&args.pem, config.chain_id)?);
    let proxy = Arc::new(ProxyClient::new(args.proxy.clone(), config.rpc_timeout)?);
    log::info!("[PROXY] Using endpoint {}", proxy.url());

    Ok(Dispatcher::new(store, proxy.clone(), signer, proxy))
}

/// Turn a pass that ended on a failed outcome into the command's error.
fn pass_result(report: &PassReport) -> Result<(), DispatchError> {
    let Some(failure) = report.failure() else {
        return Ok(());
    };
    let message = format!(
        "dispatch stopped at #{} (nonce {}): {}",
        failure.sequence,
        failure.nonce,
        failure.error().unwrap_or("unknown error")
    );
    Err(match report.failure_kind {
        Some(FailureKind::Signing) => DispatchError::Signing(message),
        _ => DispatchError::Network(message),
    })
}

fn parse_interval(secs: u64) -> Result<Duration, DispatchError> {
    if secs == 0 {
        return Err(DispatchError::validation("interval", "must be at least 1 second"));
    }
    Ok(Duration::from_secs(secs))
}

fn print_report(report: &PassReport) {
    if report.is_noop() {
        println!("Queue is empty, nothing to dispatch");
        return;
    }
    for outcome in &report.outcomes {
        println!("{}", outcome);
    }
}
