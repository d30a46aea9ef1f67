mod backend;
mod config;
mod console;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::PlanetId;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::{self, error::RecvError},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use transfer_core::{
    ExplorerDetailView, SubmitOutcome, TokioTimer, TracingAnalytics, TransferCollaborators,
    TransferController, TransferEvent,
};
use url::Url;

use crate::{
    backend::{SimulatedLedger, StaticPlanetary, StaticSession},
    config::{load_settings, ResolvedSettings},
    console::{ConsoleCommand, HELP},
};

#[derive(Parser, Debug)]
#[command(about = "Send assets from the wallet, with optional bridging to other planets")]
struct Cli {
    /// Path to a TOML settings file. Defaults to ./launcher.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit one transfer and wait for its confirmation.
    Send {
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = "")]
        memo: String,
        /// Destination planet id; a bridge is used when it differs from the current one.
        #[arg(long)]
        planet: Option<String>,
    },
    /// Drive the transfer form line by line from stdin.
    Interactive,
    /// List the planets a transfer can target.
    Planets,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let resolved = settings.resolve()?;
    let controller = build_controller(&resolved)?;
    info!(
        planet = %resolved.planet.id,
        sender = %resolved.sender,
        bridges = resolved.bridges.len(),
        "launcher ready"
    );

    match cli.command {
        Command::Send {
            recipient,
            amount,
            memo,
            planet,
        } => send_once(&controller, &recipient, &amount, &memo, planet).await,
        Command::Interactive => run_console(Arc::new(controller)).await,
        Command::Planets => {
            print_planets(&controller);
            Ok(())
        }
    }
}

fn build_controller(resolved: &ResolvedSettings) -> Result<TransferController> {
    let detail_view = ExplorerDetailView::new(
        &resolved.explorer_url,
        Box::new(|url: &Url| {
            println!("explorer: {url}");
            Ok(())
        }),
    )
    .context("invalid explorer url")?;

    let collaborators = TransferCollaborators {
        session: Arc::new(StaticSession::new(
            resolved.sender,
            resolved.private_key.clone(),
        )),
        transfer: Arc::new(SimulatedLedger::new(
            resolved.balance,
            resolved.confirm_delay,
            resolved.simulated_outcome,
        )),
        planetary: Arc::new(StaticPlanetary::new(
            resolved.planet.clone(),
            resolved.bridges.clone(),
        )),
        detail_view: Arc::new(detail_view),
        analytics: Arc::new(TracingAnalytics),
        timer: Arc::new(TokioTimer::try_current()?),
    };
    Ok(TransferController::new(
        collaborators,
        resolved.transfer.clone(),
    ))
}

fn fill_form(controller: &TransferController, recipient: &str, amount: &str, memo: &str) {
    controller.focus_recipient();
    controller.set_recipient(recipient);
    controller.blur_recipient();
    controller.focus_amount();
    controller.set_amount(amount);
    controller.blur_amount();
    controller.focus_memo();
    controller.set_memo(memo);
    controller.blur_memo();
}

async fn send_once(
    controller: &TransferController,
    recipient: &str,
    amount: &str,
    memo: &str,
    planet: Option<String>,
) -> Result<()> {
    fill_form(controller, recipient, amount, memo);
    if let Some(planet) = planet {
        controller.select_target_planet(PlanetId(planet));
    }

    let view = controller.snapshot();
    if view.warnings.any() {
        bail!("form has invalid fields: {:?}", view.warnings);
    }

    let mut events = controller.subscribe_events();
    let tx_id = match controller.submit().await {
        SubmitOutcome::Submitted(tx_id) => tx_id,
        SubmitOutcome::Ignored(reason) => bail!("transfer not submitted: {reason:?}"),
        SubmitOutcome::Rejected { alert } => bail!(alert),
        SubmitOutcome::Failed(message) => bail!("transfer failed: {message}"),
    };
    println!("broadcast {tx_id}; waiting for confirmation");

    let confirmation = loop {
        match events.recv().await {
            Ok(TransferEvent::Confirmed(confirmation)) if confirmation.tx_id == tx_id => {
                break confirmation
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
            Err(RecvError::Closed) => bail!("controller stopped before confirmation"),
        }
    };

    if !confirmation.status.is_success() {
        bail!(
            "transaction {tx_id} did not succeed: {:?} at block {}",
            confirmation.status,
            confirmation.block_index
        );
    }
    println!(
        "confirmed {tx_id} in block #{} ({})",
        confirmation.block_index, confirmation.block_hash
    );
    controller.open_detail_view();
    Ok(())
}

fn print_planets(controller: &TransferController) {
    if !controller.planet_selector_visible() {
        println!("no bridges configured; transfers stay on the current planet");
    }
    for option in controller.planet_options() {
        let marker = if option.is_current { "*" } else { " " };
        println!("{marker} {} {}", option.id, option.name);
    }
}

async fn print_events(mut events: broadcast::Receiver<TransferEvent>) {
    loop {
        match events.recv().await {
            Ok(TransferEvent::PhaseChanged { attempt, phase }) => {
                println!("[attempt {attempt}] phase {phase:?}");
            }
            Ok(TransferEvent::DebounceChanged(active)) => {
                if !active {
                    println!("send is available again");
                }
            }
            Ok(TransferEvent::Alert(message)) => println!("alert: {message} (type 'ack')"),
            Ok(TransferEvent::Confirmed(confirmation)) => println!(
                "{} {:?} in block #{}",
                confirmation.tx_id, confirmation.status, confirmation.block_index
            ),
            Ok(TransferEvent::SubmissionFailed { attempt, message }) => {
                println!("[attempt {attempt}] failed: {message}");
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn run_console(controller: Arc<TransferController>) -> Result<()> {
    let printer = tokio::spawn(print_events(controller.subscribe_events()));
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(console::ConsoleError::Empty) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        match command {
            ConsoleCommand::Recipient(value) => {
                controller.focus_recipient();
                controller.set_recipient(&value);
                controller.blur_recipient();
            }
            ConsoleCommand::Amount(value) => {
                controller.focus_amount();
                controller.set_amount(&value);
                controller.blur_amount();
            }
            ConsoleCommand::Memo(value) => {
                controller.focus_memo();
                controller.set_memo(&value);
                controller.blur_memo();
            }
            ConsoleCommand::Planet(id) => controller.select_target_planet(PlanetId(id)),
            ConsoleCommand::Planets => print_planets(&controller),
            ConsoleCommand::Send => match controller.submit().await {
                SubmitOutcome::Submitted(tx_id) => println!("broadcast {tx_id}"),
                SubmitOutcome::Ignored(reason) => println!("not submitted: {reason:?}"),
                SubmitOutcome::Rejected { .. } => {}
                SubmitOutcome::Failed(message) => println!("failed: {message}"),
            },
            ConsoleCommand::Detail => {
                if controller.open_detail_view().is_none() {
                    println!("no transaction yet");
                }
            }
            ConsoleCommand::Close => {
                if !controller.dismiss_result() {
                    println!("nothing to close");
                }
            }
            ConsoleCommand::Ack => match controller.acknowledge_alert() {
                Some(alert) => println!("acknowledged: {alert}"),
                None => println!("no pending alert"),
            },
            ConsoleCommand::Show => {
                println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
            }
            ConsoleCommand::Balance => match controller.balance().await {
                Ok(balance) => println!("{balance} {}", controller.settings().currency),
                Err(err) => println!("balance unavailable: {err}"),
            },
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => break,
        }
    }

    printer.abort();
    Ok(())
}
