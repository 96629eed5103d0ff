use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::time::timeout;

use natter::bot::Bot;
use natter::catalog;
use natter::chores::ChoreSet;
use natter::cli::Args;
use natter::config::Config;
use natter::error::Result;
use natter::followers::Reconciler;
use natter::pipeline::dispatcher::Dispatcher;
use natter::platform::http::{DEFAULT_API_BASE, HttpApi};
use natter::platform::{DryRunApi, Fetcher, MicroblogApi};
use natter::state::{ChoreLedger, MessageMarker};

/// A run that has not finished by now is wedged on something and gets
/// killed rather than left to hold the marker lock forever.
const WATCHDOG: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.log_directive())),
        )
        .with_target(false)
        .init();

    match timeout(WATCHDOG, run(args)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("natter: {e}");
            std::process::exit(1);
        }
        Err(_) => {
            eprintln!("natter: watchdog expired after {}s", WATCHDOG.as_secs());
            std::process::exit(1);
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let state_dir = args.state_dir();
    let config = Config::load(args.config_path())?;
    config.verify()?;
    let creds = config.user_credentials(&args.user)?;

    let base =
        std::env::var("NATTER_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
    let http = Arc::new(HttpApi::new(base, creds.key, creds.secret));
    let fetcher: Arc<dyn Fetcher> = http.clone();
    let api: Arc<dyn MicroblogApi> = if args.debug {
        Arc::new(DryRunApi::new(http))
    } else {
        http
    };

    let marker = MessageMarker::acquire(state_dir.join("lastmessage"))?;
    let ledger = ChoreLedger::new(state_dir.join("chores"));

    let dispatcher = Dispatcher::new(
        &args.user,
        catalog::default_commands(fetcher.clone()),
        catalog::default_triggers(fetcher.clone()),
        catalog::default_chatter(),
    );
    let chores = if args.debug {
        // Chore stamps are real state; a debug run must not burn the
        // day's chores.
        ChoreSet::new(vec![])
    } else {
        catalog::default_chores(fetcher)
    };
    let reconciler = Reconciler::new(api.clone(), args.debug);

    let bot = Bot::new(
        api,
        &args.user,
        dispatcher,
        chores,
        reconciler,
        config,
        marker,
        ledger,
        args.debug,
    );
    bot.run().await
}
