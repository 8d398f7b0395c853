//! BETPILOT — Autonomous Scheduled Sports-Betting Agent
//!
//! Entry point. Loads configuration, initialises structured logging,
//! resolves the invocation trigger from the inbound payload, and runs
//! either the discovery or the placement flow with guaranteed cleanup:
//! browser teardown and fired-schedule deletion happen regardless of how
//! the run terminates, and every terminal state produces exactly one
//! outbound notification.

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use betpilot::browser::webdriver::WebDriverUi;
use betpilot::browser::{login, UiDriver};
use betpilot::config::AppConfig;
use betpilot::engine::orchestrator::{Orchestrator, RunReport};
use betpilot::external::notify::{
    body_not_logged_in, body_uncaught_exception, WebhookNotifier, SUBJECT_ERROR,
};
use betpilot::external::scheduler::HttpScheduler;
use betpilot::external::secrets::{EnvSecrets, Secrets};
use betpilot::external::{Notification, Notifier, Scheduler, SecretsProvider};
use betpilot::session::Session;
use betpilot::types::{BotError, InvocationPayload, Trigger};

const BANNER: &str = r#"
 ____  _____ _____ ____ ___ _     ___ _____
| __ )| ____|_   _|  _ \_ _| |   / _ \_   _|
|  _ \|  _|   | | | |_) | || |  | | | || |
| |_) | |___  | | |  __/| || |__| |_| || |
|____/|_____| |_| |_|  |___|_____\___/ |_|

  Scheduled Sports-Betting Agent
  v0.1.0 — Discovery & Placement Runs
"#;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;
    init_logging();
    println!("{BANNER}");

    let trigger = read_invocation()?.into_trigger()?;
    let secrets = EnvSecrets.get(&cfg.agent.secret_id)?;
    let notifier = WebhookNotifier::new(&cfg.notifications, secrets.notify_token.clone())?;
    let scheduler = HttpScheduler::new(&cfg.scheduler, secrets.scheduler_token.clone())?;

    info!(
        agent = %cfg.agent.name,
        trigger = trigger_kind(&trigger),
        "BETPILOT starting up"
    );

    let outcome = execute(&cfg, &trigger, &secrets, &scheduler, &notifier).await;

    // A fired placement schedule must never re-fire, whatever happened above.
    if let Trigger::Placement(job) = &trigger {
        if let Err(e) = scheduler.delete(&job.schedule_name).await {
            warn!(schedule = %job.schedule_name, error = %e, "Failed to delete fired schedule");
        }
    }

    match outcome {
        Ok(report) => log_report(&report),
        Err(e) => report_failure(&cfg, &notifier, e).await,
    }

    Ok(())
}

/// Open the browser, run the trigger, and tear the browser down
/// best-effort regardless of the outcome.
async fn execute(
    cfg: &AppConfig,
    trigger: &Trigger,
    secrets: &Secrets,
    scheduler: &dyn Scheduler,
    notifier: &dyn Notifier,
) -> Result<RunReport> {
    let driver = WebDriverUi::connect(&cfg.driver, secrets.proxy.as_ref()).await?;
    let outcome = run_with_driver(cfg, &driver, trigger, secrets, scheduler, notifier).await;
    if let Err(e) = driver.quit().await {
        warn!(error = %e, "Browser teardown failed");
    }
    outcome
}

async fn run_with_driver(
    cfg: &AppConfig,
    driver: &dyn UiDriver,
    trigger: &Trigger,
    secrets: &Secrets,
    scheduler: &dyn Scheduler,
    notifier: &dyn Notifier,
) -> Result<RunReport> {
    login::login(driver, cfg, secrets)
        .await
        .map_err(|e| BotError::Authentication(format!("login flow failed: {e:#}")))?;

    let session = Session::bind(driver, cfg, secrets.proxy.as_ref()).await?;
    let orchestrator = Orchestrator::new(cfg, &session, scheduler, notifier);

    match trigger {
        Trigger::Discovery => orchestrator.run_discovery().await,
        Trigger::Placement(job) => orchestrator.run_placement(driver, job).await,
    }
}

/// Map a run failure to its single outbound notification. Login/session
/// failures get the short operator message; anything else ships the full
/// error chain as a diagnostic attachment. The process still exits cleanly.
async fn report_failure(cfg: &AppConfig, notifier: &dyn Notifier, error: anyhow::Error) {
    error!(error = ?error, "Run failed");

    let notification = match error.downcast_ref::<BotError>() {
        Some(BotError::Authentication(_)) => {
            Notification::new(SUBJECT_ERROR, body_not_logged_in())
        }
        _ => {
            let diagnostics = format!("{error:?}");
            let path =
                std::path::Path::new(&cfg.agent.diagnostics_dir).join("betpilot-failure.txt");
            if let Err(write_err) = std::fs::write(&path, &diagnostics) {
                warn!(error = %write_err, path = %path.display(), "Failed to write diagnostics file");
            }
            Notification::new(SUBJECT_ERROR, body_uncaught_exception())
                .with_attachment("betpilot-failure.txt", diagnostics)
        }
    };

    if let Err(notify_err) = notifier.notify(&notification).await {
        error!(error = %notify_err, "Failed to send failure notification");
    }
}

/// Read the invocation payload: a JSON document path as the first argument,
/// or nothing at all for a plain discovery run.
fn read_invocation() -> Result<InvocationPayload> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read invocation payload: {path}"))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse invocation payload: {path}"))
        }
        None => Ok(InvocationPayload::default()),
    }
}

fn trigger_kind(trigger: &Trigger) -> &'static str {
    match trigger {
        Trigger::Discovery => "discovery",
        Trigger::Placement(_) => "placement",
    }
}

fn log_report(report: &RunReport) {
    match report {
        RunReport::BalanceExhausted { balance } => {
            info!(%balance, "Run abandoned: balance exhausted")
        }
        RunReport::MatchesScheduled { count } => info!(count, "Run complete: matches scheduled"),
        RunReport::BetPlaced { live_odd } => info!(%live_odd, "Run complete: bet placed"),
        RunReport::OddsChanged { scheduled, live } => {
            info!(%scheduled, %live, "Run complete: odds changed, bet not placed")
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("betpilot=info"));

    let json_logging = std::env::var("BETPILOT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
