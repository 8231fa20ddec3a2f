//! Surge command-line interface

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use surge_config::{ConfigLoader, SurgeConfig};
use surge_core::{RunReport, RunRequest, StopReason, TenantTier};
use surge_execution::CancelToken;
use surge_ramp::{
    save_detached, HttpBatchDispatcher, HttpReportSink, OrchestratorConfig, RampOrchestrator,
    ReportSink,
};
use surge_server::AppContext;

#[derive(Parser)]
#[command(name = "surge", about = "Distributed HTTP load-generation engine", version)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the execution-tier and control-plane server
    Serve,

    /// Plan and execute a ramp run
    Run {
        /// Target URL
        url: String,

        /// Total request budget for the run
        #[arg(long, default_value_t = 1_000)]
        budget: u64,

        /// Target concurrency to ramp to
        #[arg(long, default_value_t = 50)]
        concurrency: u32,

        /// Tenant tier (free, pro, scale)
        #[arg(long, default_value = "free", value_parser = parse_tier)]
        tier: TenantTier,

        /// Confirm a high-concurrency run
        #[arg(long)]
        confirm: bool,

        /// Control-plane endpoint; omit to run a standalone in-process server
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Print a sample configuration file
    SampleConfig,
}

fn parse_tier(value: &str) -> Result<TenantTier, String> {
    match value.to_lowercase().as_str() {
        "free" => Ok(TenantTier::Free),
        "pro" => Ok(TenantTier::Pro),
        "scale" => Ok(TenantTier::Scale),
        other => Err(format!("unknown tier '{}' (expected free, pro, scale)", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Command::SampleConfig) {
        println!("{}", SurgeConfig::generate_sample());
        return Ok(());
    }

    let config = ConfigLoader::new()
        .load(cli.config.as_ref())
        .context("failed to load configuration")?;

    init_logging(&config);

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Run {
            url,
            budget,
            concurrency,
            tier,
            confirm,
            endpoint,
        } => {
            let request = RunRequest {
                url,
                total_request_budget: budget,
                target_concurrency: concurrency,
                tenant_tier: tier,
                confirmed_high_load: confirm,
            };
            run(config, request, endpoint).await
        }
        Command::SampleConfig => unreachable!(),
    }
}

fn init_logging(config: &SurgeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn serve(config: SurgeConfig) -> Result<()> {
    if config.auth.token_secret.is_empty() {
        bail!("auth.token_secret is required in server mode (set SURGE_TOKEN_SECRET)");
    }
    let server = config.server.clone().unwrap_or_default();
    let context = AppContext::from_config(&config)?;
    surge_server::serve(context, &server.listen_addr()).await?;
    Ok(())
}

/// Spin up an in-process server on an ephemeral port and return its base URL.
async fn standalone_endpoint(config: &mut SurgeConfig) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base = format!("http://{}", listener.local_addr()?);

    // A standalone run signs tokens only for itself.
    if config.auth.token_secret.is_empty() {
        config.auth.token_secret = std::iter::repeat_with(fastrand::alphanumeric).take(32).collect();
    }

    let mut server = config.server.clone().unwrap_or_default();
    server.public_url = base.clone();
    server.allow_loopback_targets = true;
    config.server = Some(server);

    let context = AppContext::from_config(config)?;
    tokio::spawn(async move {
        if let Err(e) = surge_server::serve_with_listener(listener, context).await {
            warn!("standalone server stopped: {}", e);
        }
    });

    Ok(base)
}

async fn run(mut config: SurgeConfig, request: RunRequest, endpoint: Option<String>) -> Result<()> {
    let base = match endpoint {
        Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
        None => standalone_endpoint(&mut config).await?,
    };

    // Run start: rejections carry structured reasons, surface them as-is.
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/v1/runs", base))
        .json(&request)
        .send()
        .await
        .context("control plane unreachable")?;

    if !response.status().is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        bail!(
            "run rejected ({}): {}",
            body["error"]["code"].as_str().unwrap_or("unknown"),
            body["error"]["message"].as_str().unwrap_or("no detail")
        );
    }
    let grant: surge_core::RunGrant = response.json().await.context("malformed grant")?;

    for warning in &grant.warnings {
        warn!("{}", warning);
    }
    println!("run {} granted against {}", grant.run_id, grant.resolved_target_url);

    let dispatcher = Arc::new(HttpBatchDispatcher::new(
        grant.execution_endpoint.clone(),
        grant.cancel_endpoint.clone(),
        grant.token.clone(),
    ));
    let orchestrator = RampOrchestrator::new(dispatcher.clone(), OrchestratorConfig::from(&config.load));
    let sink: Arc<dyn ReportSink> = Arc::new(HttpReportSink::new(base.clone()));

    // First interrupt cancels cooperatively; a second one abandons the
    // run, saving a stub report so it is not silently lost.
    let cancel = CancelToken::new();
    spawn_interrupt_handler(cancel.clone(), dispatcher.clone(), sink.clone(), &grant);

    let report = orchestrator.execute(&request, &grant, &cancel).await;

    // Persistence is fire-and-forget; wait for the attempt since the
    // process is about to exit, but never surface its failure.
    save_detached(sink, report.clone()).await.ok();
    print_report(&report);

    if report.stop_reason == StopReason::Failed {
        bail!("run failed");
    }
    Ok(())
}

fn spawn_interrupt_handler(
    cancel: CancelToken,
    dispatcher: Arc<HttpBatchDispatcher>,
    sink: Arc<dyn ReportSink>,
    grant: &surge_core::RunGrant,
) {
    use surge_ramp::BatchDispatcher;

    let run_id = grant.run_id.clone();
    let target_url = grant.resolved_target_url.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("interrupt: cancelling run (press again to abandon)");
        cancel.cancel();
        if let Err(e) = dispatcher.cancel(&run_id).await {
            warn!("cancel call failed: {}", e);
        }

        if tokio::signal::ctrl_c().await.is_ok() {
            let now = chrono_now();
            let report = RunReport {
                run_id: run_id.clone(),
                target_url,
                steps: Vec::new(),
                totals: Default::default(),
                stop_reason: StopReason::Abandoned,
                started_at: now,
                finished_at: now,
            };
            save_detached(sink, report).await.ok();
            std::process::exit(130);
        }
    });
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

fn print_report(report: &RunReport) {
    println!();
    println!(
        "{:>12} {:>8} {:>8} {:>8} {:>7} {:>9} {:>9} {:>9}",
        "concurrency", "sent", "ok", "errors", "err%", "p50 ms", "p95 ms", "p99 ms"
    );
    for step in &report.steps {
        println!(
            "{:>12} {:>8} {:>8} {:>8} {:>6.1}% {:>9.1} {:>9.1} {:>9.1}{}",
            step.concurrency,
            step.sent,
            step.ok,
            step.errors,
            step.error_rate * 100.0,
            step.summary.p50,
            step.summary.p95,
            step.summary.p99,
            if step.overloaded { "  [overloaded]" } else { "" }
        );
    }
    println!();
    println!(
        "total: {} sent, {} ok, {} errors in {} ms (stop reason: {})",
        report.totals.sent,
        report.totals.ok,
        report.totals.errors,
        report.totals.duration_ms,
        report.stop_reason
    );
}
