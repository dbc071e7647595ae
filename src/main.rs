use ai_llm_service::LlmService;
use ai_llm_service::telemetry::{env_filter_with_level, layer};
use clap::Parser;
use colored::Colorize;
use git_context_engine::review::render::stats_line;
use git_context_engine::{
    InMemoryReviewStore, ProviderClient, ProviderConfig, ReviewConfig, ReviewRunner, ReviewStatus,
};
use tracing::{Level, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_TARGETS: &[&str] = &["ai_llm_service", "git_context_engine", "mr_review"];

/// Reviews one merge request (GitLab) or pull request (GitHub) and posts
/// the findings back to it.
#[derive(Debug, Parser)]
#[command(name = "mr-review", version)]
struct Args {
    /// Project path or numeric id on GitLab, `owner/repo` on GitHub.
    #[arg(long, env = "MR_PROJECT")]
    project: String,

    /// Merge request iid or pull request number.
    #[arg(long, env = "MR_IID")]
    request: u64,

    /// User credited in the summary note.
    #[arg(long, env = "MR_TRIGGERED_BY", default_value = "")]
    user: String,

    /// Review without deleting or posting anything.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    let filter = env_filter_with_level("info", &["git_context_engine"], Level::DEBUG)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(layer(LOG_TARGETS))
        .init();

    let args = Args::parse();

    let provider = ProviderClient::from_config(ProviderConfig::from_env()?)?;
    let model = LlmService::from_env()?;
    let mut cfg = ReviewConfig::from_env()?;
    cfg.dry_run |= args.dry_run;

    info!(
        provider = ?provider.kind(),
        model = %model.config().model,
        dry_run = cfg.dry_run,
        "mr-review starting"
    );

    let runner = ReviewRunner::new(provider, model, cfg).with_store(InMemoryReviewStore::new());
    let outcome = runner
        .run_review(&args.project, args.request, &args.user)
        .await;

    let status = match outcome.status {
        ReviewStatus::Completed => "COMPLETED".green().bold(),
        ReviewStatus::Failed => "FAILED".red().bold(),
        _ => "UNFINISHED".yellow().bold(),
    };
    println!(
        "{} {}!{} {}",
        status,
        args.project,
        args.request,
        stats_line(&outcome.stats).dimmed()
    );
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.status == ReviewStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
