//! CLI entry point wiring a real `CloudLlmClient` against `MemoryStore` to
//! exercise the full generate -> autosave -> score pipeline from a terminal,
//! mirroring the runtime crate's own standalone CLI binaries.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use assessment_core::adaptive;
use assessment_core::agent::CancellationToken;
use assessment_core::config::Config;
use assessment_core::generation::GenerationService;
use assessment_core::llm::client::CloudLlmClient;
use assessment_core::llm::InferenceProvider;
use assessment_core::logging;
use assessment_core::scoring::ScoringService;
use assessment_core::store::memory::MemoryStore;
use assessment_core::store::Store;
use assessment_core::tools::{DefaultToolSurface, ToolSurface};
use assessment_core::types::{ProfileSurvey, SelfLevel, SurveyId, UserId};

#[derive(Parser)]
#[command(name = "assessment-eval")]
#[command(about = "Exercise the assessment core against a live LLM provider")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one round of questions for a synthetic profile.
    Generate {
        #[arg(long, default_value = "intermediate")]
        level: String,
        #[arg(long, default_value = "3")]
        years: u32,
        #[arg(long, default_value = "backend engineer")]
        job_role: String,
        #[arg(long, default_value_t = 5)]
        count: u32,
        #[arg(long)]
        interests: Vec<String>,
    },
    /// Run one generate -> synthetic-answer -> score cycle, printing both
    /// the generated items and the final scored round.
    Cycle {
        #[arg(long, default_value = "intermediate")]
        level: String,
        #[arg(long, default_value_t = 5)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let llm_config = config
        .llm
        .clone()
        .context("no LLM API key found; set ASSESSMENT_OPENROUTER_API_KEY, ASSESSMENT_OPENAI_API_KEY, or ASSESSMENT_ANTHROPIC_API_KEY")?;

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let tools: Arc<dyn ToolSurface> = Arc::new(DefaultToolSurface::new(store.clone()));
    let provider: Arc<dyn InferenceProvider> = Arc::new(CloudLlmClient::new(llm_config));
    let generation = GenerationService::new(store.clone(), tools, provider, config.generation.clone());
    let scoring = ScoringService::new(store.clone());

    match cli.command {
        Commands::Generate { level, years, job_role, count, interests } => {
            let (user_id, survey_id) =
                seed_profile(&store, parse_level(&level), years, &job_role, interests).await?;
            let outcome = generation
                .generate_round(user_id, survey_id, 1, count, None, 1_200_000, &CancellationToken::new())
                .await?;
            info!(session_id = %outcome.session_id, items = outcome.questions.len(), "generated round");
            println!("{}", serde_json::to_string_pretty(&outcome.questions)?);
        }
        Commands::Cycle { level, count } => {
            let (user_id, survey_id) =
                seed_profile(&store, parse_level(&level), 3, "backend engineer", vec!["rust".into()]).await?;
            let outcome = generation
                .generate_round(user_id, survey_id, 1, count, None, 1_200_000, &CancellationToken::new())
                .await?;
            for question in &outcome.questions {
                store
                    .autosave(
                        outcome.session_id,
                        question.question_id,
                        serde_json::json!({"selected_key": "A", "text": "placeholder"}),
                        1_000,
                        chrono::Utc::now(),
                    )
                    .await?;
            }
            let scored = scoring.score_round(outcome.session_id, true).await?;
            println!("{}", serde_json::to_string_pretty(&scored)?);

            if let Some(result) = store.latest_round_result(outcome.session_id).await? {
                let profile = store.latest_profile(user_id).await?.expect("profile just seeded");
                let params = adaptive::derive(&profile, profile.self_level.baseline_difficulty(), &result, None);
                println!("next round adaptive params: {}", serde_json::to_string_pretty(&params)?);
            }
        }
    }

    Ok(())
}

async fn seed_profile(
    store: &Arc<dyn Store>,
    level: SelfLevel,
    years: u32,
    job_role: &str,
    interests: Vec<String>,
) -> Result<(UserId, SurveyId)> {
    let user_id = UserId::new();
    let interests: BTreeSet<String> = if interests.is_empty() {
        BTreeSet::from(["rust".to_string()])
    } else {
        interests.into_iter().collect()
    };
    let profile = ProfileSurvey::new(user_id, level, years, job_role, "individual contributor", interests);
    let survey_id = profile.survey_id;
    store.put_profile(profile).await?;
    Ok((user_id, survey_id))
}

fn parse_level(raw: &str) -> SelfLevel {
    match raw.to_lowercase().as_str() {
        "beginner" => SelfLevel::Beginner,
        "advanced" => SelfLevel::Advanced,
        _ => SelfLevel::Intermediate,
    }
}
