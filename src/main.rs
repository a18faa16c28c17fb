use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::Client;
use reqwest::redirect::Policy;
use tracing::info;

use sift::config::{self, Config};
use sift::fetch::WebFullText;
use sift::index::CorpusIndex;
use sift::judge::{FindingExtractor, JudgmentCache, RelevanceJudge};
use sift::oracle::GeminiClient;
use sift::providers::{OpenAlexClient, SemanticScholarClient};
use sift::research::{PlanContext, ResearchRun, SubtopicResearcher};
use sift::storage::Database;

type Researcher = SubtopicResearcher<GeminiClient, SemanticScholarClient, OpenAlexClient, WebFullText>;

#[derive(Debug, Parser)]
#[command(version, about = "Gather and judge evidence for research subtopics")]
struct Args {
    #[arg(long, short = 'c', value_name = "FILE", default_value = "sift.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Research one or more subtopics and store what is found.
    Research {
        /// The overall research question.
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "Unknown Section")]
        section: String,
        #[arg(required = true)]
        subtopics: Vec<String>,
    },
    /// Seed the local corpus from the bibliographic APIs.
    Ingest {
        #[arg(long, required_unless_present = "recent", conflicts_with = "recent")]
        query: Option<String>,
        /// Ingest for the N most recent distinct plan queries instead.
        #[arg(long, value_name = "N")]
        recent: Option<usize>,
        #[arg(long, value_name = "N", default_value_t = 5)]
        keywords: usize,
        #[arg(long, value_name = "N", default_value_t = 20)]
        per_keyword: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sift=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let cfg = config::load(&args.config)?;
    let researcher = build_researcher(&cfg)?;

    match args.command {
        Command::Research {
            query,
            section,
            subtopics,
        } => {
            let plan_id = researcher.index().database().save_plan(&query, None)?;
            let budgets = cfg.research.budgets();
            let mut run = ResearchRun::new();
            for subtopic in subtopics {
                let ctx = PlanContext {
                    subtopic,
                    section: section.clone(),
                    query: query.clone(),
                    plan_id: Some(plan_id),
                };
                let outcome = researcher.research_subtopic(&ctx, &budgets, &mut run).await;
                let stored = researcher.index().database().findings_for_subtopic(&ctx.subtopic)?;
                println!(
                    "{}: evaluated {}, relevant {}, findings {}",
                    ctx.subtopic,
                    outcome.evaluated,
                    outcome.relevant,
                    stored.len()
                );
            }
        }
        Command::Ingest {
            query,
            recent,
            keywords,
            per_keyword,
        } => {
            let stored = match (query, recent) {
                (Some(query), _) => researcher.ingest(&query, keywords, per_keyword, None).await,
                (None, Some(limit)) => researcher.ingest_recent(limit, keywords, per_keyword).await,
                (None, None) => 0,
            };
            println!("stored {stored} new documents");
        }
    }

    info!("done");
    Ok(())
}

fn build_researcher(cfg: &Config) -> Result<Researcher, Box<dyn std::error::Error>> {
    let http = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .redirect(Policy::limited(5))
        .build()?;

    let oracle = GeminiClient::from_env(http.clone(), cfg.oracle.model.as_deref())?
        .with_retry(
            cfg.oracle.max_attempts,
            Duration::from_millis(cfg.oracle.initial_backoff_ms),
        );
    info!(model = oracle.model(), "oracle ready");

    let providers = &cfg.providers;
    let mut semantic_scholar = SemanticScholarClient::from_env(http.clone())
        .with_retry(providers.retry_policy(), providers.min_interval())
        .with_page_size(providers.semantic_scholar.page_size)
        .with_filters(
            providers.semantic_scholar.publication_types.clone(),
            providers.semantic_scholar.year.clone(),
        );
    if let Some(base_url) = &providers.semantic_scholar.base_url {
        semantic_scholar = semantic_scholar.with_base_url(base_url);
    }
    let mut openalex = OpenAlexClient::new(http.clone())
        .with_retry(providers.retry_policy(), providers.min_interval())
        .with_page_size(providers.openalex.page_size)
        .with_mailto(providers.openalex.mailto.clone());
    if let Some(base_url) = &providers.openalex.base_url {
        openalex = openalex.with_base_url(base_url);
    }

    let full_text = WebFullText::new(http).with_limits(cfg.fetch.max_bytes, cfg.fetch.max_chars);

    let db = Database::open(&cfg.storage.path)?;
    info!(path = %cfg.storage.path.display(), "database open");
    let index = Arc::new(CorpusIndex::with_capacity(Arc::new(db), cfg.index.cache_capacity));

    let judge = RelevanceJudge::new(Arc::new(JudgmentCache::new()))
        .with_char_limit(cfg.judge.relevance_char_limit);
    let extractor = FindingExtractor::new(Arc::new(JudgmentCache::new()))
        .with_char_limit(cfg.judge.finding_char_limit);

    Ok(
        SubtopicResearcher::new(oracle, index, semantic_scholar, openalex, full_text)
            .with_judges(judge, extractor),
    )
}
