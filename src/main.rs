use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use stagers::config::{EmbeddingProviderKind, StagersConfig};
use stagers::core::analysis::{load_analyses, RoomAnalysis};
use stagers::core::cache::EmbeddingCache;
use stagers::core::embedding::EmbeddingGenerator;
use stagers::core::grouping::{RoomGroup, RoomGrouper};
use stagers::core::similarity::SimilarityScorer;
use stagers::core::vector::Embedding;
use stagers::database::repositories::RoomGroupRepository;
use stagers::database::{establish_connection, get_database_path};
use stagers::services::{
    EmbeddingProvider, GeminiEmbeddingProvider, NullEmbeddingProvider, RequestScheduler,
    SchedulerConfig,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "stagers", version, about = "CLI for grouping room photos")]
struct Cli {
    /// Config file (default: `<config dir>/stagers/config.json`)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Group analyzed room photos
    Rooms {
        #[command(subcommand)]
        command: RoomsCmd,
    },

    /// Work with saved room groups
    Groups {
        #[command(subcommand)]
        command: GroupsCmd,
    },
}

#[derive(Subcommand, Debug)]
enum RoomsCmd {
    /// Partition analyses into rooms
    Group {
        /// Analysis JSON file or directory of files
        #[arg(short, long, value_name = "FILE|DIR")]
        input: PathBuf,
        /// Use the weighted scorer with text embeddings
        #[arg(long)]
        embeddings: bool,
        /// Project the groups belong to
        #[arg(long, value_name = "ID")]
        project: Option<String>,
        /// Replace the project's saved groups with the result
        #[arg(long, requires = "project")]
        save: bool,
        /// Print groups as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score a single pair of images
    Compare {
        /// Analysis JSON file or directory of files
        #[arg(short, long, value_name = "FILE|DIR")]
        input: PathBuf,
        image_a: String,
        image_b: String,
        /// Include the embedding term
        #[arg(long)]
        embeddings: bool,
    },
}

#[derive(Subcommand, Debug)]
enum GroupsCmd {
    /// List a project's saved groups
    List {
        #[arg(long, value_name = "ID")]
        project: String,
    },

    /// Delete a project's saved groups
    Delete {
        #[arg(long, value_name = "ID")]
        project: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = StagersConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Rooms { command } => match command {
            RoomsCmd::Group {
                input,
                embeddings,
                project,
                save,
                json,
            } => {
                let analyses = read_analyses(&input)?;
                let grouper = RoomGrouper::with_config(config.grouping.clone());

                let groups = if embeddings {
                    let generator = build_generator(&config)?;
                    let vectors = generate_with_spinner(&generator, &analyses).await;
                    benchmark("weighted grouping", || {
                        grouper.group_with_embeddings(&analyses, &vectors)
                    })
                } else {
                    benchmark("grouping", || grouper.group(&analyses))
                };

                if json {
                    println!("{}", serde_json::to_string_pretty(&groups)?);
                } else {
                    print_groups(&groups);
                }

                if save {
                    let project = project
                        .ok_or_else(|| anyhow::anyhow!("--save requires --project"))?;
                    let repo = open_repository(&config)?;
                    let stored = repo
                        .save_groups(&project, &groups)
                        .with_context(|| format!("Failed to save groups for project {}", project))?;
                    println!("\n✅ Saved {} group(s) for project {}", stored.len(), project);
                }
            }

            RoomsCmd::Compare {
                input,
                image_a,
                image_b,
                embeddings,
            } => {
                let analyses = read_analyses(&input)?;
                let a = find_analysis(&analyses, &image_a)?;
                let b = find_analysis(&analyses, &image_b)?;
                let scorer = SimilarityScorer::from_config(&config.grouping);

                let (embedding_a, embedding_b) = if embeddings {
                    let generator = build_generator(&config)?;
                    (generator.generate(a).await, generator.generate(b).await)
                } else {
                    (Vec::new(), Vec::new())
                };

                let breakdown = scorer.breakdown(a, b, &embedding_a, &embedding_b);
                let same_room = scorer.is_same_room(a, b);

                println!("▶ {} vs {}", a.image_id, b.image_id);
                println!("   room type match: {}", breakdown.room_type_match);
                println!("   flooring:        {:.3}", breakdown.flooring);
                println!("   windows:         {:.3}", breakdown.windows);
                println!("   features:        {:.3}", breakdown.features);
                match breakdown.embedding {
                    Some(cosine) => println!("   embedding:       {:.3}", cosine),
                    None => println!("   embedding:       n/a"),
                }
                println!("   lighting match:  {}", breakdown.lighting_match);
                println!(
                    "   weighted score:  {:.3} (threshold {:.2})",
                    breakdown.score, config.grouping.match_threshold
                );
                println!("   basic verdict:   {}", if same_room { "same room" } else { "different rooms" });
            }
        },

        Commands::Groups { command } => match command {
            GroupsCmd::List { project } => {
                let repo = open_repository(&config)?;
                let stored = repo
                    .find_by_project_id(&project)
                    .with_context(|| format!("Failed to load groups for project {}", project))?;

                if stored.is_empty() {
                    println!("No saved groups for project {}.", project);
                    return Ok(());
                }

                let stats = repo.get_group_stats(&project)?;
                println!(
                    "🗂️  {} group(s), {} multi-image, {} singleton, {} image(s):",
                    stats.total_groups,
                    stats.multi_image_groups,
                    stats.singleton_groups,
                    stats.total_images_in_groups
                );
                for group in &stored {
                    println!(
                        "[{}] {} ({:.2}) {}\n     images: {:?}",
                        group.id, group.room_type, group.similarity, group.created_at, group.image_ids
                    );
                }
            }

            GroupsCmd::Delete { project, yes } => {
                let repo = open_repository(&config)?;
                let count = repo.count_by_project_id(&project)?;
                if count == 0 {
                    println!("No saved groups for project {}.", project);
                    return Ok(());
                }

                let confirmed = yes
                    || Confirm::new()
                        .with_prompt(format!(
                            "Delete {} saved group(s) for project {}?",
                            count, project
                        ))
                        .default(false)
                        .interact()
                        .context("Failed to read confirmation")?;
                if !confirmed {
                    println!("Aborted.");
                    return Ok(());
                }

                let deleted = repo
                    .delete_by_project_id(&project)
                    .with_context(|| format!("Failed to delete groups for project {}", project))?;
                println!("🧹 Deleted {} group(s)", deleted);
            }
        },
    }

    Ok(())
}

fn read_analyses(input: &Path) -> Result<Vec<RoomAnalysis>> {
    let analyses = load_analyses(input)
        .with_context(|| format!("Failed to load analyses from {}", input.display()))?;
    log::info!("Loaded {} analyses from {}", analyses.len(), input.display());
    Ok(analyses)
}

fn find_analysis<'a>(analyses: &'a [RoomAnalysis], image_id: &str) -> Result<&'a RoomAnalysis> {
    match analyses.iter().find(|analysis| analysis.image_id == image_id) {
        Some(analysis) => Ok(analysis),
        None => anyhow::bail!("No analysis for image {}", image_id),
    }
}

fn build_generator(config: &StagersConfig) -> Result<EmbeddingGenerator> {
    let embedding = &config.embedding;

    let (provider, scheduler): (Arc<dyn EmbeddingProvider>, SchedulerConfig) = match embedding.provider {
        EmbeddingProviderKind::Gemini => {
            let provider = GeminiEmbeddingProvider::new(
                embedding.api_key.clone(),
                embedding.base_url.clone(),
                embedding.model.clone(),
                Duration::from_secs(embedding.timeout_secs),
            )
            .context("Failed to set up the Gemini embedding provider")?;
            let provider: Arc<dyn EmbeddingProvider> = Arc::new(provider);
            (provider, config.scheduler.clone())
        }
        EmbeddingProviderKind::Null => {
            let provider: Arc<dyn EmbeddingProvider> = Arc::new(NullEmbeddingProvider::new());
            (provider, SchedulerConfig::unthrottled())
        }
    };

    let cache = match &embedding.cache_path {
        Some(path) => EmbeddingCache::open(path)
            .with_context(|| format!("Failed to open embedding cache {}", path.display()))?,
        None => EmbeddingCache::in_memory(),
    };

    Ok(EmbeddingGenerator::new(provider)
        .with_scheduler(Arc::new(RequestScheduler::new(&scheduler)))
        .with_cache(Arc::new(cache)))
}

async fn generate_with_spinner(
    generator: &EmbeddingGenerator,
    analyses: &[RoomAnalysis],
) -> HashMap<String, Embedding> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!(
        "Generating {} embeddings via {}…",
        analyses.len(),
        generator.provider_name()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let embeddings = generator.generate_all(analyses).await;
    if let Err(e) = generator.flush_cache() {
        log::warn!("Failed to flush embedding cache: {}", e);
    }

    let available = embeddings.values().filter(|e| !e.is_empty()).count();
    spinner.finish_with_message(format!(
        "Embeddings ready ({}/{})",
        available,
        embeddings.len()
    ));
    embeddings
}

fn open_repository(config: &StagersConfig) -> Result<RoomGroupRepository> {
    let db_path = match &config.storage.database_path {
        Some(path) => path.clone(),
        None => get_database_path().context("Failed to resolve the database path")?,
    };
    let conn = establish_connection(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    Ok(RoomGroupRepository::new(conn))
}

fn print_groups(groups: &[RoomGroup]) {
    if groups.is_empty() {
        println!("No rooms found.");
        return;
    }

    let multi = groups.iter().filter(|g| !g.is_singleton()).count();
    println!("Found {} room(s), {} with more than one photo:", groups.len(), multi);
    for (i, group) in groups.iter().enumerate() {
        println!("\n✨ Room {}: {} ({:.2})", i + 1, group.room_type, group.similarity);
        for image_id in &group.image_ids {
            println!("   ▶ {}", image_id);
        }
    }
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    log::info!("{} took {:.2?}", label, start.elapsed());
    result
}
