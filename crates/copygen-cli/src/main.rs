use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use copygen_contracts::brief::{Brief, Length, Platform, Tone, RESULT_COUNT_OPTIONS};
use copygen_contracts::events::EventWriter;
use copygen_contracts::store::HistoryEntry;
use copygen_engine::http::{HttpImageFunction, HttpTextModel};
use copygen_engine::{
    Generator, GeneratorConfig, GeneratorMode, HttpConfig, ImageAdapter, Notice, Notifier,
    Workbench,
};
use serde_json::{json, Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "copygen=info,copygen_engine=info";

#[derive(Debug, Parser)]
#[command(name = "copygen", version, about = "Social copy generator")]
struct Cli {
    /// Directory holding storage.json and events.jsonl.
    #[arg(long, global = true, default_value = ".copygen")]
    data_dir: PathBuf,
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate copy for a brief; unset fields come from the saved draft.
    Generate(GenerateArgs),
    /// Generate one image for a free-form prompt.
    Image(ImageArgs),
    #[command(subcommand)]
    History(HistoryCommand),
    #[command(subcommand)]
    Draft(DraftCommand),
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long)]
    topic: Option<String>,
    #[arg(long)]
    scene: Option<String>,
    #[arg(long)]
    audience: Option<String>,
    #[arg(long)]
    requirements: Option<String>,
    #[arg(long, value_parser = parse_platform)]
    platform: Option<Platform>,
    #[arg(long, value_parser = parse_tone)]
    tone: Option<Tone>,
    #[arg(long, value_parser = parse_length)]
    length: Option<Length>,
    #[arg(long, value_parser = parse_count)]
    count: Option<usize>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    diversity: Option<u8>,
    #[arg(long)]
    image_count: Option<u32>,
    #[arg(long)]
    no_emoji: bool,
    #[arg(long)]
    no_hashtags: bool,
    /// Illustrate the first `image_count` items after generating.
    #[arg(long)]
    images: bool,
    /// Skip the text model and answer with mock output.
    #[arg(long)]
    mock: bool,
    /// Return the error instead of mock output when the model fails.
    #[arg(long)]
    no_fallback: bool,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Args)]
struct ImageArgs {
    #[arg(long)]
    prompt: String,
}

#[derive(Debug, Subcommand)]
enum HistoryCommand {
    List,
    Show { id: String },
    /// Restore a past brief into the draft and print its results.
    Use { id: String },
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DraftCommand {
    Show,
    Reset,
}

struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: &Notice) {
        eprintln!("[copygen] {}", notice.message());
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("copygen error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    let host = Host::open(&cli)?;
    match cli.command {
        Command::Generate(args) => run_generate(&host, args).await,
        Command::Image(args) => run_image(&host, args).await,
        Command::History(command) => run_history(&host, command),
        Command::Draft(command) => run_draft(&host, command),
    }
}

/// Everything a subcommand may need, resolved from flags and environment.
struct Host {
    storage_path: PathBuf,
    events: EventWriter,
    generator_config: GeneratorConfig,
    http_config: HttpConfig,
}

impl Host {
    fn open(cli: &Cli) -> Result<Self> {
        fs::create_dir_all(&cli.data_dir)
            .with_context(|| format!("failed to create {}", cli.data_dir.display()))?;
        let events_path = cli
            .events
            .clone()
            .unwrap_or_else(|| cli.data_dir.join("events.jsonl"));
        let session_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(%session_id, events = %events_path.display(), "session opened");
        Ok(Self {
            storage_path: cli.data_dir.join("storage.json"),
            events: EventWriter::new(events_path, session_id),
            generator_config: GeneratorConfig::from_env(),
            http_config: HttpConfig::from_env(),
        })
    }

    fn image_adapter(&self, config: &GeneratorConfig) -> Result<ImageAdapter> {
        let function = HttpImageFunction::new(&self.http_config)?;
        Ok(ImageAdapter::new(Arc::new(function), config).with_events(self.events.clone()))
    }

    fn workbench(&self, config: GeneratorConfig) -> Result<Workbench> {
        let model = HttpTextModel::new(&self.http_config)?;
        let images = self.image_adapter(&config)?;
        let generator = Generator::new(Arc::new(model), config).with_events(self.events.clone());
        Ok(Workbench::new(
            generator,
            images,
            &self.storage_path,
            Arc::new(StderrNotifier),
        ))
    }
}

async fn run_generate(host: &Host, args: GenerateArgs) -> Result<i32> {
    let mut config = host.generator_config.clone();
    if args.mock {
        config.mode = GeneratorMode::Mock;
    }
    if args.no_fallback {
        config.mock_fallback = false;
    }
    if let Some(model) = args.model.clone() {
        config.model = model;
    }

    let mut bench = host.workbench(config)?;
    let brief = overlay_brief(bench.brief().clone(), &args);
    let result = bench.generate(brief).await?;
    let mut output = serde_json::to_value(&result)?;

    if args.images {
        let wanted = bench.brief().image_count as usize;
        let ids: Vec<String> = result
            .items
            .iter()
            .take(wanted)
            .map(|item| item.id.clone())
            .collect();
        for id in &ids {
            if let Err(err) = bench.illustrate(id).await {
                tracing::warn!(%id, code = err.code(), "illustration skipped");
            }
        }
        let mut cards = Map::new();
        for (id, card) in bench.cards().iter() {
            cards.insert(id.clone(), serde_json::to_value(card)?);
        }
        if let Value::Object(fields) = &mut output {
            fields.insert("images".to_string(), Value::Object(cards));
        }
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(0)
}

fn overlay_brief(mut brief: Brief, args: &GenerateArgs) -> Brief {
    let text_fields = [
        (&mut brief.topic, &args.topic),
        (&mut brief.scene, &args.scene),
        (&mut brief.audience, &args.audience),
        (&mut brief.requirements, &args.requirements),
    ];
    for (field, value) in text_fields {
        if let Some(value) = value {
            *field = value.clone();
        }
    }
    if let Some(platform) = args.platform {
        brief.platform = platform;
    }
    if let Some(tone) = args.tone {
        brief.tone = tone;
    }
    if let Some(length) = args.length {
        brief.length = length;
    }
    if let Some(count) = args.count {
        brief.result_count = count;
    }
    if let Some(diversity) = args.diversity {
        brief.diversity = diversity;
    }
    if let Some(image_count) = args.image_count {
        brief.image_count = image_count;
    }
    if args.no_emoji {
        brief.with_emoji = false;
    }
    if args.no_hashtags {
        brief.with_hashtags = false;
    }
    brief
}

async fn run_image(host: &Host, args: ImageArgs) -> Result<i32> {
    let adapter = host.image_adapter(&host.generator_config)?;
    let outcome = adapter.generate(&args.prompt).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "imageUrl": outcome.image_url,
            "revisedPrompt": outcome.revised_prompt,
        }))?
    );
    Ok(0)
}

fn run_history(host: &Host, command: HistoryCommand) -> Result<i32> {
    let mut bench = host.workbench(host.generator_config.clone())?;
    match command {
        HistoryCommand::List => {
            let entries = bench.history();
            if entries.is_empty() {
                println!("No history yet.");
            }
            for entry in &entries {
                println!("{}", history_line(entry));
            }
        }
        HistoryCommand::Show { id } => {
            let Some(entry) = bench.history().into_iter().find(|entry| entry.id == id) else {
                bail!("no history entry '{id}'");
            };
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        HistoryCommand::Use { id } => {
            let Some(entry) = bench.use_history(&id) else {
                bail!("no history entry '{id}'");
            };
            println!("{}", serde_json::to_string_pretty(&entry.results)?);
        }
        HistoryCommand::Clear { yes } => {
            if !yes {
                bail!("history clear needs --yes");
            }
            bench.clear_history()?;
        }
    }
    Ok(0)
}

fn history_line(entry: &HistoryEntry) -> String {
    format!(
        "{}\t{}\t{}\t{} 条",
        entry.id,
        entry.prompt.platform,
        entry.prompt.topic,
        entry.results.len()
    )
}

fn run_draft(host: &Host, command: DraftCommand) -> Result<i32> {
    let mut bench = host.workbench(host.generator_config.clone())?;
    match command {
        DraftCommand::Show => {
            println!("{}", serde_json::to_string_pretty(bench.brief())?);
        }
        DraftCommand::Reset => {
            bench.reset_draft()?;
            println!("Draft reset.");
        }
    }
    Ok(0)
}

fn parse_platform(raw: &str) -> Result<Platform, String> {
    Platform::from_label(raw).ok_or_else(|| {
        let labels: Vec<&str> = Platform::ALL.iter().map(|value| value.label()).collect();
        format!("expected one of {}", labels.join(", "))
    })
}

fn parse_tone(raw: &str) -> Result<Tone, String> {
    Tone::from_label(raw).ok_or_else(|| {
        let labels: Vec<&str> = Tone::ALL.iter().map(|value| value.label()).collect();
        format!("expected one of {}", labels.join(", "))
    })
}

fn parse_length(raw: &str) -> Result<Length, String> {
    Length::from_label(raw).ok_or_else(|| {
        let labels: Vec<&str> = Length::ALL.iter().map(|value| value.label()).collect();
        format!("expected one of {}", labels.join(", "))
    })
}

fn parse_count(raw: &str) -> Result<usize, String> {
    let count: usize = raw.trim().parse().map_err(|_| format!("not a number: {raw}"))?;
    if RESULT_COUNT_OPTIONS.contains(&count) {
        Ok(count)
    } else {
        Err(format!("expected one of {RESULT_COUNT_OPTIONS:?}"))
    }
}
