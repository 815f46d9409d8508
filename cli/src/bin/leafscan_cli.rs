use clap::{Parser, Subcommand};
use cli::LeafScanConfig;
use color_eyre::eyre::{eyre, Result};
use leafscan::{server, DetectionResult, SensorReading};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

const PING_PROMPT: &str = "Hello! Testing connection.";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a .toml or .json configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Override the configured listen address
        #[arg(short, long)]
        bind: Option<String>,
        /// Do not keep copies of uploaded images
        #[arg(long)]
        no_archive: bool,
    },
    /// Analyze a single image and print the result as JSON
    Analyze {
        /// Path to the leaf photograph
        image: PathBuf,
        /// Soil moisture in percent
        #[arg(long, default_value = "0")]
        soil_moisture: f64,
        /// Air temperature in degrees Celsius
        #[arg(long, default_value = "0")]
        temperature: f64,
        /// Relative humidity in percent
        #[arg(long, default_value = "0")]
        humidity: f64,
    },
    /// List vision models that support content generation
    ListModels,
    /// Send a text-only prompt to the vision model
    PingVision {
        #[arg(long, default_value = PING_PROMPT)]
        prompt: String,
    },
    /// Print the JSON schema of the configuration or of an analysis result
    Schema {
        #[arg(long)]
        result: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind, no_archive } => serve(config, bind, no_archive).await?,
        Commands::Analyze {
            image,
            soil_moisture,
            temperature,
            humidity,
        } => {
            let reading = SensorReading::new(soil_moisture, temperature, humidity);
            analyze(&config, &image, &reading).await?;
        }
        Commands::ListModels => list_models(&config).await?,
        Commands::PingVision { prompt } => ping_vision(&config, &prompt).await?,
        Commands::Schema { result } => {
            let schema = if result {
                schemars::schema_for!(DetectionResult)
            } else {
                schemars::schema_for!(LeafScanConfig)
            };
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LeafScanConfig> {
    let config = match path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            LeafScanConfig::from_file(path)?
        }
        None => LeafScanConfig::default(),
    };
    Ok(config.resolve_credentials())
}

async fn serve(config: LeafScanConfig, bind: Option<String>, no_archive: bool) -> Result<()> {
    let analyzer = config.build_analyzer()?;
    info!("{}", analyzer.info());

    let capabilities = analyzer.capabilities();
    if !capabilities.vision_model {
        warn!("No vision model configured, set GEMINI_API_KEY to enable the fallback");
    }

    let archive = if no_archive { None } else { config.upload_archive()? };
    if let Some(archive) = &archive {
        info!("Archiving uploads to {:?}", archive.dir());
    }

    let bind = bind.unwrap_or(config.server.bind);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("🌿 LeafScan {} on http://{}", leafscan::MODEL_VERSION, bind);

    server::serve(listener, server::AppState::new(analyzer, archive), config.server.body_limit_bytes).await?;
    Ok(())
}

async fn analyze(config: &LeafScanConfig, image: &Path, reading: &SensorReading) -> Result<()> {
    let analyzer = config.build_analyzer()?;
    let bytes = std::fs::read(image)?;
    info!("Analyzing {:?} ({} bytes)", image, bytes.len());

    let result = analyzer.analyze_with_sensors(&bytes, reading).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn list_models(config: &LeafScanConfig) -> Result<()> {
    let client = config
        .vision_client()?
        .ok_or_else(|| eyre!("Vision API key not provided. Set GEMINI_API_KEY or vision.api_key"))?;

    let models = client.list_models().await?;
    info!("Found {} models supporting generateContent", models.len());
    for model in models {
        println!("{model}");
    }
    Ok(())
}

async fn ping_vision(config: &LeafScanConfig, prompt: &str) -> Result<()> {
    let client = config
        .vision_client()?
        .ok_or_else(|| eyre!("Vision API key not provided. Set GEMINI_API_KEY or vision.api_key"))?;

    info!("Pinging {}", client.model());
    let reply = client.ping(prompt).await?;
    println!("{reply}");
    info!("✅ Vision model reachable");
    Ok(())
}
