use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use imagegen::config::Config;
use imagegen::download::{DEFAULT_PREFIX, download_images};
use imagegen::generator::ImageGenerator;
use imagegen::service::civitai::CivitaiService;

#[derive(Parser, Debug)]
#[command(name = "imagegen", version, about = "Generate images on Civitai and download them")]
struct Cli {
    /// Prompt to render (defaults to the configured prompt)
    prompt: Option<String>,

    /// Override the configured negative prompt
    #[arg(long)]
    negative_prompt: Option<String>,

    /// Directory for downloaded images
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// File name prefix for downloaded images
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,

    /// Print URLs without downloading
    #[arg(long)]
    no_download: bool,

    /// Attach the configured auxiliary network (LoRA)
    #[arg(long)]
    with_lora: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if cli.with_lora {
        config.generator.use_additional_network = true;
    }

    let service = Arc::new(CivitaiService::new(&config.service)?);
    let generator = ImageGenerator::new(service, config.generator)?;

    let prompt = cli
        .prompt
        .unwrap_or_else(|| generator.config().default_prompt.clone());
    let negative_prompt = cli
        .negative_prompt
        .unwrap_or_else(|| generator.config().negative_prompt.clone());

    let urls = generator
        .generate_image_with(&prompt, &negative_prompt, &generator.config().params)
        .await
        .inspect_err(|e| tracing::error!("generation failed: {}", e.user_message()))?;

    if urls.is_empty() {
        tracing::info!("generation service returned no images");
        return Ok(());
    }

    for url in &urls {
        println!("{url}");
    }

    if !cli.no_download {
        let client = reqwest::Client::new();
        let written = download_images(&client, &urls, &cli.out_dir, &cli.prefix).await?;
        tracing::info!(files = written.len(), "download finished");
    }

    Ok(())
}
