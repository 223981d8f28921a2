//! wasmpipe - DICOM pipelines from the command line
//!
//! 画像はディスク上で `<stem>.image.json` + `<stem>.image.data` の組として扱い、
//! メタ情報は素の JSON ファイルとして読み書きします。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wasmpipe_core::app::{Executor, ExecutorBuilder};
use wasmpipe_core::config::{BackendKind, RuntimeConfig};
use wasmpipe_core::impls::staging;
use wasmpipe_core::typed::{Operation, ReadParametricMap, ReadSegmentation, WriteParametricMap};

const DEFAULT_LOG_FILTER: &str = "wasmpipe=info";

#[derive(Parser, Debug)]
#[command(name = "wasmpipe")]
#[command(about = "Run packaged DICOM conversion pipelines")]
#[command(version)]
struct Cli {
    /// Execution backend. The CLI ships no in-process modules, so only
    /// `process` can run here.
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Directory holding `<name><suffix>` pipeline artifacts.
    #[arg(long, global = true)]
    artifact_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    artifact_suffix: Option<String>,

    /// Runner command line, e.g. "wasmtime run".
    #[arg(long, global = true)]
    runner: Option<String>,

    /// Runner flag that pre-opens a host directory, e.g. "--dir".
    #[arg(long, global = true, allow_hyphen_values = true)]
    mount_flag: Option<String>,

    /// Log filter directives.
    #[arg(long, global = true, env = "RUST_LOG", default_value = DEFAULT_LOG_FILTER)]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a DICOM segmentation object into a label image.
    ReadSegmentation {
        dicom_file: PathBuf,

        /// Merge all segments into one image.
        #[arg(long)]
        merge_segments: bool,

        /// Output image stem.
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
    /// Read a DICOM parametric map into an image and its meta information.
    ReadParametricMap {
        dicom_file: PathBuf,

        /// Output image stem.
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Meta information JSON file; printed to stdout when omitted.
        #[arg(long)]
        meta_info: Option<PathBuf>,
    },
    /// Write an image and meta information as a DICOM parametric map.
    WriteParametricMap {
        /// Input image stem.
        #[arg(long)]
        image: PathBuf,

        /// Meta information JSON file.
        #[arg(long)]
        meta_info: PathBuf,

        /// DICOM series the map was derived from.
        #[arg(long, num_args = 1..)]
        ref_dicom_series: Vec<PathBuf>,

        /// Output DICOM file.
        #[arg(long, short = 'o')]
        output: PathBuf,
    },
}

impl Command {
    fn pipeline(&self) -> &'static str {
        match self {
            Self::ReadSegmentation { .. } => ReadSegmentation::NAME,
            Self::ReadParametricMap { .. } => ReadParametricMap::NAME,
            Self::WriteParametricMap { .. } => WriteParametricMap::NAME,
        }
    }
}

impl Cli {
    /// Environment / `.env` first, flags on top.
    fn runtime_config(&self) -> Result<RuntimeConfig> {
        let mut config = RuntimeConfig::from_env().context("reading WASMPIPE_* environment")?;
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(dir) = &self.artifact_dir {
            config.artifact_dir = dir.clone();
        }
        if let Some(suffix) = &self.artifact_suffix {
            config.artifact_suffix = suffix.clone();
        }
        if let Some(runner) = &self.runner {
            config.runner = Some(runner.clone());
        }
        if let Some(flag) = &self.mount_flag {
            config.mount_flag = Some(flag.clone());
        }
        Ok(config)
    }
}

async fn load_image(stem: &Path) -> Result<wasmpipe_core::domain::Image> {
    let (header, _) = staging::image_paths(stem);
    if !header.exists() {
        bail!("image header not found: {}", header.display());
    }
    staging::read_image(stem)
        .await
        .with_context(|| format!("reading image {}", stem.display()))
}

async fn run(executor: &Executor, command: Command) -> Result<()> {
    match command {
        Command::ReadSegmentation {
            dicom_file,
            merge_segments,
            output,
        } => {
            let image = executor
                .run_op(ReadSegmentation::new(dicom_file).merge_segments(merge_segments))
                .await?;
            staging::write_image(&output, &image).await?;
            info!(output = %output.display(), size = ?image.size, "segmentation written");
        }
        Command::ReadParametricMap {
            dicom_file,
            output,
            meta_info,
        } => {
            let result = executor.run_op(ReadParametricMap::new(dicom_file)).await?;
            staging::write_image(&output, &result.param_image).await?;
            let meta = serde_json::to_string_pretty(&result.meta_info)?;
            match meta_info {
                Some(path) => {
                    tokio::fs::write(&path, meta)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                }
                None => println!("{meta}"),
            }
            info!(output = %output.display(), "parametric map read");
        }
        Command::WriteParametricMap {
            image,
            meta_info,
            ref_dicom_series,
            output,
        } => {
            let image = load_image(&image).await?;
            let meta_bytes = tokio::fs::read(&meta_info)
                .await
                .with_context(|| format!("reading {}", meta_info.display()))?;
            let meta: serde_json::Value = serde_json::from_slice(&meta_bytes)
                .with_context(|| format!("parsing {}", meta_info.display()))?;

            let written = executor
                .run_op(WriteParametricMap::new(image, meta, output).ref_dicom_series(ref_dicom_series))
                .await?;
            info!(output = %written.display(), "parametric map written");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&cli.log)
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.runtime_config()?;
    if config.backend == BackendKind::Worker {
        bail!("the worker backend needs in-process modules; use --backend process");
    }

    let executor = ExecutorBuilder::new()
        .config(config)
        .expect_pipelines(&[cli.command.pipeline()])
        .build()
        .await?;

    run(&executor, cli.command).await
}
