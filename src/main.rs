use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use tracing::info;

use sleep_stager::*;

/// Train and evaluate the sleep-stage classifier.
#[derive(Parser, Debug)]
#[command(name = "sleep-stager", version, about)]
struct Args {
    /// Directory of per-recording npz files.
    #[arg(long = "input_directory", default_value = "data_npz")]
    input_directory: PathBuf,

    /// Model file; written by training, read for evaluation.
    #[arg(long = "model_file_path", default_value = "models/(0_8__0_87).onnx")]
    model_file_path: PathBuf,

    /// Directory for reports.
    #[arg(long = "report_dir_path", default_value = "reports/(0_8__0_87)")]
    report_dir_path: PathBuf,

    /// Directory for plots.
    #[arg(long = "plot_dir_path", default_value = "plots/(0_8__0_87)")]
    plot_dir_path: PathBuf,

    /// Train before evaluating; otherwise evaluate the saved model on every file.
    #[arg(
        long = "do_fit",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    do_fit: bool,

    /// YAML file overriding the built-in configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log_level", default_value = "info")]
    log_level: String,
}

fn create_directories(args: &Args) -> anyhow::Result<()> {
    let model_dir = args.model_file_path.parent().unwrap_or(Path::new(""));
    for dir in [
        model_dir,
        args.report_dir_path.as_path(),
        args.plot_dir_path.as_path(),
    ] {
        if dir.as_os_str().is_empty() {
            continue;
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}

fn fit(config: &Config, files: &[PathBuf], model_path: &Path) -> anyhow::Result<RecordingSet> {
    let (train_files, test_files, validation_files) =
        train_test_validation_split(files, &config.split);
    info!(
        "split {} files: {} train, {} test, {} validation",
        files.len(),
        train_files.len(),
        test_files.len(),
        validation_files.len()
    );

    let train_data = load_recordings(&train_files, &config.data)?;
    let test_data = load_recordings(&test_files, &config.data)?;
    let validation_data = load_recordings(&validation_files, &config.data)?;

    let validation_seed = config.generator_seed.map(|s| s.wrapping_add(1));
    let mut train = WindowGenerator::with_seed(
        &train_data,
        config.window.clone(),
        config.rescale.clone(),
        config.generator_seed,
    );
    let mut validation = WindowGenerator::with_seed(
        &validation_data,
        config.window.clone(),
        config.rescale.clone(),
        validation_seed,
    );

    let plan = FitPlan::new(&config.fit, model_path.to_path_buf());
    ExternalTrainer::new(config.trainer.clone()).fit(&mut train, &mut validation, &plan)?;

    Ok(test_data)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let config = match &args.config {
        Some(path) => Config::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };

    create_directories(&args)?;

    let files = discover_files(&args.input_directory, &config.data.file_pattern)?;
    info!(
        "found {} recordings in {}",
        files.len(),
        args.input_directory.display()
    );

    let eval_data = if args.do_fit {
        fit(&config, &files, &args.model_file_path)?
    } else {
        load_recordings(&files, &config.data)?
    };

    let mut model = OnnxStageModel::load(&args.model_file_path)
        .with_context(|| format!("loading model {}", args.model_file_path.display()))?;
    let predictions = predict_stages(&mut model, &eval_data, &config.rescale)?;

    let mut sink = YamlHandoff::new();
    hand_off(
        &predictions,
        &mut sink,
        &args.plot_dir_path,
        &args.report_dir_path,
    )?;
    info!("wrote {} report files", sink.written().len());

    Ok(())
}
