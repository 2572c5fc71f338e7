use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{Map, Value, json};
use video_frame_extractor::{
    Dispatcher, DispatcherConfig, FfmpegLogLevel, ImageFormat, MethodCall, MethodResponse,
    MethodValue, ProgressCallback, ProgressInfo,
};

const CLI_AFTER_HELP: &str = "Examples:\n  frame-extractor frame input.mp4 --at 00:01:30 --out poster.png\n  frame-extractor frames input.mp4 --at 1 --at 2.5 --at 10 --out thumbs --width 320\n  frame-extractor cache input.mp4 --at 0 --at 5 --mode batched --progress\n  frame-extractor call getFrames '{\"filePath\":\"input.mp4\",\"seconds\":[1,2]}'\n  frame-extractor completions zsh > _frame-extractor";

#[derive(Debug, Parser)]
#[command(
    name = "frame-extractor",
    version,
    about = "Extract still frames from video files as PNG/JPEG",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar for batch commands.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Give up after this many seconds.
    #[arg(long, global = true)]
    timeout: Option<f64>,
}

/// Output settings shared by every extracting command.
#[derive(Debug, Parser, Clone)]
struct OutputArgs {
    /// Target width in pixels.
    #[arg(long)]
    width: Option<u32>,
    /// Target height in pixels.
    #[arg(long)]
    height: Option<u32>,
    /// Image format: png | jpeg | jpg.
    #[arg(long)]
    format: Option<String>,
    /// JPEG quality (0-100).
    #[arg(long)]
    quality: Option<i64>,
    /// Decode up to the exact timestamp instead of the preceding keyframe.
    #[arg(long)]
    exact: bool,
}

/// Options for batch commands.
#[derive(Debug, Parser, Clone)]
struct BatchArgs {
    /// Timestamp (seconds, MM:SS or HH:MM:SS). Repeat for several frames.
    #[arg(long = "at", required = true)]
    at: Vec<String>,
    /// Keep frames in stored orientation.
    #[arg(long)]
    no_rotation: bool,
    /// Decode mode: sequential | batched.
    #[arg(long, default_value = "sequential")]
    mode: String,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract a single frame to an image file.
    #[command(
        about = "Extract one frame",
        after_help = "Examples:\n  frame-extractor frame input.mp4 --at 12.5 --out frame.png\n  frame-extractor frame input.mp4 --at 00:00:12 --out frame.jpg --format jpeg --exact"
    )]
    Frame {
        /// Input path or URL.
        input: String,
        /// Timestamp (seconds, MM:SS or HH:MM:SS).
        #[arg(long)]
        at: String,
        /// Output image path.
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Extract several frames into a directory.
    #[command(about = "Extract frames into a directory")]
    Frames {
        /// Input path or URL.
        input: String,
        /// Output directory.
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Extract several frames through the frame cache and print their paths.
    #[command(about = "Extract frames to the cache directory")]
    Cache {
        /// Input path or URL.
        input: String,
        /// Cache directory (defaults to the platform cache dir).
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Regenerate files even if they already exist.
        #[arg(long)]
        refresh: bool,
        /// Print results as JSON.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Send a raw method call and print the response.
    #[command(
        about = "Invoke a dispatcher method",
        after_help = "Examples:\n  frame-extractor call getPlatformVersion\n  frame-extractor call getFrame '{\"filePath\":\"in.mp4\",\"second\":1}'"
    )]
    Call {
        /// Method name, e.g. getFrames.
        method: String,
        /// JSON argument map.
        arguments: Option<String>,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for BarProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        if let Some(seconds) = info.current_timestamp {
            self.bar.set_message(format!("{seconds}s"));
        }
        if info.total == Some(info.current) && info.current_index.is_none() {
            self.bar.finish_with_message("done");
        }
    }
}

fn parse_timecode(value: &str) -> Result<f64, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(seconds);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => (0_u64, minutes.parse::<u64>()?, *seconds),
        [hours, minutes, seconds] => (hours.parse::<u64>()?, minutes.parse::<u64>()?, *seconds),
        _ => return Err(format!("invalid time format: {trimmed}").into()),
    };

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds.parse::<f64>()?)
}

fn init_logging(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    let default_filter = if global.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level
            .parse()
            .map_err(|_| format!("unsupported --log-level: {level}"))?;
        video_frame_extractor::set_ffmpeg_log_level(parsed);
    } else if !global.verbose {
        video_frame_extractor::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    }

    Ok(())
}

fn build_dispatcher(
    global: &GlobalOptions,
    cache_dir: Option<&Path>,
) -> Result<Dispatcher, Box<dyn std::error::Error>> {
    let mut config = DispatcherConfig::new();

    if let Some(seconds) = global.timeout {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err("--timeout must be a positive number of seconds".into());
        }
        config = config.with_timeout(Duration::from_secs_f64(seconds));
    }
    if let Some(directory) = cache_dir {
        config = config.with_cache_root(directory);
    }

    if global.progress {
        config = config.with_progress(Arc::new(BarProgress::new()?));
    }

    Ok(Dispatcher::new().with_config(config))
}

fn output_arguments(input: &str, output: &OutputArgs) -> Map<String, Value> {
    let mut arguments = Map::new();
    arguments.insert("filePath".into(), json!(input));
    arguments.insert("width".into(), json!(output.width));
    arguments.insert("height".into(), json!(output.height));
    arguments.insert("format".into(), json!(output.format));
    arguments.insert("quality".into(), json!(output.quality));
    arguments.insert("exactTime".into(), json!(output.exact));
    arguments
}

fn batch_arguments(
    input: &str,
    batch: &BatchArgs,
) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    let seconds = batch
        .at
        .iter()
        .map(|value| parse_timecode(value))
        .collect::<Result<Vec<_>, _>>()?;

    let mut arguments = output_arguments(input, &batch.output);
    arguments.insert("seconds".into(), json!(seconds));
    arguments.insert("applyRotation".into(), json!(!batch.no_rotation));
    arguments.insert("mode".into(), json!(batch.mode));
    Ok(arguments)
}

fn into_value(response: MethodResponse) -> Result<MethodValue, Box<dyn std::error::Error>> {
    match response {
        MethodResponse::Success(value) => Ok(value),
        MethodResponse::Error(error) => Err(error.to_string().into()),
        MethodResponse::NotImplemented => Err("method not implemented".into()),
    }
}

/// Render a response for the terminal, summarising byte payloads.
fn describe(response: &MethodResponse) -> Value {
    match response {
        MethodResponse::Success(MethodValue::Text(text)) => json!({ "status": "success", "value": text }),
        MethodResponse::Success(MethodValue::Bytes(bytes)) => {
            json!({ "status": "success", "bytes": bytes.len() })
        }
        MethodResponse::Success(MethodValue::BytesList(frames)) => json!({
            "status": "success",
            "bytes": frames.iter().map(|frame| frame.as_ref().map(Vec::len)).collect::<Vec<_>>(),
        }),
        other => serde_json::to_value(other).unwrap_or(Value::Null),
    }
}

fn extension_for(format: Option<&str>, default: ImageFormat) -> &'static str {
    format
        .map(ImageFormat::from_label)
        .unwrap_or(default)
        .extension()
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global)?;

    match cli.command {
        Commands::Frame {
            input,
            at,
            out,
            output,
        } => {
            let dispatcher = build_dispatcher(&cli.global, None)?;
            let mut arguments = output_arguments(&input, &output);
            arguments.insert("second".into(), json!(parse_timecode(&at)?));

            let response = dispatcher.handle(&MethodCall::new("getFrame", Value::Object(arguments)));
            let MethodValue::Bytes(bytes) = into_value(response)? else {
                return Err("unexpected response to getFrame".into());
            };
            fs::write(&out, &bytes)?;
            println!(
                "{} {} ({} bytes)",
                "saved".green().bold(),
                out.display(),
                bytes.len()
            );
        }
        Commands::Frames { input, out, batch } => {
            fs::create_dir_all(&out)?;
            let dispatcher = build_dispatcher(&cli.global, None)?;
            let arguments = batch_arguments(&input, &batch)?;

            let response = dispatcher.handle(&MethodCall::new(
                "getFramesBytes",
                Value::Object(arguments),
            ));
            let MethodValue::BytesList(frames) = into_value(response)? else {
                return Err("unexpected response to getFramesBytes".into());
            };

            let extension = extension_for(batch.output.format.as_deref(), ImageFormat::Jpeg);
            let mut saved = 0_usize;
            for (index, frame) in frames.iter().enumerate() {
                match frame {
                    Some(bytes) => {
                        let path = out.join(format!("frame_{index:04}.{extension}"));
                        fs::write(&path, bytes)?;
                        saved += 1;
                        if cli.global.verbose {
                            eprintln!("saved {} -> {}", batch.at[index], path.display());
                        }
                    }
                    None => eprintln!(
                        "{} {}",
                        "warning:".yellow().bold(),
                        format!("no frame for {}", batch.at[index]).yellow()
                    ),
                }
            }

            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Extracted {saved}/{} frame(s) to {}", frames.len(), out.display()).green()
            );
        }
        Commands::Cache {
            input,
            cache_dir,
            refresh,
            json,
            batch,
        } => {
            let dispatcher = build_dispatcher(&cli.global, cache_dir.as_deref())?;
            let mut arguments = batch_arguments(&input, &batch)?;
            if refresh {
                arguments.insert("cachePolicy".into(), json!("refresh"));
            }

            let response = dispatcher.handle(&MethodCall::new(
                "getFramesToFiles",
                Value::Object(arguments),
            ));
            let MethodValue::PathList(paths) = into_value(response)? else {
                return Err("unexpected response to getFramesToFiles".into());
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&paths)?);
            } else {
                for (at, path) in batch.at.iter().zip(&paths) {
                    match path {
                        Some(path) => println!("{at}\t{}", path.display()),
                        None => println!("{at}\t{}", "-".dimmed()),
                    }
                }
            }
        }
        Commands::Call { method, arguments } => {
            let arguments: Value = match arguments {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Value::Null,
            };
            let dispatcher = build_dispatcher(&cli.global, None)?;
            let response = dispatcher.handle(&MethodCall::new(method, arguments));
            println!("{}", serde_json::to_string_pretty(&describe(&response))?);
            if let MethodResponse::Error(error) = response {
                return Err(error.to_string().into());
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "frame-extractor", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{extension_for, parse_timecode};
    use video_frame_extractor::ImageFormat;

    #[test]
    fn parse_timecode_formats() {
        assert_eq!(parse_timecode("75").unwrap(), 75.0);
        assert_eq!(parse_timecode("01:15").unwrap(), 75.0);
        assert_eq!(parse_timecode("00:01:15.5").unwrap(), 75.5);
        assert!(parse_timecode("").is_err());
        assert!(parse_timecode("1:2:3:4").is_err());
    }

    #[test]
    fn negative_seconds_pass_through() {
        // Invalid slots are reported per frame, not rejected up front.
        assert_eq!(parse_timecode("-1").unwrap(), -1.0);
    }

    #[test]
    fn extension_follows_format() {
        assert_eq!(extension_for(Some("JPG"), ImageFormat::Png), "jpg");
        assert_eq!(extension_for(None, ImageFormat::Png), "png");
    }
}
