use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use blackbox_convert::error::IoError;
use blackbox_convert::{Config, config, convert_batch, euler, read_header};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[clap(long, global = true, help = "Path to the configuration file")]
    config: Option<PathBuf>,
    #[clap(
        long,
        global = true,
        value_enum,
        default_value = "info",
        help = "Log level (error, warn, info, debug, trace)"
    )]
    log_level: LogLevel,
}

#[derive(Subcommand, Clone)]
enum Commands {
    #[command(about = "Convert binary sensor logs into CSV files")]
    Convert(ConvertArgs),
    #[command(about = "Rewrite the IMU quaternion of a converted CSV as Euler angles")]
    Euler(EulerArgs),
    #[command(about = "Print the sensor schema declared by a log header")]
    Inspect(InspectArgs),
}

#[derive(clap::Args, Clone, Debug)]
struct ConvertArgs {
    #[clap(required = true, help = "Log files to convert")]
    inputs: Vec<PathBuf>,
    #[clap(long, short, help = "Directory the CSV files are written to")]
    output: PathBuf,
    #[clap(long, help = "CSV cell separator (overrides the config file)")]
    separator: Option<char>,
    #[clap(long, help = "Convert the IMU quaternion to Euler angles")]
    euler: bool,
}

#[derive(clap::Args, Clone, Debug)]
struct EulerArgs {
    #[clap(help = "CSV file produced by the convert command")]
    input: PathBuf,
    #[clap(
        long,
        short,
        help = "Where to write the result; the input is removed afterwards. Defaults to rewriting the input in place"
    )]
    output: Option<PathBuf>,
    #[clap(long, help = "CSV cell separator (overrides the config file)")]
    separator: Option<char>,
}

#[derive(clap::Args, Clone, Debug)]
struct InspectArgs {
    #[clap(help = "Log file whose header should be printed")]
    input: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn main() -> miette::Result<()> {
    let args = Cli::parse();
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::builder().from_env_lossy()
    } else {
        EnvFilter::builder().parse_lossy(format!("blackbox_convert={}", args.log_level.as_str()))
    };
    let _ = tracing_subscriber::fmt::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(
            "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        ))
        .try_init();

    let mut config = Config::load(args.config.as_deref())?;
    match args.command {
        Commands::Convert(ConvertArgs {
            inputs,
            output,
            separator,
            euler,
        }) => {
            if let Some(separator) = separator {
                config.separator = separator;
            }
            config.convert_to_euler |= euler;
            config.separator_byte()?;
            if !output.is_dir() {
                return Err(miette::miette!(
                    "the specified output directory '{}' does not exist",
                    output.display()
                ));
            }

            let report = convert_batch(&inputs, &output, &config);
            for message in report.error_messages() {
                eprintln!("{message}");
            }
            println!("{}", report.summary());
            if report.is_success() {
                Ok(())
            } else {
                Err(miette::miette!(
                    "{} file(s) failed to convert",
                    report.total() - report.successes()
                ))
            }
        }
        Commands::Euler(EulerArgs {
            input,
            output,
            separator,
        }) => {
            let separator = config::separator_byte(separator.unwrap_or(config.separator))?;
            let output = output.unwrap_or_else(|| input.clone());
            let outcome = euler::rewrite_file(&input, &output, separator)?;
            match outcome {
                euler::EulerOutcome::NoImu => println!("no IMU data in '{}'", input.display()),
                euler::EulerOutcome::Converted { rows, .. } => {
                    println!("converted {rows} quaternion rows into '{}'", output.display())
                }
            }
            Ok(())
        }
        Commands::Inspect(InspectArgs { input }) => {
            let file = File::open(&input).map_err(|err| IoError::open(&input, err))?;
            let sensors =
                read_header(&mut BufReader::new(file)).map_err(|err| err.reading(&input))?;
            for sensor in &sensors {
                println!(
                    "{:>3}  {}  ({} bytes per packet)",
                    sensor.id, sensor.name, sensor.packet_size
                );
                for field in &sensor.fields {
                    println!("       {:<24} {:?}", field.column_label(), field.ty);
                }
            }
            Ok(())
        }
    }
}
