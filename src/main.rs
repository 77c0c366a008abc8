// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use genlower::ast::CompilationUnit;
use genlower::pipeline::{self, CollectingSink, TracingSink};
use genlower::render::render_class;
use genlower::runtime::{GeneratorInstance, Host, Value};
use genlower::LoweringConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// Lower generator procedures into iterator state machines
#[derive(Parser)]
#[command(name = "genlower")]
#[command(version)]
#[command(about = "Generator lowering", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower every procedure and print the generated classes
    Lower {
        /// Source file, or a `.json` compilation unit
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = Format::Java)]
        format: Format,

        /// Lowering configuration (JSON)
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },
    /// Lower every procedure and report diagnostics only
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
    /// Lower one procedure and print the values it produces
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Procedure to instantiate
        #[arg(short, long)]
        procedure: String,

        /// Constructor argument; repeat for each parameter
        #[arg(short, long = "arg", value_name = "VALUE")]
        args: Vec<String>,

        /// Stop after this many values
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Java,
    Json,
}

fn main() -> ExitCode {
    if let Ok(filter) = EnvFilter::try_from_env("GENLOWER_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
        tracing::debug!("tracing initialized");
    }

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Lower {
            file,
            format,
            config,
            output,
        } => lower(&file, format, config.as_deref(), output.as_deref()),
        Commands::Check { file, config } => check(&file, config.as_deref()),
        Commands::Run {
            file,
            procedure,
            args,
            limit,
            config,
        } => run(&file, &procedure, &args, limit, config.as_deref()),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<LoweringConfig> {
    match path {
        Some(path) => LoweringConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(LoweringConfig::default()),
    }
}

fn load_unit(path: &Path) -> Result<CompilationUnit> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "json") {
        pipeline::unit_from_json(&text)
            .with_context(|| format!("decoding compilation unit {}", path.display()))
    } else {
        pipeline::parse_unit(&text, &path.display().to_string())
            .with_context(|| format!("parsing {}", path.display()))
    }
}

fn lower(file: &Path, format: Format, config: Option<&Path>, output: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config)?;
    let unit = load_unit(file)?;

    let mut sink = TracingSink::default();
    let classes = pipeline::collect_classes(pipeline::lower_unit(&unit, &config), &mut sink);

    let text = match format {
        Format::Java => classes
            .iter()
            .map(render_class)
            .collect::<Vec<_>>()
            .join("\n"),
        Format::Json => serde_json::to_string_pretty(&classes).context("serializing classes")?,
    };

    match output {
        Some(path) => {
            fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?
        }
        None => println!("{}", text),
    }

    if sink.reported > 0 {
        eprintln!("{} procedure(s) could not be lowered", sink.reported);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn check(file: &Path, config: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config)?;
    let unit = load_unit(file)?;

    let mut sink = CollectingSink::default();
    let classes = pipeline::collect_classes(pipeline::lower_unit(&unit, &config), &mut sink);

    for diagnostic in &sink.diagnostics {
        println!("{}", diagnostic);
    }
    println!(
        "{} lowered, {} failed",
        classes.len(),
        sink.diagnostics.len()
    );
    Ok(if sink.diagnostics.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run(
    file: &Path,
    procedure: &str,
    args: &[String],
    limit: Option<usize>,
    config: Option<&Path>,
) -> Result<ExitCode> {
    let config = load_config(config)?;
    let unit = load_unit(file)?;

    // Every procedure of the unit is callable, so bodies can delegate to each other
    let mut host = Host::new();
    let mut target = None;
    let mut sink = TracingSink::default();
    for class in pipeline::collect_classes(pipeline::lower_unit(&unit, &config), &mut sink) {
        let class = Rc::new(class);
        if class.procedure == procedure {
            target = Some(Rc::clone(&class));
        }
        host.register_generator(class);
    }
    let Some(class) = target else {
        if unit.procedure(procedure).is_some() {
            bail!("procedure `{}` could not be lowered", procedure);
        }
        bail!("no procedure named `{}` in {}", procedure, file.display());
    };

    let args = args.iter().map(|arg| Value::parse_arg(arg)).collect();
    // Faults hold shared runtime values and are reported as text
    let generator = GeneratorInstance::new(class, args, host)
        .map_err(|fault| anyhow!("{}", fault))
        .with_context(|| format!("instantiating `{}`", procedure))?;

    for value in generator.take(limit.unwrap_or(usize::MAX)) {
        let value = value.map_err(|fault| anyhow!("{}", fault))?;
        println!("{}", value);
    }
    Ok(ExitCode::SUCCESS)
}
