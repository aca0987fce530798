use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use clap::{Parser as ClapParser, Subcommand};
use nmfe::analysis::ScriptAnalysis;
use nmfe::config::Config;
use nmfe::{Effect, NmfeError, Runtime, RuntimeError};
use tracing_subscriber::EnvFilter;

use crate::terminal::TerminalView;

mod terminal;

#[derive(ClapParser)]
#[command(author, version, about = "NMF narrative script engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a script in the terminal
    Run {
        /// Script path, or name inside the scripts directory
        script: String,
        /// Do not wait for Enter after each line of dialogue
        #[arg(long)]
        auto: bool,
    },
    /// Parse a script and report syntax errors
    Check {
        script: String,
    },
    /// Print the compiled program as JSON
    Dump {
        script: String,
    },
    /// List speakers, flags, scenes and assets used by a scripts directory
    Analyze {
        /// Defaults to the configured scripts directory
        dir: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a config file with defaults
    Init,
    /// Print the config file location
    Path,
}

fn read_script(path: &PathBuf) -> Result<nmfe::Program, NmfeError> {
    let source = fs::read_to_string(path)?;
    Ok(nmfe::compile(&source, path)?)
}

fn run_script(path: &PathBuf, auto: bool) -> Result<(), NmfeError> {
    let view = Rc::new(RefCell::new(TerminalView::default()));
    let mut runtime = Runtime::new(Rc::clone(&view));
    runtime.read_file(path)?;

    loop {
        let command = match runtime.step() {
            Ok(command) => command,
            Err(RuntimeError::EndOfProgram) => break,
            Err(e) => return Err(e.into()),
        };
        command.execute()?;

        match command.effect() {
            Effect::ShowChoices(labels) => loop {
                let Some(answer) = terminal::prompt("> ")? else {
                    return Ok(());
                };
                let selected = match terminal::parse_selection(&answer, labels.len()) {
                    Ok(number) => runtime.select(number).map_err(|e| e.to_string()),
                    Err(message) => Err(message),
                };
                match selected {
                    Ok(()) => break,
                    Err(message) => println!("{}", message),
                }
            },
            Effect::ShowDialogue(_) if !auto => {
                if terminal::prompt("")?.is_none() {
                    return Ok(());
                }
            }
            _ => {}
        }
    }

    println!("[end]");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Run { script, auto } => {
            run_script(&config.resolve_script(&script), auto)?;
        }
        Commands::Check { script } => {
            let path = config.resolve_script(&script);
            match read_script(&path) {
                Ok(program) => println!(
                    "{}: ok ({} instructions, {} scenes)",
                    path.display(),
                    program.len(),
                    program.scenes().count()
                ),
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Dump { script } => {
            let program = read_script(&config.resolve_script(&script))?;
            println!("{}", serde_json::to_string_pretty(&program)?);
        }
        Commands::Analyze { dir } => {
            let dir = dir.unwrap_or_else(|| config.scripts_dir.clone());
            if !dir.is_dir() {
                println!("Error: scripts directory not found: {}", dir.display());
                println!("Set NMFE_SCRIPTS_DIR or edit {}", Config::get_config_path().display());
                return Ok(());
            }
            let mut analysis = ScriptAnalysis::new()?;
            analysis.analyze_directory(&dir, &config.extension)?;
            analysis.print_analysis();
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigCommands::Init => {
                let path = Config::get_config_path();
                if path.exists() {
                    println!("Config already exists at: {}", path.display());
                } else {
                    config.save()?;
                    println!("Initialized new config at: {}", path.display());
                }
            }
            ConfigCommands::Path => {
                println!("{}", Config::get_config_path().display());
            }
        },
    }

    Ok(())
}
