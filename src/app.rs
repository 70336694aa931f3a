//! Command-line parsing and command routing.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// Terminal voice-note recorder with a live spectrum display
#[derive(Parser, Debug)]
#[command(name = "voicenote")]
#[command(version)]
#[command(about = "Terminal voice-note recorder with a live spectrum display")]
#[command(long_about = "Terminal voice-note recorder with a live spectrum display.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n\nKEYS WHILE RECORDING:\n    Space       pause / resume\n    Enter       stop and save\n    Esc, q      discard\n\nEXAMPLES:\n    # Record to a timestamped file in the configured output directory\n    $ voicenote\n\n    # Record to a specific file\n    $ voicenote -o memo.wav\n\n    # Stop a running recording from elsewhere (e.g. a hotkey)\n    $ pkill -USR1 voicenote")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/voicenote/voicenote.toml\n    Logs:               ~/.local/state/voicenote/voicenote.log.*"
)]
struct Cli {
    /// Write the voice note to FILE (record default command)
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a voice note with live spectrum (default)
    ///
    /// Press Enter to save, Space to pause/resume, Escape/q to discard.
    #[command(visible_alias = "r")]
    Record {
        /// Write the voice note to FILE
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Creates the file with defaults if it does not exist yet.
    /// Uses $EDITOR or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    #[command(name = "list-devices")]
    ListDevices,

    /// Show the last 50 lines of the most recent log file
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   voicenote completions bash > voicenote.bash
    ///   voicenote completions zsh > _voicenote
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the command selected on the command line.
///
/// # Errors
/// - If logging initialization fails
/// - If the command fails
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that need neither logging nor the recorder
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "voicenote", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => return exit_on_error(commands::handle_list_devices()),
        Some(Commands::Logs) => return exit_on_error(commands::handle_logs()),
        _ => {}
    }

    logging::init_logging()?;

    match cli.command {
        None => commands::handle_record(cli.output).await?,
        // An explicit record option wins over the global one.
        Some(Commands::Record { output }) => commands::handle_record(output.or(cli.output)).await?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

fn exit_on_error(result: anyhow::Result<()>) -> anyhow::Result<()> {
    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    Ok(())
}
