// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `drawbot`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "drawbot",
    version,
    about = "Stream plotter command files to a drawbot and render a preview.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Drawbot.toml` in the current working directory. A missing
    /// file at the default location means "use built-in defaults".
    #[arg(long, value_name = "PATH", default_value = "Drawbot.toml")]
    pub config: String,

    /// Do not talk to the board; accept every command instantly.
    #[arg(long)]
    pub fake: bool,

    /// Do not render the preview image.
    #[arg(long)]
    pub no_preview: bool,

    /// Load and summarise the command file, but don't stream anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DRAWBOT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: BotCommand,
}

/// What to do with the bot.
#[derive(Debug, Clone, Subcommand)]
pub enum BotCommand {
    /// Stream a command file (one command per line).
    Draw {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Raise the pen.
    PenUp,
    /// Lower the pen.
    PenDown,
    /// Run the board's calibration routine.
    Calibrate,
    /// Move to the configured home position.
    Home,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_draw_with_flags() {
        let args = CliArgs::try_parse_from([
            "drawbot", "--fake", "--config", "bot.toml", "draw", "job.gcode",
        ])
        .unwrap();
        assert!(args.fake);
        assert_eq!(args.config, "bot.toml");
        match args.command {
            BotCommand::Draw { file } => assert_eq!(file, PathBuf::from("job.gcode")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_pen_up() {
        let args = CliArgs::try_parse_from(["drawbot", "pen-up"]).unwrap();
        assert!(matches!(args.command, BotCommand::PenUp));
        assert_eq!(args.config, "Drawbot.toml");
    }
}
