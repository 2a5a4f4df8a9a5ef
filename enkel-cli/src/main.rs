//! Enkel CLI - コマンドラインインターフェース
//!
//! IDEからデバッガとして起動されるセッションスーパーバイザと、
//! オフラインの補助ツール（スタックトレースの注釈、バイナリの埋め込み）

mod embed;

use anyhow::Result;
use clap::{Parser, Subcommand};
use enkel_core::ControllerConfig;
use enkel_shim::config::DEFAULT_TRANSCRIPT;
use enkel_shim::{default_root, Session, SessionConfig, SessionEnd};
use enkel_symbols::{annotate_trace, load_elf, load_linker_map};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Enkel - kernel debugging shim
#[derive(Parser)]
#[command(name = "enkel")]
#[command(version = "0.1.0")]
#[command(about = "Debugging shim for the Enkel kernel under QEMU and gdb", long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand)]
enum ToolCommand {
    /// Supervise the emulator and gdb for an IDE (stdin/stdout are the MI channel)
    Shim {
        /// Project root directory (default: $HOME/Enkel/)
        #[arg(long)]
        root: Option<String>,

        /// Emulator command line, run from the root directory
        #[arg(long, default_value = "sh run.sh")]
        emulator: String,

        /// Transcript file
        #[arg(long, default_value = DEFAULT_TRANSCRIPT)]
        log: PathBuf,

        /// Do not write a transcript
        #[arg(long)]
        no_log: bool,

        /// Leave the in-target automation to the gdb-side script instead of running it in the shim
        #[arg(long)]
        gdb_script: bool,

        /// Delay before restarting gdb after it exits
        #[arg(long, default_value_t = 500)]
        restart_delay_ms: u64,

        /// gdb executable
        #[arg(long, default_value = "gdb")]
        gdb: String,

        /// Arguments passed to gdb
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        gdb_args: Vec<String>,
    },

    /// Annotate a stack trace with symbol names
    Annotate {
        /// GNU ld map file
        #[arg(short, long, required_unless_present = "elf", conflicts_with = "elf")]
        map: Option<PathBuf>,

        /// ELF file with a symbol table
        #[arg(short, long)]
        elf: Option<PathBuf>,

        /// Trace file with `#<index>:<offset>` lines
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate a C++ source/header pair that embeds a binary file
    Embed {
        /// Input binary
        input: PathBuf,

        /// Output path without extension
        output_base: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        ToolCommand::Shim {
            root,
            emulator,
            log,
            no_log,
            gdb_script,
            restart_delay_ms,
            gdb,
            gdb_args,
        } => {
            let root = match root.or_else(default_root) {
                Some(root) => root,
                None => anyhow::bail!("Cannot determine the home directory; pass --root"),
            };

            let mut debugger = vec![gdb];
            debugger.extend(gdb_args);

            let mut config = SessionConfig::new(root, debugger);
            config.emulator = emulator.split_whitespace().map(String::from).collect();
            config.transcript = if no_log { None } else { Some(log) };
            config.restart_delay = Duration::from_millis(restart_delay_ms);
            if !gdb_script {
                config = config.with_automation(ControllerConfig::default());
            }

            match Session::new(config).run().await? {
                SessionEnd::EmulatorExited(status) => info!("session ended: emulator exited ({})", status),
                SessionEnd::Interrupted => info!("session ended: interrupted"),
                SessionEnd::InputClosed => info!("session ended: input closed"),
            }
        }
        ToolCommand::Annotate {
            map,
            elf,
            input,
            output,
        } => {
            let table = match (map, elf) {
                (Some(map), _) => load_linker_map(map)?,
                (None, Some(elf)) => load_elf(elf)?,
                (None, None) => anyhow::bail!("Either --map or --elf is required"),
            };
            let trace = std::fs::read_to_string(&input)
                .map_err(|e| anyhow::anyhow!("Failed to read {:?}: {}", input, e))?;
            let lines = annotate_trace(&table, &trace);

            match output {
                Some(path) => {
                    let mut text = lines.join("\n");
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    std::fs::write(&path, text)
                        .map_err(|e| anyhow::anyhow!("Failed to write {:?}: {}", path, e))?;
                }
                None => {
                    for line in lines {
                        println!("{}", line);
                    }
                }
            }
        }
        ToolCommand::Embed { input, output_base } => {
            embed::embed(&input, &output_base)?;
        }
    }

    Ok(())
}

/// ログをstderrに出す（stdoutはIDEとのMIチャネル）
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_shim_args_after_separator() {
        let cli = Cli::parse_from([
            "enkel",
            "shim",
            "--root",
            "/home/x/Enkel/",
            "--no-log",
            "--",
            "--interpreter=mi",
            "-q",
        ]);
        match cli.command {
            ToolCommand::Shim {
                root,
                no_log,
                gdb,
                gdb_args,
                restart_delay_ms,
                gdb_script,
                ..
            } => {
                assert_eq!(root.as_deref(), Some("/home/x/Enkel/"));
                assert!(no_log);
                assert_eq!(gdb, "gdb");
                assert_eq!(gdb_args, ["--interpreter=mi", "-q"]);
                assert_eq!(restart_delay_ms, 500);
                assert!(!gdb_script);
            }
            _ => panic!("expected shim"),
        }
    }

    #[test]
    fn test_gdb_script_flag() {
        let cli = Cli::parse_from(["enkel", "shim", "--gdb-script", "--", "--interpreter=mi"]);
        match cli.command {
            ToolCommand::Shim { gdb_script, gdb_args, .. } => {
                assert!(gdb_script);
                assert_eq!(gdb_args, ["--interpreter=mi"]);
            }
            _ => panic!("expected shim"),
        }
    }

    #[test]
    fn test_annotate_requires_symbol_source() {
        assert!(Cli::try_parse_from(["enkel", "annotate", "-i", "trace.txt"]).is_err());
        assert!(Cli::try_parse_from(["enkel", "annotate", "-m", "a.map", "-e", "a.elf", "-i", "t"]).is_err());
        assert!(Cli::try_parse_from(["enkel", "annotate", "-e", "a.elf", "-i", "t"]).is_ok());
    }
}
