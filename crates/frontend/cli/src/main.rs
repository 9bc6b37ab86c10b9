mod dump;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use emu8086_core::cpu_8086::{ArrayMemory, Cpu8086, HaltReason};
use emu8086_core::logging::{LogCategory, LogConfig, LogLevel};
use log::{info, warn};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "emu8086", about = "Run a flat 8086 binary and dump the final state")]
struct Args {
    /// Path to the program image (raw bytes, no header)
    program: PathBuf,

    /// Physical load address, decimal or 0x-prefixed hex
    #[arg(long, default_value = "0", value_parser = parse_address)]
    origin: u32,

    /// Stop after this many instructions even without a HLT
    #[arg(long)]
    max_steps: Option<u64>,

    /// Log every executed instruction (CPU category at trace level)
    #[arg(long, default_value_t = false)]
    trace: bool,

    /// Core log level: off, error, warn, info, debug, trace
    #[arg(long, default_value = "off")]
    log_level: String,

    /// Override the level for the CPU category only
    #[arg(long)]
    log_cpu: Option<String>,

    /// Write core logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Dump save-state to this file as JSON
    #[arg(long)]
    save: Option<PathBuf>,

    /// Suppress the register and memory dumps (still writes --save)
    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Skip the hex dump of the loaded image
    #[arg(long, default_value_t = false)]
    no_memory_dump: bool,
}

fn parse_address(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

fn parse_level(s: &str) -> Result<LogLevel> {
    LogLevel::from_str(s).ok_or_else(|| anyhow!("unknown log level: {}", s))
}

fn configure_logging(args: &Args) -> Result<()> {
    let config = LogConfig::global();
    config.set_global_level(parse_level(&args.log_level)?);
    if let Some(level) = args.log_cpu.as_deref() {
        config.set_level(LogCategory::Cpu, parse_level(level)?);
    }
    if args.trace {
        config.set_level(LogCategory::Cpu, LogLevel::Trace);
    }
    if let Some(path) = args.log_file.as_ref() {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }
    Ok(())
}

fn print_state(cpu: &Cpu8086<ArrayMemory>, args: &Args) {
    print!("{}", dump::format_registers(cpu.registers()));
    println!("Flags: {}", dump::format_flags(cpu.flags()));
    println!("Instructions executed: {}", cpu.instructions_executed());

    if !args.no_memory_dump {
        let origin = cpu.memory().image_origin();
        println!("\nLoaded image at {:05X}:", origin);
        print!("{}", dump::hex_dump(origin, cpu.loaded_image()));
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    configure_logging(&args)?;

    let mut cpu = Cpu8086::new(ArrayMemory::new());
    cpu.load_at(&args.program, args.origin)
        .with_context(|| format!("loading {}", args.program.display()))?;
    info!(
        "loaded {} bytes from {} at {:05X}",
        cpu.loaded_image().len(),
        args.program.display(),
        args.origin
    );

    // Dump and save even when execution fails, then report the error
    let outcome = match args.max_steps {
        Some(max) => cpu.run_for(max),
        None => cpu.run().map(Some),
    };

    if !args.quiet {
        print_state(&cpu, &args);
    }

    if let Some(path) = args.save.as_ref() {
        let state = cpu.save_state();
        let mut f = File::create(path)?;
        write!(f, "{}", serde_json::to_string_pretty(&state)?)?;
    }

    match outcome.context("execution stopped")? {
        Some(HaltReason::Halted) => {
            info!("halted after {} instructions", cpu.instructions_executed())
        }
        Some(HaltReason::RanOffEnd) => warn!("ran off the end of the image without a HLT"),
        None => warn!(
            "stopped after {} steps without halting",
            cpu.instructions_executed()
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0"), Ok(0));
        assert_eq!(parse_address("256"), Ok(256));
        assert_eq!(parse_address("0x100"), Ok(0x100));
        assert_eq!(parse_address("0XFFFF0"), Ok(0xFFFF0));
        assert!(parse_address("0xZZ").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::parse_from(["emu8086", "prog.bin"]);
        assert_eq!(args.origin, 0);
        assert_eq!(args.max_steps, None);
        assert_eq!(args.log_level, "off");
        assert!(!args.trace && !args.quiet && !args.no_memory_dump);

        let args = Args::parse_from(["emu8086", "prog.bin", "--origin", "0x7C00", "--max-steps", "50"]);
        assert_eq!(args.origin, 0x7C00);
        assert_eq!(args.max_steps, Some(50));
    }
}
