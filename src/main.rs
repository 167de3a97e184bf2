//! mcu32 Emulator - CLI Entry Point
//!
//! Commands:
//! - `mcu32-emu run [program]` - Assemble and run a program (default: built-in demo)
//! - `mcu32-emu disasm [program]` - Assemble and print a labelled listing

use clap::{Parser, Subcommand};
use mcu32::asm::{self, Program};
use mcu32::{Cpu, Outcome, Port};
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "mcu32-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of a small 32-bit AVR-style microcontroller core")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program for a fixed number of instructions
    Run {
        /// Path to the assembly source (default: built-in LED demo)
        program: Option<String>,
        /// Number of instructions to run
        #[arg(short, long, default_value = "10000")]
        max_instructions: u64,
        /// Print every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Drive a port's pins: PORT:VALUE@INSTRUCTION, e.g. B:0x20@100
        #[arg(short, long = "input")]
        inputs: Vec<Stimulus>,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Assemble and disassemble a program with its labels
    Disasm {
        /// Path to the assembly source (default: built-in LED demo)
        program: Option<String>,
    },
}

/// A pin level change applied before a given instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stimulus {
    port: Port,
    value: u32,
    at: u64,
}

impl FromStr for Stimulus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (port, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("expected PORT:VALUE@INSTRUCTION, got '{}'", s))?;
        let (value, at) = rest
            .split_once('@')
            .ok_or_else(|| format!("missing '@INSTRUCTION' in '{}'", s))?;

        let port = Port::from_letter(port.trim()).ok_or_else(|| format!("unknown port '{}'", port))?;
        let value = asm::parse_number(value.trim()).map_err(|e| format!("{} in '{}'", e, s))?;
        let at = at
            .trim()
            .parse()
            .map_err(|_| format!("invalid instruction count '{}'", at))?;

        Ok(Stimulus { port, value, at })
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, max_instructions, trace, inputs, json }) => {
            run_program(program.as_deref(), max_instructions, trace, &inputs, json);
        }
        Some(Commands::Disasm { program }) => {
            disassemble_file(program.as_deref());
        }
        None => {
            println!("mcu32 Emulator v0.1.0");
            println!("A 32-bit AVR-style microcontroller emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Assemble the file at `path`, or the built-in demo.
fn load_program(path: Option<&str>) -> Program {
    let (name, source) = match path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(s) => (path.to_string(), s),
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        },
        None => ("<demo>".to_string(), asm::DEMO_SOURCE.to_string()),
    };

    match asm::assemble(&source) {
        Ok(program) => {
            log::info!("assembled {}: {} words", name, program.words.len());
            program
        }
        Err(e) => {
            eprintln!("❌ Assembly error in {}: {}", name, e);
            std::process::exit(1);
        }
    }
}

fn run_program(path: Option<&str>, max_instructions: u64, trace: bool, inputs: &[Stimulus], json: bool) {
    let program = load_program(path);

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&program.words) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    for executed in 0..max_instructions {
        for stimulus in inputs.iter().filter(|s| s.at == executed) {
            log::info!(
                "port {:?} <- {:#x} before instruction {}",
                stimulus.port,
                stimulus.value,
                executed
            );
            cpu.set_input(stimulus.port, stimulus.value);
        }

        let outcome = cpu.step();
        if !trace {
            continue;
        }

        let addr = cpu.last_fetch();
        let routine = program.routine_at(addr).unwrap_or("?");
        match outcome {
            Outcome::Executed(instr) => {
                println!("{:03x} {:<16} {:<24} SR={}", addr, routine, instr, cpu.sr);
            }
            Outcome::Interrupted { instruction, source } => {
                println!("{:03x} {:<16} {:<24} SR={}", addr, routine, instruction, cpu.sr);
                println!("    -> {} (vector {:#04x})", source.name(), source.vector());
            }
            Outcome::Reset(err) => {
                println!("    !! {}, processor reset", err);
            }
        }
    }

    let snapshot = cpu.snapshot();
    if json {
        match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        if trace {
            println!();
        }
        println!("{}", snapshot);
    }
}

fn disassemble_file(path: Option<&str>) {
    let program = load_program(path);
    print!("{}", asm::listing(&program));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stimulus() {
        let s: Stimulus = "B:0x20@100".parse().unwrap();
        assert_eq!(s, Stimulus { port: Port::B, value: 0x20, at: 100 });

        let s: Stimulus = "d:5@0".parse().unwrap();
        assert_eq!(s.port, Port::D);
        assert_eq!(s.value, 5);

        let s: Stimulus = "C:0b101@7".parse().unwrap();
        assert_eq!(s, Stimulus { port: Port::C, value: 0b101, at: 7 });
    }

    #[test]
    fn test_parse_stimulus_errors() {
        assert!("B0x20@100".parse::<Stimulus>().is_err());
        assert!("B:0x20".parse::<Stimulus>().is_err());
        assert!("E:1@1".parse::<Stimulus>().is_err());
        assert!("B:zz@1".parse::<Stimulus>().is_err());
    }
}
