use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Parser;
use clap_num::maybe_hex;

use chip8_core::emu::{
    CPU_HZ, Chip8, Chip8Config, Chip8Error, Chip8Result, Chip8Runner, KeyMap, Keypad, TIMER_HZ,
    UnknownOpcodePolicy,
};
use chip8_core::u4;

/// Headless CHIP-8 interpreter.
///
/// Runs a ROM for a fixed number of instructions and prints the final
/// register file and display. Keys 1-4, Q-R, A-F, Z-V map to CHIP-8 keys.
/// Set RUST_LOG=trace to log every executed instruction.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    /// Number of instructions to execute
    #[arg(short, long, default_value_t = 1000)]
    cycles: u64,

    /// Seed for the random number generator (decimal or 0x-prefixed hex)
    #[arg(short, long, value_parser = maybe_hex::<u64>)]
    seed: Option<u64>,

    /// Treat unknown opcodes as no-ops instead of stopping
    #[arg(long)]
    ignore_unknown: bool,

    /// Physical keys to hold down for the whole run, e.g. "qe".
    /// A key wait is answered by re-pressing the first of them.
    #[arg(short, long, default_value = "")]
    keys: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = std::fs::read(&args.rom_path).context("Failed to read ROM file")?;

    let mut chip8 = Chip8::with_config(Chip8Config {
        unknown_opcode: if args.ignore_unknown {
            UnknownOpcodePolicy::Ignore
        } else {
            UnknownOpcodePolicy::Error
        },
        seed: args.seed,
    });
    chip8
        .load(&rom)
        .context("Failed to load ROM into CHIP-8 memory")?;

    let held = parse_keys(&args.keys)?;
    let mut keypad = Keypad::new();
    for &key in &held {
        keypad.set_key(key, true);
    }
    let mut runner = Chip8Runner::new(chip8, keypad);

    let steps_per_tick = (CPU_HZ / TIMER_HZ).round() as u64;
    let mut executed = 0;
    while executed < args.cycles {
        match runner.step() {
            Ok(Chip8Result::Continue | Chip8Result::WaitForNextFrame) => {}
            Err(Chip8Error::KeyWaitCancelled) => {
                let Some(&key) = held.first() else {
                    log::info!("program is waiting for a key press, stopping");
                    break;
                };
                // Release and press again so the parked wait sees a fresh key-down
                log::debug!("answering key wait with held key {key}");
                let keypad = runner.keyboard_mut();
                keypad.set_key(key, false);
                keypad.set_key(key, true);
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "Chip8 Execution error at {:#05X}",
                        runner.chip8_ref().pc().wrapping_sub(2)
                    )
                });
            }
        }

        executed += 1;
        if executed % steps_per_tick == 0 {
            runner.tick_timers();
        }
    }

    print_state(runner.chip8_ref(), executed);
    Ok(())
}

fn parse_keys(keys: &str) -> anyhow::Result<Vec<u4>> {
    let map = KeyMap::default();

    keys.chars()
        .map(|c| {
            map.map(c)
                .ok_or_else(|| anyhow!("'{c}' is not mapped to a CHIP-8 key"))
        })
        .collect()
}

fn print_state(chip8: &Chip8, executed: u64) {
    println!(
        "executed {executed} instructions, PC={:#05X} I={:#05X} DT={} ST={}",
        chip8.pc(),
        chip8.i(),
        chip8.delay_timer(),
        chip8.sound_timer()
    );

    let registers: Vec<String> = u4::all()
        .map(|reg| format!("V{reg}={:02X}", chip8.v(reg)))
        .collect();
    println!("{}", registers.join(" "));
    print!("{}", chip8.display().to_text());
}
