//! SAP-1 Emulator - CLI Entry Point
//!
//! Commands:
//! - `sap1-emu run <program>` - Run an ASM or image file
//! - `sap1-emu asm <source>` - Assemble to a memory image
//! - `sap1-emu disasm <image>` - Disassemble a memory image
//! - `sap1-emu test` - Built-in self test

use clap::{Parser, Subcommand};
use log::LevelFilter;
use sap1::asm::disassemble_at;
use sap1::{Computer, ControlUnit, Nibble, Opcode};
use simple_logger::SimpleLogger;

#[derive(Parser)]
#[command(name = "sap1-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "A 4-bit SAP-1 computer emulator with a microcoded control unit")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the ASM or image file to execute
        program: String,
        /// Maximum number of clock ticks to run
        #[arg(short, long, default_value = "1000")]
        max_ticks: u64,
        /// Print every instruction as it completes
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Assemble source to a memory image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file (prints a listing when omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a memory image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
    /// Run the built-in self-test
    Test,
}

const COUNTER_DEMO: &str = r#"
// Looping counter (0-15)
init:
  LDI 0    // start at 0
loop:
  OUT      // display A
  ADD inc  // add 1
  JMP loop // repeat

inc:
  DATA 1
"#;

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("⚠️  Logger unavailable: {}", e);
    }

    match cli.command {
        Some(Commands::Run { program, max_ticks, trace, json }) => {
            run_program(&program, max_ticks, trace, json);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { image }) => {
            disassemble_file(&image);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("SAP-1 Emulator v0.1.0");
            println!("A 4-bit microcoded computer emulator");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_counter();
        }
    }
}

/// Read a program as raw nibbles: `.asm` files are assembled, anything
/// else is treated as a memory image.
fn load_program_file(path: &str) -> Vec<u8> {
    use sap1::{assemble, load_image};

    if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(program) => {
                println!("📝 Assembled {} nibbles", program.size);
                program.to_bytes().to_vec()
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_image(path) {
            Ok(image) => {
                println!("📂 Loaded {} nibbles", image.len());
                image.into_iter().map(u8::from).collect()
            }
            Err(e) => {
                eprintln!("❌ Failed to load image: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_program(path: &str, max_ticks: u64, trace: bool, json: bool) {
    println!("🔧 Running: {}", path);

    let program = load_program_file(path);

    let mut cpu = Computer::new();
    if let Err(e) = cpu.load_program(&program) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    println!();
    println!("━━━ Execution ━━━");

    run_bounded(&mut cpu, max_ticks, |cpu, pc, text, opcode| {
        if trace {
            println!(
                "{:X}: {:<8} {}  Z={} C={}",
                pc,
                text,
                cpu.registers(),
                cpu.flags().zero as u8,
                cpu.flags().carry as u8,
            );
        }
        if opcode == Opcode::Out {
            println!("OUT: {}  {}", cpu.out(), lamps(cpu.out()));
        }
    });

    println!();
    println!("━━━ Result ━━━");
    println!("Ticks: {}", cpu.ticks());
    println!("Halted: {}", cpu.is_halted());
    println!("Registers: {}", cpu.registers());
    println!("Flags: Z={} C={}", cpu.flags().zero as u8, cpu.flags().carry as u8);
    println!("Bus: {:X}  ALU: {:X}  Step: {}", cpu.bus(), cpu.alu_result(), cpu.step());
    println!("OUT: {} (0x{:X}, {:04b})  {}", cpu.out(), cpu.out(), cpu.out(), lamps(cpu.out()));

    if json {
        match serde_json::to_string_pretty(&cpu) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("❌ Failed to serialize state: {}", e),
        }
    }

    if !cpu.is_halted() {
        println!();
        println!("⚠️  Reached max ticks limit ({}). Use --max-ticks to increase.", max_ticks);
    }
}

/// Execute whole instructions until halt or `max_ticks` total ticks.
///
/// `on_instruction` sees each completed instruction's address, text and
/// opcode. An instruction that would cross the limit is run only up to
/// it and not reported.
fn run_bounded<F>(cpu: &mut Computer, max_ticks: u64, mut on_instruction: F)
where
    F: FnMut(&Computer, Nibble, &str, Opcode),
{
    while !cpu.is_halted() && cpu.ticks() < max_ticks {
        let remaining = max_ticks - cpu.ticks();
        if remaining < u64::from(ControlUnit::STEPS - cpu.step()) {
            cpu.run_limited(remaining);
            break;
        }

        let pc = cpu.pc();
        let opcode = Opcode::from_nibble(cpu.ram().read(pc));
        let (text, _) = disassemble_at(cpu.ram().cells(), pc.index());

        cpu.step_instruction();
        on_instruction(cpu, pc, &text, opcode);
    }
}

/// The OUT register as a row of lamps, most significant bit first.
fn lamps(value: Nibble) -> String {
    (0..Nibble::WIDTH)
        .rev()
        .map(|n| if value.bit(n) { '●' } else { '○' })
        .collect()
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use sap1::{assemble, disassemble, save_image};

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let program = match assemble(&source) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} nibbles", program.size);
    for (label, addr) in &program.labels {
        println!("  {:<10} = {:X}", label, addr);
    }

    match output {
        Some(out_path) => {
            if let Err(e) = save_image(&out_path, &program.code) {
                eprintln!("❌ Failed to save image: {}", e);
                std::process::exit(1);
            }
            println!("✓ Saved to {}", out_path);
        }
        None => {
            println!();
            print!("{}", disassemble(&program.code));
        }
    }
}

fn disassemble_file(image_path: &str) {
    use sap1::{disassemble, load_image};

    let image = match load_image(image_path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load image: {}", e);
            std::process::exit(1);
        }
    };

    print!("{}", disassemble(&image));
}

fn demo_counter() {
    use sap1::assemble;

    println!("━━━ Looping Counter Demo ━━━");

    let program = match assemble(COUNTER_DEMO) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    let mut cpu = Computer::new();
    if let Err(e) = cpu.load_program(&program.to_bytes()) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    // LDI, then 18 passes through OUT/ADD/JMP
    cpu.step_instruction();
    let mut shown = Vec::new();
    for _ in 0..18 {
        cpu.step_instruction();
        shown.push(cpu.out().to_string());
        cpu.step_instruction();
        cpu.step_instruction();
    }

    println!("OUT: {}", shown.join(" "));
    println!();
    println!("✓ Counter wrapped from 15 back to 0");
}

fn run_self_test() {
    use sap1::{assemble, Flags, Signal};
    use sap1::cpu::Alu;

    println!("━━━ SAP-1 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Test 1: ALU wraps
    print!("ALU add/subtract wrap... ");
    let mut ok = true;
    let mut alu = Alu::new();
    for a in Nibble::all() {
        for b in Nibble::all() {
            let sum = alu.compute(a, b, false);
            let add_ok = sum.value() == (a.value() + b.value()) % 16
                && alu.flags().carry == (a.value() + b.value() > 15);
            let diff = alu.compute(a, b, true);
            let sub_ok = diff.value() == (a.value() + 16 - b.value()) % 16
                && alu.flags().carry == (a.value() < b.value());
            if !add_ok || !sub_ok {
                ok = false;
            }
        }
    }
    if ok { println!("✓"); passed += 1; }
    else { println!("✗"); failed += 1; }

    // Test 2: JMP never asserts CounterEnable
    print!("JMP skips counter increment... ");
    let set = ControlUnit::decode(Opcode::Jmp.code(), 4, Flags::default());
    if set.contains(Signal::Jump) && !set.contains(Signal::CounterEnable) {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (got {})", set);
        failed += 1;
    }

    // Test 3: LDI 5
    print!("LDI 5 in eight ticks... ");
    let mut cpu = Computer::new();
    let loaded = cpu.load_program(&[0x5, 0x5]).is_ok();
    for _ in 0..8 {
        cpu.clock_tick();
    }
    if loaded && cpu.a().value() == 5 && cpu.pc().value() == 2 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗ (A={}, PC={})", cpu.a(), cpu.pc());
        failed += 1;
    }

    // Test 4: Assembler
    print!("Assembler output... ");
    match assemble("LDI 5\nOUT\nHLT") {
        Ok(p) if p.to_bytes()[..5] == [5, 5, 0xE, 0xF, 0] => {
            println!("✓");
            passed += 1;
        }
        other => {
            println!("✗ ({:?})", other);
            failed += 1;
        }
    }

    // Test 5: Halt freezes state
    print!("HLT freezes the machine... ");
    let mut cpu = Computer::new();
    let loaded = cpu.load_program(&[0x5, 0x7, 0xE, 0xF]).is_ok();
    cpu.run_limited(100);
    let before = cpu.clone();
    cpu.run_limited(100);
    if loaded && cpu.is_halted() && cpu == before && cpu.out().value() == 7 {
        println!("✓");
        passed += 1;
    } else {
        println!("✗");
        failed += 1;
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_bounded_stops_at_limit() {
        // JMP 0 forever
        let mut cpu = Computer::new();
        cpu.load_program(&[0x6, 0x0]).unwrap();

        let mut seen = 0;
        run_bounded(&mut cpu, 20, |_, _, text, _| {
            assert_eq!(text, "JMP 0");
            seen += 1;
        });

        assert_eq!(cpu.ticks(), 20);
        assert_eq!(seen, 2);
        assert!(!cpu.is_halted());
    }

    #[test]
    fn test_run_bounded_stops_on_halt() {
        let mut cpu = Computer::new();
        cpu.load_program(&[0x5, 0x9, 0xE, 0xF]).unwrap();

        let mut outputs = Vec::new();
        run_bounded(&mut cpu, 1000, |cpu, _, _, opcode| {
            if opcode == Opcode::Out {
                outputs.push(cpu.out().value());
            }
        });

        assert!(cpu.is_halted());
        assert_eq!(outputs, [9]);
        assert_eq!(cpu.ticks(), 20);
    }

    #[test]
    fn test_lamps() {
        assert_eq!(lamps(Nibble::new(0b1010)), "●○●○");
        assert_eq!(lamps(Nibble::ZERO), "○○○○");
    }
}
