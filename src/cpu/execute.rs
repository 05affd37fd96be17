//! Clocked execution engine for the SAP-1.
//!
//! One call to [`Computer::clock_tick`] is one micro-step: the control
//! unit decodes the signals for the current step, they are applied in
//! three ordered phases, and the step counter advances.

use std::fmt;
use crate::cpu::{Alu, Bus, ControlUnit, Flags, Ram, Registers, Signal, SignalSet};
use crate::cpu::memory::MemoryError;
use crate::nibble::Nibble;
use serde::{Serialize, Deserialize};

/// The complete machine.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Computer {
    bus: Bus,
    regs: Registers,
    ram: Ram,
    alu: Alu,
    /// Current micro-step, 0..8.
    step: u8,
    halted: bool,
    /// Signals asserted on the most recent tick.
    signals: SignalSet,
    /// Ticks since the last reset.
    ticks: u64,
}

impl Computer {
    /// Create a computer with zeroed registers and memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every register, the ALU flags, the step counter and the halt
    /// flag. RAM is left untouched.
    pub fn reset(&mut self) {
        self.bus = Bus::new();
        self.regs.reset();
        self.alu.reset();
        self.step = 0;
        self.halted = false;
        self.signals = SignalSet::EMPTY;
        self.ticks = 0;
        log::debug!("computer reset");
    }

    /// Load a program into RAM starting at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.ram.load_program(program)
    }

    /// Advance one micro-step. Does nothing once halted.
    pub fn clock_tick(&mut self) {
        if self.halted {
            return;
        }

        let signals = ControlUnit::decode(self.regs.ir.read(), self.step, self.alu.flags());
        log::trace!("T{} IR={:X} {}", self.step, self.regs.ir.read(), signals);

        self.signals = signals;
        self.execute_signals(signals);

        self.step = (self.step + 1) % ControlUnit::STEPS;
        self.ticks += 1;
    }

    /// Apply one step's signals: bus producer, then consumers, then
    /// counter and halt.
    fn execute_signals(&mut self, signals: SignalSet) {
        // Phase 1: at most one component drives the bus
        match signals.bus_producer() {
            Some(Signal::CounterOut) => self.bus.write(self.regs.pc.read()),
            Some(Signal::RamOut) => self.bus.write(self.ram.read(self.regs.mar.read())),
            Some(Signal::IrOut) => self.bus.write(self.regs.ir.read()),
            Some(Signal::AOut) => self.bus.write(self.regs.a.read()),
            Some(Signal::AluOut) => {
                let subtract = signals.contains(Signal::Subtract);
                let result = self.alu.compute(self.regs.a.read(), self.regs.b.read(), subtract);
                self.bus.write(result);
            }
            _ => {}
        }

        // Phase 2: consumers latch the settled bus value
        let value = self.bus.read();
        if signals.contains(Signal::LoadMar) {
            self.regs.mar.load(value);
        }
        if signals.contains(Signal::IrIn) {
            self.regs.ir.load(value);
        }
        if signals.contains(Signal::AIn) {
            self.regs.a.load(value);
        }
        if signals.contains(Signal::BIn) {
            self.regs.b.load(value);
        }
        if signals.contains(Signal::OutIn) {
            self.regs.out.load(value);
        }
        if signals.contains(Signal::RamIn) {
            self.ram.write(self.regs.mar.read(), value);
        }
        if signals.contains(Signal::Jump) {
            self.regs.pc.load(value);
        }

        // Phase 3
        if signals.contains(Signal::CounterEnable) {
            self.regs.pc.increment();
        }
        if signals.contains(Signal::Halt) {
            self.halted = true;
            log::debug!("halted after {} ticks, OUT={}", self.ticks + 1, self.regs.out.read());
        }
    }

    /// Run ticks until the step counter wraps back to 0 or the machine
    /// halts. Returns the number of ticks taken.
    pub fn step_instruction(&mut self) -> u64 {
        let start = self.ticks;
        loop {
            self.clock_tick();
            if self.halted || self.step == 0 {
                break;
            }
        }
        self.ticks - start
    }

    /// Run for at most `max_ticks` ticks, stopping early on halt.
    ///
    /// Returns the number of ticks taken.
    pub fn run_limited(&mut self, max_ticks: u64) -> u64 {
        let start = self.ticks;
        while !self.halted && self.ticks - start < max_ticks {
            self.clock_tick();
        }
        self.ticks - start
    }

    // ==================== Accessors ====================

    /// Program counter.
    pub fn pc(&self) -> Nibble {
        self.regs.pc.read()
    }

    /// Memory address register.
    pub fn mar(&self) -> Nibble {
        self.regs.mar.read()
    }

    /// Instruction register.
    pub fn ir(&self) -> Nibble {
        self.regs.ir.read()
    }

    /// Accumulator.
    pub fn a(&self) -> Nibble {
        self.regs.a.read()
    }

    /// B register.
    pub fn b(&self) -> Nibble {
        self.regs.b.read()
    }

    /// Output register.
    pub fn out(&self) -> Nibble {
        self.regs.out.read()
    }

    /// The whole register file.
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Current bus value.
    pub fn bus(&self) -> Nibble {
        self.bus.read()
    }

    /// Memory, read-only.
    pub fn ram(&self) -> &Ram {
        &self.ram
    }

    /// Memory, for loading programs and patching cells.
    pub fn ram_mut(&mut self) -> &mut Ram {
        &mut self.ram
    }

    /// ALU flags from the last ALU-out step.
    pub fn flags(&self) -> Flags {
        self.alu.flags()
    }

    /// Last value the ALU computed.
    pub fn alu_result(&self) -> Nibble {
        self.alu.result()
    }

    /// The micro-step the next tick will execute.
    pub fn step(&self) -> u8 {
        self.step
    }

    /// Whether HLT has executed.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Signals asserted on the most recent tick.
    pub fn signals(&self) -> SignalSet {
        self.signals
    }

    /// Ticks since the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl fmt::Debug for Computer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computer")
            .field("step", &self.step)
            .field("halted", &self.halted)
            .field("ticks", &self.ticks)
            .field("regs", &self.regs)
            .field("flags", &self.alu.flags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: u8) -> Nibble {
        Nibble::new(v)
    }

    fn computer_with(program: &[u8]) -> Computer {
        let mut cpu = Computer::new();
        cpu.load_program(program).unwrap();
        cpu
    }

    fn tick(cpu: &mut Computer, count: usize) {
        for _ in 0..count {
            cpu.clock_tick();
        }
    }

    #[test]
    fn test_ldi() {
        let mut cpu = computer_with(&[0x5, 0x5]);
        tick(&mut cpu, 8);
        assert_eq!(cpu.a(), n(5));
        assert_eq!(cpu.pc(), n(2));
        assert_eq!(cpu.step(), 0);
    }

    #[test]
    fn test_add_from_memory() {
        let mut program = [0u8; 16];
        program[0] = 0x2;
        program[1] = 0xE;
        program[0xE] = 0x2;
        let mut cpu = computer_with(&program);
        cpu.regs.a.load(n(3));

        tick(&mut cpu, 8);

        assert_eq!(cpu.b(), n(2));
        assert_eq!(cpu.a(), n(5));
        assert!(!cpu.flags().carry);
        assert!(!cpu.flags().zero);
    }

    #[test]
    fn test_fetch_signals_per_step() {
        let mut cpu = computer_with(&[0x5, 0x7]);
        let mut seen = Vec::new();
        for _ in 0..8 {
            cpu.clock_tick();
            seen.push(cpu.signals().to_string());
        }
        assert_eq!(seen, ["CO LM", "CE", "RO II", "CO LM", "CE RO AI", "-", "-", "-"]);
    }

    #[test]
    fn test_jmp_lands_on_target() {
        let mut cpu = computer_with(&[0x6, 0x4, 0x0, 0x0, 0x5, 0x5]);
        tick(&mut cpu, 20);
        assert!(cpu.pc() > n(4));
        assert_eq!(cpu.a(), n(5));
    }

    #[test]
    fn test_jmp_sets_pc_exactly() {
        let mut cpu = computer_with(&[0x6, 0x9]);
        tick(&mut cpu, 8);
        assert_eq!(cpu.pc(), n(9));
    }

    #[test]
    fn test_jz_taken_after_add_of_zero() {
        let mut cpu = computer_with(&[
            0x5, 0x0, // LDI 0
            0x2, 0xE, // ADD 14 (holds 0)
            0x8, 0x8, // JZ 8
            0x5, 0x9, // LDI 9
            0x5, 0x5, // LDI 5
            0xF,      // HLT
            0x0, 0x0, 0x0,
            0x0,      // 14: 0
        ]);
        tick(&mut cpu, 40);
        assert_eq!(cpu.a(), n(5));
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_jc_taken_after_overflow() {
        let mut cpu = computer_with(&[
            0x5, 0xF, // LDI 15
            0x2, 0xE, // ADD 14 (holds 1)
            0x7, 0x8, // JC 8
            0x5, 0x9, // LDI 9
            0x5, 0x5, // LDI 5
            0xF,
            0x0, 0x0, 0x0,
            0x1,
        ]);
        tick(&mut cpu, 40);
        assert_eq!(cpu.a(), n(5));
        assert!(cpu.flags().carry);
    }

    #[test]
    fn test_ldi_zero_leaves_flags_alone() {
        let mut cpu = computer_with(&[
            0x5, 0x0, // LDI 0
            0x8, 0x6, // JZ 6
            0x5, 0x9, // LDI 9
            0xF,      // HLT
        ]);
        tick(&mut cpu, 8);
        assert_eq!(cpu.a(), n(0));
        assert!(!cpu.flags().zero);

        cpu.run_limited(100);
        assert_eq!(cpu.a(), n(9));
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_untaken_jump_skips_operand() {
        let mut cpu = computer_with(&[0x7, 0xA, 0x5, 0x3, 0xF]);
        tick(&mut cpu, 8);
        assert_eq!(cpu.pc(), n(2));
        assert_eq!(cpu.mar(), n(1));
        cpu.run_limited(100);
        assert_eq!(cpu.a(), n(3));
    }

    #[test]
    fn test_flags_are_stale_until_next_alu_step() {
        // SUB sets carry, LDA does not clear it, so JC still branches
        let mut cpu = computer_with(&[
            0x3, 0xF, // SUB 15 (holds 1): 0 - 1 borrows
            0x1, 0xE, // LDA 14
            0x7, 0x8, // JC 8
            0xF,      // HLT
            0x0,
            0xE,      // 8: OUT
            0xF,      // HLT
            0x0, 0x0, 0x0, 0x0,
            0x7,      // 14
            0x1,      // 15
        ]);
        cpu.run_limited(100);
        assert!(cpu.is_halted());
        assert_eq!(cpu.out(), n(7));
        assert_eq!(cpu.pc(), n(10));
    }

    #[test]
    fn test_halt_freezes_state() {
        let mut cpu = computer_with(&[0x5, 0x3, 0xE, 0xF]);
        cpu.run_limited(100);
        assert!(cpu.is_halted());
        assert_eq!(cpu.out(), n(3));

        let before = cpu.clone();
        tick(&mut cpu, 50);
        assert_eq!(cpu, before);
        assert_eq!(cpu.run_limited(10), 0);
        assert_eq!(cpu.step_instruction(), 0);
    }

    #[test]
    fn test_halt_tick_count() {
        let mut cpu = computer_with(&[0xF]);
        assert_eq!(cpu.run_limited(100), 4);
        assert_eq!(cpu.signals(), SignalSet::of(&[Signal::Halt]));
        assert_eq!(cpu.step(), 4);
    }

    #[test]
    fn test_reset_keeps_ram() {
        let mut cpu = computer_with(&[0x5, 0x3, 0xE, 0x2, 0x0, 0xF]);
        cpu.run_limited(100);
        assert!(cpu.is_halted());

        cpu.reset();

        assert!(!cpu.is_halted());
        assert_eq!(cpu.step(), 0);
        assert_eq!(cpu.ticks(), 0);
        assert_eq!(cpu.registers(), &Registers::new());
        assert_eq!(cpu.flags(), Flags::default());
        assert!(cpu.signals().is_empty());
        assert_eq!(cpu.ram().read(n(0)), n(0x5));
        assert_eq!(cpu.ram().read(n(5)), n(0xF));
    }

    #[test]
    fn test_step_instruction_is_eight_ticks() {
        let mut cpu = computer_with(&[0x0, 0xE, 0x5, 0x1, 0xF]);
        assert_eq!(cpu.step_instruction(), 8);
        assert_eq!(cpu.step_instruction(), 8);
        assert_eq!(cpu.step_instruction(), 8);
        assert_eq!(cpu.a(), n(1));
        assert_eq!(cpu.step_instruction(), 4);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_sta_writes_memory() {
        let mut cpu = computer_with(&[0x5, 0x9, 0x4, 0xC, 0xF]);
        cpu.run_limited(100);
        assert_eq!(cpu.ram().read(n(0xC)), n(9));
    }

    #[test]
    fn test_reserved_opcode_is_nop() {
        let mut cpu = computer_with(&[0xB, 0x5, 0x4, 0xF]);
        cpu.run_limited(100);
        assert!(cpu.is_halted());
        assert_eq!(cpu.a(), n(4));
    }

    #[test]
    fn test_pc_wraps_past_fifteen() {
        let mut program = [0u8; 16];
        program[15] = 0x5; // LDI with its operand at address 0
        program[0] = 0x0;
        let mut cpu = computer_with(&program);
        cpu.regs.pc.load(n(15));
        tick(&mut cpu, 8);
        assert_eq!(cpu.pc(), n(1));
    }

    #[test]
    fn test_self_modifying_code() {
        let mut cpu = computer_with(&[
            2, 0, // ADD 0
            4, 2, // STA 2
            1, 1, // LDA 1
            4, 0, // STA 0
            1, 2, // LDA 2
            4, 1, // STA 1
            6, 0, // JMP 0
        ]);

        tick(&mut cpu, 8);
        assert_eq!(cpu.a(), n(2));

        // Overwrites its own opcode at address 2
        tick(&mut cpu, 8);
        assert_eq!(cpu.ram().read(n(2)), n(2));

        tick(&mut cpu, 8);
        assert_eq!(cpu.a(), n(0));

        tick(&mut cpu, 8);
        assert_eq!(cpu.ram().read(n(0)), n(0));

        tick(&mut cpu, 8);
        assert_eq!(cpu.a(), n(2));

        tick(&mut cpu, 8);
        assert_eq!(cpu.ram().read(n(1)), n(2));

        tick(&mut cpu, 8);
        assert_eq!(cpu.pc(), n(0));

        // Address 0 now holds NOP
        tick(&mut cpu, 8);
        assert_eq!(cpu.pc(), n(1));

        // Address 1 now holds ADD 2
        tick(&mut cpu, 8);
        assert_eq!(cpu.a(), n(4));
    }

    #[test]
    fn test_fibonacci() {
        let mut cpu = computer_with(&[
            0x1, 0xE, // LDA 14
            0xE,      // OUT
            0x2, 0xD, // ADD 13
            0x4, 0xE, // STA 14
            0x3, 0xD, // SUB 13
            0x4, 0xD, // STA 13
            0x6, 0x0, // JMP 0
            0x0,      // 13: previous
            0x1,      // 14: current
        ]);

        let mut outputs = Vec::new();
        for _ in 0..8 {
            tick(&mut cpu, 56);
            outputs.push(cpu.out().value());
        }
        assert_eq!(outputs, [1, 1, 2, 3, 5, 8, 13, 5]);
    }

    #[test]
    fn test_max_of_two() {
        let max = |x: u8, y: u8| {
            let mut cpu = computer_with(&[
                0x1, 0xE, // LDA 14
                0x3, 0xF, // SUB 15
                0x7, 0xA, // JC 10
                0x1, 0xE, // LDA 14
                0x6, 0xC, // JMP 12
                0x1, 0xF, // 10: LDA 15
                0xE,      // 12: OUT
                0xF,      // HLT
                x,
                y,
            ]);
            cpu.run_limited(100);
            assert!(cpu.is_halted());
            cpu.out().value()
        };

        assert_eq!(max(5, 9), 9);
        assert_eq!(max(12, 3), 12);
    }

    #[test]
    fn test_double_in_place() {
        let mut cpu = computer_with(&[
            0x1, 0xA, // LDA 10
            0x2, 0xA, // ADD 10
            0x4, 0xA, // STA 10
            0xE,      // OUT
            0xF,      // HLT
            0x0, 0x0,
            0x3,      // 10
        ]);
        cpu.run_limited(100);
        assert!(cpu.is_halted());
        assert_eq!(cpu.out(), n(6));
        assert_eq!(cpu.ram().read(n(0xA)), n(6));
    }

    #[test]
    fn test_looping_counter_timing() {
        let mut cpu = computer_with(&[
            0x5, 0x0, // LDI 0
            0xE,      // 2: OUT
            0x2, 0xA, // ADD 10
            0x6, 0x2, // JMP 2
            0x0, 0x0, 0x0,
            0x1,      // 10
        ]);

        // ADD writes A on its seventh step, tick 23 of the run
        tick(&mut cpu, 22);
        assert_eq!(cpu.a(), n(0));
        tick(&mut cpu, 1);
        assert_eq!(cpu.a(), n(1));

        tick(&mut cpu, 300);
        assert!(!cpu.is_halted());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut cpu = computer_with(&[0x5, 0x3, 0xF]);
        cpu.run_limited(100);
        let json = serde_json::to_string(&cpu).unwrap();
        let back: Computer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cpu);
    }
}
