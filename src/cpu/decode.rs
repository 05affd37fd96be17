//! Opcode table and microcode for the SAP-1.
//!
//! Every instruction runs through the same eight micro-steps. Steps 0-2
//! fetch the opcode nibble into IR; steps 3-7 depend on the opcode.
//! [`ControlUnit::decode`] is a pure function from (opcode, step, flags)
//! to the set of control signals asserted during that step.

use std::fmt;
use crate::cpu::alu::Flags;
use crate::nibble::Nibble;
use serde::{Serialize, Deserialize};

/// Decoded opcode.
///
/// Covers all sixteen nibble values: 0x9-0xD are reserved and behave
/// exactly like NOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// 0x0: do nothing
    Nop,
    /// 0x1: A := RAM[operand]
    Lda,
    /// 0x2: B := RAM[operand]; A := A + B
    Add,
    /// 0x3: B := RAM[operand]; A := A - B
    Sub,
    /// 0x4: RAM[operand] := A
    Sta,
    /// 0x5: A := operand
    Ldi,
    /// 0x6: PC := operand
    Jmp,
    /// 0x7: PC := operand if carry
    Jc,
    /// 0x8: PC := operand if zero
    Jz,
    /// 0x9-0xD: unassigned
    Reserved(Nibble),
    /// 0xE: OUT := A
    Out,
    /// 0xF: stop the clock
    Hlt,
}

impl Opcode {
    /// Every assigned opcode, in encoding order.
    pub const ASSIGNED: [Opcode; 11] = [
        Opcode::Nop,
        Opcode::Lda,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Sta,
        Opcode::Ldi,
        Opcode::Jmp,
        Opcode::Jc,
        Opcode::Jz,
        Opcode::Out,
        Opcode::Hlt,
    ];

    /// Decode the nibble held in IR.
    pub fn from_nibble(nibble: Nibble) -> Self {
        match nibble.value() {
            0x0 => Opcode::Nop,
            0x1 => Opcode::Lda,
            0x2 => Opcode::Add,
            0x3 => Opcode::Sub,
            0x4 => Opcode::Sta,
            0x5 => Opcode::Ldi,
            0x6 => Opcode::Jmp,
            0x7 => Opcode::Jc,
            0x8 => Opcode::Jz,
            0x9..=0xD => Opcode::Reserved(nibble),
            0xE => Opcode::Out,
            _ => Opcode::Hlt,
        }
    }

    /// The nibble this opcode is stored as.
    pub fn code(self) -> Nibble {
        match self {
            Opcode::Nop => Nibble::new(0x0),
            Opcode::Lda => Nibble::new(0x1),
            Opcode::Add => Nibble::new(0x2),
            Opcode::Sub => Nibble::new(0x3),
            Opcode::Sta => Nibble::new(0x4),
            Opcode::Ldi => Nibble::new(0x5),
            Opcode::Jmp => Nibble::new(0x6),
            Opcode::Jc => Nibble::new(0x7),
            Opcode::Jz => Nibble::new(0x8),
            Opcode::Reserved(n) => n,
            Opcode::Out => Nibble::new(0xE),
            Opcode::Hlt => Nibble::new(0xF),
        }
    }

    /// Assembly mnemonic. Reserved opcodes render as NOP.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop | Opcode::Reserved(_) => "NOP",
            Opcode::Lda => "LDA",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Sta => "STA",
            Opcode::Ldi => "LDI",
            Opcode::Jmp => "JMP",
            Opcode::Jc => "JC",
            Opcode::Jz => "JZ",
            Opcode::Out => "OUT",
            Opcode::Hlt => "HLT",
        }
    }

    /// Look up an assigned opcode by mnemonic, ignoring case.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ASSIGNED
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(mnemonic))
    }

    /// Whether the instruction is followed by an operand nibble.
    pub fn takes_operand(self) -> bool {
        matches!(
            self,
            Opcode::Lda
                | Opcode::Add
                | Opcode::Sub
                | Opcode::Sta
                | Opcode::Ldi
                | Opcode::Jmp
                | Opcode::Jc
                | Opcode::Jz
        )
    }

    /// Instruction size in nibbles.
    pub fn width(self) -> u8 {
        if self.takes_operand() { 2 } else { 1 }
    }
}

// ============================================================================
// Control signals
// ============================================================================

/// A single control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    /// CO: PC drives the bus
    CounterOut,
    /// CE: PC increments
    CounterEnable,
    /// J: PC loads from the bus
    Jump,
    /// LM: MAR loads from the bus
    LoadMar,
    /// RO: RAM[MAR] drives the bus
    RamOut,
    /// RI: RAM[MAR] loads from the bus
    RamIn,
    /// IO: IR drives the bus
    IrOut,
    /// II: IR loads from the bus
    IrIn,
    /// AO: A drives the bus
    AOut,
    /// AI: A loads from the bus
    AIn,
    /// BI: B loads from the bus
    BIn,
    /// OI: OUT loads from the bus
    OutIn,
    /// EO: ALU computes and drives the bus
    AluOut,
    /// SU: ALU subtracts instead of adding
    Subtract,
    /// HLT: stop the clock
    Halt,
}

impl Signal {
    /// All signals in display order.
    pub const ALL: [Signal; 15] = [
        Signal::CounterOut,
        Signal::CounterEnable,
        Signal::Jump,
        Signal::LoadMar,
        Signal::RamOut,
        Signal::RamIn,
        Signal::IrOut,
        Signal::IrIn,
        Signal::AOut,
        Signal::AIn,
        Signal::BIn,
        Signal::OutIn,
        Signal::AluOut,
        Signal::Subtract,
        Signal::Halt,
    ];

    /// Signals allowed to drive the bus, highest priority first.
    pub const PRODUCERS: [Signal; 5] = [
        Signal::CounterOut,
        Signal::RamOut,
        Signal::IrOut,
        Signal::AOut,
        Signal::AluOut,
    ];

    /// Short name as printed on a control panel.
    pub const fn name(self) -> &'static str {
        match self {
            Signal::CounterOut => "CO",
            Signal::CounterEnable => "CE",
            Signal::Jump => "J",
            Signal::LoadMar => "LM",
            Signal::RamOut => "RO",
            Signal::RamIn => "RI",
            Signal::IrOut => "IO",
            Signal::IrIn => "II",
            Signal::AOut => "AO",
            Signal::AIn => "AI",
            Signal::BIn => "BI",
            Signal::OutIn => "OI",
            Signal::AluOut => "EO",
            Signal::Subtract => "SU",
            Signal::Halt => "HLT",
        }
    }

    #[inline]
    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of control signals asserted during one micro-step.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Signal>", into = "Vec<Signal>")]
pub struct SignalSet(u16);

impl SignalSet {
    /// No signals asserted.
    pub const EMPTY: SignalSet = SignalSet(0);

    /// Build a set from a list of signals.
    pub const fn of(signals: &[Signal]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < signals.len() {
            bits |= signals[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// Add a signal.
    #[inline]
    pub fn insert(&mut self, signal: Signal) {
        self.0 |= signal.bit();
    }

    /// Whether a signal is asserted.
    #[inline]
    pub const fn contains(self, signal: Signal) -> bool {
        self.0 & signal.bit() != 0
    }

    /// Whether nothing is asserted.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Asserted signals in [`Signal::ALL`] order.
    pub fn iter(self) -> impl Iterator<Item = Signal> {
        Signal::ALL.into_iter().filter(move |s| self.contains(*s))
    }

    /// The signal that drives the bus this step, if any.
    ///
    /// If several producers are asserted the highest-priority one wins.
    pub fn bus_producer(self) -> Option<Signal> {
        Signal::PRODUCERS.into_iter().find(|s| self.contains(*s))
    }
}

impl FromIterator<Signal> for SignalSet {
    fn from_iter<I: IntoIterator<Item = Signal>>(iter: I) -> Self {
        let mut set = SignalSet::EMPTY;
        for signal in iter {
            set.insert(signal);
        }
        set
    }
}

impl From<Vec<Signal>> for SignalSet {
    fn from(signals: Vec<Signal>) -> Self {
        signals.into_iter().collect()
    }
}

impl From<SignalSet> for Vec<Signal> {
    fn from(set: SignalSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Signal::name)).finish()
    }
}

impl fmt::Display for SignalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }
        for (i, signal) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(signal.name())?;
        }
        Ok(())
    }
}

// ============================================================================
// Control unit
// ============================================================================

/// The microcode decoder. Holds no state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlUnit;

impl ControlUnit {
    /// Micro-steps per instruction cycle.
    pub const STEPS: u8 = 8;

    /// Signals asserted at `step` while `opcode` is in IR.
    pub fn decode(opcode: Nibble, step: u8, flags: Flags) -> SignalSet {
        use Signal::*;

        match step {
            0 => SignalSet::of(&[CounterOut, LoadMar]),
            1 => SignalSet::of(&[CounterEnable]),
            2 => SignalSet::of(&[RamOut, IrIn]),
            _ => Self::execute(Opcode::from_nibble(opcode), step, flags),
        }
    }

    fn execute(opcode: Opcode, step: u8, flags: Flags) -> SignalSet {
        use Signal::*;

        match (opcode, step) {
            (Opcode::Nop | Opcode::Reserved(_), _) => SignalSet::EMPTY,

            (Opcode::Out, 3) => SignalSet::of(&[AOut, OutIn]),
            (Opcode::Hlt, 3) => SignalSet::of(&[Halt]),
            (Opcode::Out | Opcode::Hlt, _) => SignalSet::EMPTY,

            // Operand fetch: PC -> MAR
            (_, 3) => SignalSet::of(&[CounterOut, LoadMar]),

            (Opcode::Ldi, 4) => SignalSet::of(&[RamOut, CounterEnable, AIn]),
            (Opcode::Lda | Opcode::Add | Opcode::Sub | Opcode::Sta, 4) => {
                SignalSet::of(&[RamOut, CounterEnable, LoadMar])
            }
            (Opcode::Jmp, 4) => Self::branch(true),
            (Opcode::Jc, 4) => Self::branch(flags.carry),
            (Opcode::Jz, 4) => Self::branch(flags.zero),

            (Opcode::Lda, 5) => SignalSet::of(&[RamOut, AIn]),
            (Opcode::Add, 5) => SignalSet::of(&[RamOut, BIn]),
            (Opcode::Sub, 5) => SignalSet::of(&[RamOut, BIn, Subtract]),
            (Opcode::Sta, 5) => SignalSet::of(&[AOut, RamIn]),

            (Opcode::Add, 6) => SignalSet::of(&[AluOut, AIn]),
            (Opcode::Sub, 6) => SignalSet::of(&[AluOut, AIn, Subtract]),

            _ => SignalSet::EMPTY,
        }
    }

    /// Step 4 of a jump. A taken jump loads PC without incrementing it;
    /// an untaken one just skips the operand.
    fn branch(taken: bool) -> SignalSet {
        use Signal::*;

        if taken {
            SignalSet::of(&[RamOut, Jump])
        } else {
            SignalSet::of(&[RamOut, CounterEnable])
        }
    }
}
