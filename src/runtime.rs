//////////////////////////////////////////////////////////////////
/// runtime.rs
///
/// Forth Runtime Engine
///
/// This module defines the ForthRuntime struct, which aggregates the
/// whole state of the interpreter: the kernel image, the compile-time
/// control stack, the injected console, and the exit flag. It also
/// provides cold_start(), which installs the built-in primitives.
///
use crate::internals::console::{Console, StdConsole};
use crate::internals::messages::Msg;
use crate::internals::opcodes::Opcode;
use crate::kernel::{Addr, Kernel};

/// Maximum depth of the compile-time control stack.
pub const CSTACK_DEPTH: usize = 32;

/// A compile-time control stack entry. Patch sites carry the address of
/// a reserved two-byte operand slot; loop targets carry the address a
/// back-branch will jump to. THEN consumes If or Else, LOOP consumes Do,
/// REPEAT consumes While then Begin; anything else is a structure error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMarker {
    If(Addr),    // unresolved BRANCH0 operand slot
    Else(Addr),  // unresolved BRANCH operand slot
    Do(Addr),    // loop head, target of LOOP
    Begin(Addr), // loop head, target of REPEAT
    While(Addr), // unresolved BRANCH0 operand slot, above its Begin
}

pub struct ForthRuntime {
    pub kernel: Kernel,
    pub compiling: bool,
    pub cstack: Vec<ControlMarker>,
    pub io: Box<dyn Console>,
    pub exit_flag: bool, // set when BYE/QUIT/EXIT is executed
    pub msg: Msg,
}

// Every primitive is a two-byte stub: its opcode followed by EXIT.
// SAVE only emits entries past this table.
const PRIMITIVES: &[(&str, Opcode)] = &[
    ("+", Opcode::Add),
    ("-", Opcode::Sub),
    ("*", Opcode::Mul),
    ("/", Opcode::Div),
    ("DUP", Opcode::Dup),
    ("DROP", Opcode::Drop),
    ("SWAP", Opcode::Swap),
    ("OVER", Opcode::Over),
    (".", Opcode::Dot),
    ("AND", Opcode::And),
    ("OR", Opcode::Or),
    ("XOR", Opcode::Xor),
    ("NOT", Opcode::Not),
    ("<", Opcode::Lt),
    (">", Opcode::Gt),
    ("=", Opcode::Eq),
    ("<=", Opcode::Le),
    (">=", Opcode::Ge),
    ("<>", Opcode::Ne),
    ("@", Opcode::Load),
    ("!", Opcode::Store),
    ("C@", Opcode::LoadByte),
    ("C!", Opcode::StoreByte),
    ("I", Opcode::I),
    ("ROT", Opcode::Rot),
    ("2DUP", Opcode::TwoDup),
    ("2DROP", Opcode::TwoDrop),
    ("NIP", Opcode::Nip),
    ("TUCK", Opcode::Tuck),
    (">R", Opcode::ToR),
    ("R>", Opcode::RFrom),
    ("R@", Opcode::RFetch),
    ("MOD", Opcode::Mod),
    ("NEGATE", Opcode::Negate),
    ("ABS", Opcode::Abs),
    ("MIN", Opcode::Min),
    ("MAX", Opcode::Max),
    ("/MOD", Opcode::DivMod),
    ("1+", Opcode::OnePlus),
    ("1-", Opcode::OneMinus),
    ("0=", Opcode::ZeroEq),
    ("0<", Opcode::ZeroLt),
    ("0<>", Opcode::ZeroNe),
    ("?DUP", Opcode::QDup),
    ("+!", Opcode::PlusStore),
    ("ALLOT", Opcode::Allot),
    ("EMIT", Opcode::Emit),
    ("KEY", Opcode::Key),
    ("CR", Opcode::Cr),
    ("TYPE", Opcode::Type),
    ("HERE", Opcode::Here),
    (".S", Opcode::DotS),
    ("DEPTH", Opcode::Depth),
    ("CLEAR", Opcode::Clear),
    ("WORDS", Opcode::Words),
];

impl ForthRuntime {
    pub fn new() -> ForthRuntime {
        ForthRuntime::with_console(Box::new(StdConsole))
    }

    pub fn with_console(io: Box<dyn Console>) -> ForthRuntime {
        ForthRuntime {
            kernel: Kernel::new(),
            compiling: false,
            cstack: Vec::new(),
            io,
            exit_flag: false,
            msg: Msg::new(),
        }
    }

    /// cold_start installs the built-in primitives and records the
    /// boundary between them and user definitions.
    pub fn cold_start(&mut self) {
        for (name, op) in PRIMITIVES {
            let addr = self.kernel.here() as Addr;
            self.kernel.emit_byte(*op as u8);
            self.kernel.emit_byte(Opcode::Exit as u8);
            self.kernel.add_word(name, addr);
        }
        self.kernel.set_builtin_count(self.kernel.word_count());
        self.msg
            .info("cold_start", "primitives installed", Some(self.kernel.word_count()));
    }

    /// cpush places a marker on the compile-time control stack.
    pub fn cpush(&mut self, marker: ControlMarker) -> bool {
        if self.cstack.len() >= CSTACK_DEPTH {
            self.msg
                .error("compile", "Control structures nested too deeply", None::<bool>);
            return false;
        }
        self.cstack.push(marker);
        true
    }

    /// should_exit is set by the BYE/QUIT/EXIT directives; the REPL and
    /// batch drivers stop when they see it.
    pub fn should_exit(&self) -> bool {
        self.exit_flag
    }
}

/////////////////////////
/// TESTS
///
#[cfg(test)]
mod tests {
    use super::*;
    use crate::internals::opcodes::Opcode;

    #[test]
    fn test_cold_start_installs_primitives() {
        let mut forth = ForthRuntime::new();
        forth.cold_start();
        assert_eq!(forth.kernel.word_count(), PRIMITIVES.len());
        assert_eq!(forth.kernel.builtin_count(), PRIMITIVES.len());
        assert_eq!(forth.kernel.here(), PRIMITIVES.len() * 2);
    }

    #[test]
    fn test_primitive_stub_shape() {
        let mut forth = ForthRuntime::new();
        forth.cold_start();
        let plus = forth.kernel.find_word("+").unwrap();
        let addr = plus.addr as usize;
        assert_eq!(forth.kernel.dict_byte(addr), Opcode::Add as u8);
        assert_eq!(forth.kernel.dict_byte(addr + 1), Opcode::Exit as u8);
    }

    #[test]
    fn test_primitive_lookup() {
        let mut forth = ForthRuntime::new();
        forth.cold_start();
        assert!(forth.kernel.find_word("/MOD").is_some());
        assert!(forth.kernel.find_word("?DUP").is_some());
        assert!(forth.kernel.find_word("TYPE").is_some());
        assert!(forth.kernel.find_word("nosuch").is_none());
    }

    #[test]
    fn test_cpush_depth_limit() {
        let mut forth = ForthRuntime::new();
        for _ in 0..CSTACK_DEPTH {
            assert!(forth.cpush(ControlMarker::Begin(0)));
        }
        assert!(!forth.cpush(ControlMarker::Begin(0)));
        assert_eq!(forth.cstack.len(), CSTACK_DEPTH);
    }

    #[test]
    fn test_should_exit() {
        let mut forth = ForthRuntime::new();
        assert!(!forth.should_exit());
        forth.exit_flag = true;
        assert!(forth.should_exit());
    }
}
