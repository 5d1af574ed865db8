/// Inner interpreter
///
/// execute() runs bytecode from a start address until the outermost EXIT.
/// Dispatch is one exhaustive match over the opcode enum; operands are
/// decoded by the shared decoder before the match, so every arm works on
/// a finished instruction.
///
/// The return stack is inherited from the VM: EXIT returns to the Rust
/// caller only when the return stack is empty at that moment, otherwise
/// it pops a return address. This makes execute() reentrant across
/// nested calls without a top-level sentinel, provided callers start
/// their own top-level runs with a clean return stack.
///
/// Bounds violations are never errors here. The kernel's lenient
/// accessors absorb them, and each opcode carries only the guards it
/// needs: the REPL never crashes on malformed user code, it merely
/// computes garbage.
///
use crate::internals::opcodes::{decode, Opcode};
use crate::kernel::{Addr, Cell, DICT_SIZE};
use crate::runtime::ForthRuntime;

impl ForthRuntime {
    pub fn execute(&mut self, start: Addr) {
        let mut pc = start as usize;
        loop {
            let (op, operand) = match decode(&self.kernel, &mut pc) {
                Ok(instr) => instr,
                Err(byte) => {
                    self.msg.error("execute", "Unknown opcode", Some(byte));
                    return;
                }
            };
            match op {
                Opcode::Exit => {
                    if self.kernel.rdepth() == 0 {
                        return;
                    }
                    pc = self.kernel.rpop() as Addr as usize;
                }
                Opcode::Lit => self.kernel.push(operand.cell()),
                Opcode::Call => {
                    self.kernel.rpush(pc as Cell); // resume after the operand
                    pc = operand.addr() as usize;
                }
                Opcode::Branch => pc = operand.addr() as usize,
                Opcode::BranchIfZero => {
                    if self.kernel.pop() == 0 {
                        pc = operand.addr() as usize;
                    }
                }

                Opcode::Do => {
                    // ( limit index -- ) R: ( -- limit index )
                    let index = self.kernel.pop();
                    let limit = self.kernel.pop();
                    self.kernel.rpush(limit);
                    self.kernel.rpush(index);
                }
                Opcode::Loop => {
                    let index = self.kernel.rpeek(0).wrapping_add(1);
                    let limit = self.kernel.rpeek(1);
                    if index < limit {
                        self.kernel.rset_top(index);
                        pc = operand.addr() as usize;
                    } else {
                        self.kernel.rdrop(2); // discard the loop frame
                    }
                }
                Opcode::I => {
                    if self.kernel.rdepth() >= 2 {
                        let index = self.kernel.rpeek(0);
                        self.kernel.push(index);
                    }
                }

                Opcode::Add => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(a.wrapping_add(b));
                }
                Opcode::Sub => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(a.wrapping_sub(b));
                }
                Opcode::Mul => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(a.wrapping_mul(b));
                }
                Opcode::Div => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(if b != 0 { a.wrapping_div(b) } else { 0 });
                }
                Opcode::Mod => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(if b != 0 { a.wrapping_rem(b) } else { 0 });
                }
                Opcode::DivMod => {
                    // ( a b -- rem quot )
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    if b != 0 {
                        self.kernel.push(a.wrapping_rem(b));
                        self.kernel.push(a.wrapping_div(b));
                    } else {
                        self.kernel.push(0);
                        self.kernel.push(0);
                    }
                }
                Opcode::Negate => {
                    let a = self.kernel.pop();
                    self.kernel.push(a.wrapping_neg());
                }
                Opcode::Abs => {
                    let a = self.kernel.pop();
                    self.kernel.push(a.wrapping_abs());
                }
                Opcode::Min => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(a.min(b));
                }
                Opcode::Max => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(a.max(b));
                }
                Opcode::OnePlus => {
                    if self.kernel.depth() > 0 {
                        let top = self.kernel.peek(0);
                        self.kernel.set_top(top.wrapping_add(1));
                    }
                }
                Opcode::OneMinus => {
                    if self.kernel.depth() > 0 {
                        let top = self.kernel.peek(0);
                        self.kernel.set_top(top.wrapping_sub(1));
                    }
                }

                Opcode::And => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(a & b);
                }
                Opcode::Or => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(a | b);
                }
                Opcode::Xor => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(a ^ b);
                }
                Opcode::Not => {
                    let a = self.kernel.pop();
                    self.kernel.push(!a);
                }

                Opcode::Lt => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(if a < b { -1 } else { 0 });
                }
                Opcode::Gt => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(if a > b { -1 } else { 0 });
                }
                Opcode::Eq => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(if a == b { -1 } else { 0 });
                }
                Opcode::Le => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(if a <= b { -1 } else { 0 });
                }
                Opcode::Ge => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(if a >= b { -1 } else { 0 });
                }
                Opcode::Ne => {
                    let b = self.kernel.pop();
                    let a = self.kernel.pop();
                    self.kernel.push(if a != b { -1 } else { 0 });
                }
                Opcode::ZeroEq => {
                    let a = self.kernel.pop();
                    self.kernel.push(if a == 0 { -1 } else { 0 });
                }
                Opcode::ZeroLt => {
                    let a = self.kernel.pop();
                    self.kernel.push(if a < 0 { -1 } else { 0 });
                }
                Opcode::ZeroNe => {
                    let a = self.kernel.pop();
                    self.kernel.push(if a != 0 { -1 } else { 0 });
                }

                Opcode::Dup => {
                    if self.kernel.depth() > 0 {
                        let top = self.kernel.peek(0);
                        self.kernel.push(top);
                    }
                }
                Opcode::Drop => {
                    self.kernel.pop();
                }
                Opcode::Swap => {
                    if self.kernel.depth() >= 2 {
                        let b = self.kernel.pop();
                        let a = self.kernel.pop();
                        self.kernel.push(b);
                        self.kernel.push(a);
                    }
                }
                Opcode::Over => {
                    if self.kernel.depth() >= 2 {
                        let second = self.kernel.peek(1);
                        self.kernel.push(second);
                    }
                }
                Opcode::Rot => {
                    // ( a b c -- b c a )
                    if self.kernel.depth() >= 3 {
                        let c = self.kernel.pop();
                        let b = self.kernel.pop();
                        let a = self.kernel.pop();
                        self.kernel.push(b);
                        self.kernel.push(c);
                        self.kernel.push(a);
                    }
                }
                Opcode::TwoDup => {
                    // ( a b -- a b a b )
                    if self.kernel.depth() >= 2 {
                        let b = self.kernel.peek(0);
                        let a = self.kernel.peek(1);
                        self.kernel.push(a);
                        self.kernel.push(b);
                    }
                }
                Opcode::TwoDrop => {
                    if self.kernel.depth() >= 2 {
                        self.kernel.pop();
                        self.kernel.pop();
                    }
                }
                Opcode::Nip => {
                    // ( a b -- b )
                    if self.kernel.depth() >= 2 {
                        let b = self.kernel.pop();
                        self.kernel.pop();
                        self.kernel.push(b);
                    }
                }
                Opcode::Tuck => {
                    // ( a b -- b a b )
                    if self.kernel.depth() >= 2 {
                        let b = self.kernel.pop();
                        let a = self.kernel.pop();
                        self.kernel.push(b);
                        self.kernel.push(a);
                        self.kernel.push(b);
                    }
                }
                Opcode::QDup => {
                    if self.kernel.depth() > 0 && self.kernel.peek(0) != 0 {
                        let top = self.kernel.peek(0);
                        self.kernel.push(top);
                    }
                }

                Opcode::ToR => {
                    let val = self.kernel.pop();
                    self.kernel.rpush(val);
                }
                Opcode::RFrom => {
                    if self.kernel.rdepth() > 0 {
                        let val = self.kernel.rpop();
                        self.kernel.push(val);
                    }
                }
                Opcode::RFetch => {
                    if self.kernel.rdepth() > 0 {
                        let val = self.kernel.rpeek(0);
                        self.kernel.push(val);
                    }
                }

                Opcode::Load => {
                    let addr = self.kernel.pop();
                    let val = self.kernel.cell_at(addr);
                    self.kernel.push(val);
                }
                Opcode::Store => {
                    let addr = self.kernel.pop();
                    let val = self.kernel.pop();
                    self.kernel.set_cell(addr, val);
                }
                Opcode::LoadByte => {
                    let addr = self.kernel.pop();
                    let val = self.kernel.byte_at(addr);
                    self.kernel.push(val);
                }
                Opcode::StoreByte => {
                    let addr = self.kernel.pop();
                    let val = self.kernel.pop();
                    self.kernel.set_byte(addr, val);
                }
                Opcode::PlusStore => {
                    // ( n addr -- )
                    let addr = self.kernel.pop();
                    let val = self.kernel.pop();
                    let old = self.kernel.cell_at(addr);
                    self.kernel.set_cell(addr, old.wrapping_add(val));
                }
                Opcode::Allot => {
                    let n = self.kernel.pop();
                    self.kernel.allot(n);
                }
                Opcode::Here => {
                    let here = self.kernel.here() as Cell;
                    self.kernel.push(here);
                }

                Opcode::Emit => {
                    let c = self.kernel.pop();
                    self.io.put(c as u8);
                    self.io.flush();
                }
                Opcode::Key => {
                    let c = self.io.key();
                    self.kernel.push(c);
                }
                Opcode::Cr => {
                    self.io.put(b'\n');
                    self.io.flush();
                }
                Opcode::Type => {
                    // ( addr len -- )
                    let len = self.kernel.pop();
                    let addr = self.kernel.pop();
                    if addr >= 0 && len >= 0 && addr as i64 + len as i64 <= DICT_SIZE as i64 {
                        for i in 0..len {
                            let b = self.kernel.byte_at(addr + i) as u8;
                            self.io.put(b);
                        }
                        self.io.flush();
                    }
                }
                Opcode::Dot => {
                    if self.kernel.depth() > 0 {
                        let val = self.kernel.pop();
                        self.print_num(val);
                        self.io.flush();
                    }
                }
                Opcode::DotS => self.show_stack(),
                Opcode::Depth => {
                    let depth = self.kernel.depth() as Cell;
                    self.kernel.push(depth);
                }
                Opcode::Clear => self.kernel.clear_stack(),
                Opcode::Words => self.list_words(),
            }
        }
    }
}

//////////////////////////////////////////////
/// TESTS
///
/// These assemble raw bytecode against the kernel and observe stacks
/// or captured output.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::internals::console::capture::{output, Capture};
    use crate::internals::opcodes::Opcode as Op;
    use crate::kernel::CELL_BYTES;

    fn vm() -> ForthRuntime {
        let (console, _) = Capture::new();
        ForthRuntime::with_console(Box::new(console))
    }

    fn vm_with_output() -> (ForthRuntime, std::rc::Rc<std::cell::RefCell<Vec<u8>>>) {
        let (console, out) = Capture::new();
        (ForthRuntime::with_console(Box::new(console)), out)
    }

    fn emit_lit(forth: &mut ForthRuntime, val: Cell) {
        forth.kernel.emit_byte(Op::Lit as u8);
        forth.kernel.emit_cell(val);
    }

    #[test]
    fn test_lit_add() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 5);
        emit_lit(&mut forth, 3);
        forth.kernel.emit_byte(Op::Add as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.depth(), 1);
        assert_eq!(forth.kernel.pop(), 8);
    }

    #[test]
    fn test_wrapping_arithmetic() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, Cell::MAX);
        emit_lit(&mut forth, 1);
        forth.kernel.emit_byte(Op::Add as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), Cell::MIN);
    }

    #[test]
    fn test_div_mod_by_zero() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 7);
        emit_lit(&mut forth, 0);
        forth.kernel.emit_byte(Op::Div as u8);
        emit_lit(&mut forth, 7);
        emit_lit(&mut forth, 0);
        forth.kernel.emit_byte(Op::Mod as u8);
        emit_lit(&mut forth, 7);
        emit_lit(&mut forth, 0);
        forth.kernel.emit_byte(Op::DivMod as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.depth(), 4);
        assert_eq!(forth.kernel.pop(), 0); // /MOD quotient
        assert_eq!(forth.kernel.pop(), 0); // /MOD remainder
        assert_eq!(forth.kernel.pop(), 0); // MOD
        assert_eq!(forth.kernel.pop(), 0); // DIV
    }

    #[test]
    fn test_divmod_order() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 17);
        emit_lit(&mut forth, 5);
        forth.kernel.emit_byte(Op::DivMod as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), 3); // quotient on top
        assert_eq!(forth.kernel.pop(), 2); // remainder below
    }

    #[test]
    fn test_comparison_flags() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 2);
        emit_lit(&mut forth, 3);
        forth.kernel.emit_byte(Op::Lt as u8);
        emit_lit(&mut forth, 2);
        emit_lit(&mut forth, 3);
        forth.kernel.emit_byte(Op::Ge as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), 0);
        assert_eq!(forth.kernel.pop(), -1);
    }

    #[test]
    fn test_rot_and_tuck() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 1);
        emit_lit(&mut forth, 2);
        emit_lit(&mut forth, 3);
        forth.kernel.emit_byte(Op::Rot as u8); // 2 3 1
        forth.kernel.emit_byte(Op::Tuck as u8); // 2 1 3 1
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), 1);
        assert_eq!(forth.kernel.pop(), 3);
        assert_eq!(forth.kernel.pop(), 1);
        assert_eq!(forth.kernel.pop(), 2);
    }

    #[test]
    fn test_empty_stack_guards() {
        // DUP, SWAP, 1+ do nothing on an understocked stack; binary ops
        // compute on absorbed zeros. Nothing crashes.
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        forth.kernel.emit_byte(Op::Dup as u8);
        forth.kernel.emit_byte(Op::Swap as u8);
        forth.kernel.emit_byte(Op::OnePlus as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.depth(), 0);
    }

    #[test]
    fn test_add_on_empty_pushes_zero() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        forth.kernel.emit_byte(Op::Add as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.depth(), 1);
        assert_eq!(forth.kernel.pop(), 0);
    }

    #[test]
    fn test_do_loop_sum() {
        // 0 10 0 DO I + LOOP => 45
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 0);
        emit_lit(&mut forth, 10);
        emit_lit(&mut forth, 0);
        forth.kernel.emit_byte(Op::Do as u8);
        let head = forth.kernel.here() as Addr;
        forth.kernel.emit_byte(Op::I as u8);
        forth.kernel.emit_byte(Op::Add as u8);
        forth.kernel.emit_byte(Op::Loop as u8);
        forth.kernel.emit_addr(head);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), 45);
        assert_eq!(forth.kernel.rdepth(), 0);
    }

    #[test]
    fn test_do_loop_equal_bounds_runs_once() {
        // 5 5 DO ... LOOP executes the body exactly once.
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 0);
        emit_lit(&mut forth, 5);
        emit_lit(&mut forth, 5);
        forth.kernel.emit_byte(Op::Do as u8);
        let head = forth.kernel.here() as Addr;
        forth.kernel.emit_byte(Op::OnePlus as u8);
        forth.kernel.emit_byte(Op::Loop as u8);
        forth.kernel.emit_addr(head);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), 1);
        assert_eq!(forth.kernel.rdepth(), 0);
    }

    #[test]
    fn test_nested_calls_unwind() {
        let mut forth = vm();
        // callee: DUP * EXIT
        let callee = forth.kernel.here() as Addr;
        forth.kernel.emit_byte(Op::Dup as u8);
        forth.kernel.emit_byte(Op::Mul as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        // caller: LIT 3, CALL callee, CALL callee, EXIT
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 3);
        forth.kernel.emit_byte(Op::Call as u8);
        forth.kernel.emit_addr(callee);
        forth.kernel.emit_byte(Op::Call as u8);
        forth.kernel.emit_addr(callee);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), 81);
        assert_eq!(forth.kernel.rdepth(), 0);
    }

    #[test]
    fn test_branch_if_zero() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 0);
        forth.kernel.emit_byte(Op::BranchIfZero as u8);
        let site = forth.kernel.here() as Addr;
        forth.kernel.emit_addr(0);
        emit_lit(&mut forth, 111); // skipped
        let target = forth.kernel.here() as Addr;
        forth.kernel.patch_addr(site, target);
        emit_lit(&mut forth, 222);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.depth(), 1);
        assert_eq!(forth.kernel.pop(), 222);
    }

    #[test]
    fn test_memory_ops() {
        let mut forth = vm();
        let var = 1000 as Cell; // an arbitrary in-range slot
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 17);
        emit_lit(&mut forth, var);
        forth.kernel.emit_byte(Op::Store as u8);
        emit_lit(&mut forth, 5);
        emit_lit(&mut forth, var);
        forth.kernel.emit_byte(Op::PlusStore as u8);
        emit_lit(&mut forth, var);
        forth.kernel.emit_byte(Op::Load as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), 22);
    }

    #[test]
    fn test_store_out_of_range_ignored() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 42);
        emit_lit(&mut forth, 100_000);
        forth.kernel.emit_byte(Op::Store as u8);
        emit_lit(&mut forth, 100_000);
        forth.kernel.emit_byte(Op::Load as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), 0);
    }

    #[test]
    fn test_dot_and_emit_output() {
        let (mut forth, out) = vm_with_output();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 42);
        forth.kernel.emit_byte(Op::Dot as u8);
        emit_lit(&mut forth, 'h' as Cell);
        forth.kernel.emit_byte(Op::Emit as u8);
        forth.kernel.emit_byte(Op::Cr as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(output(&out), "42 h\n");
    }

    #[test]
    fn test_type_prints_dictionary_bytes() {
        let (mut forth, out) = vm_with_output();
        let text = forth.kernel.here();
        for b in b"hi" {
            forth.kernel.emit_byte(*b);
        }
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, text as Cell);
        emit_lit(&mut forth, 2);
        forth.kernel.emit_byte(Op::Type as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(output(&out), "hi");
    }

    #[test]
    fn test_key_reads_input() {
        let (console, _) = Capture::with_input(b"Z");
        let mut forth = ForthRuntime::with_console(Box::new(console));
        let start = forth.kernel.here() as Addr;
        forth.kernel.emit_byte(Op::Key as u8);
        forth.kernel.emit_byte(Op::Key as u8); // exhausted: -1
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), -1);
        assert_eq!(forth.kernel.pop(), 'Z' as Cell);
    }

    #[test]
    fn test_return_stack_transfer() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 7);
        forth.kernel.emit_byte(Op::ToR as u8);
        forth.kernel.emit_byte(Op::RFetch as u8);
        forth.kernel.emit_byte(Op::RFrom as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), 7);
        assert_eq!(forth.kernel.pop(), 7);
        assert_eq!(forth.kernel.rdepth(), 0);
    }

    #[test]
    fn test_unknown_opcode_stops() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 1);
        forth.kernel.emit_byte(0xEE);
        emit_lit(&mut forth, 2); // never reached
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        // stacks are not cleared on the error path
        assert_eq!(forth.kernel.depth(), 1);
        assert_eq!(forth.kernel.pop(), 1);
    }

    #[test]
    fn test_runaway_pc_terminates() {
        // Beyond HERE the dictionary reads as zeroes, i.e. EXIT.
        let mut forth = vm();
        forth.execute(2000);
        assert_eq!(forth.kernel.depth(), 0);
    }

    #[test]
    fn test_here_and_allot() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        forth.kernel.emit_byte(Op::Here as u8);
        emit_lit(&mut forth, CELL_BYTES as Cell);
        forth.kernel.emit_byte(Op::Allot as u8);
        forth.kernel.emit_byte(Op::Here as u8);
        forth.kernel.emit_byte(Op::Exit as u8);
        let end = forth.kernel.here() as Cell;
        forth.execute(start);
        assert_eq!(forth.kernel.pop(), end + CELL_BYTES as Cell);
        assert_eq!(forth.kernel.pop(), end);
    }

    #[test]
    fn test_qdup() {
        let mut forth = vm();
        let start = forth.kernel.here() as Addr;
        emit_lit(&mut forth, 0);
        forth.kernel.emit_byte(Op::QDup as u8); // zero: untouched
        emit_lit(&mut forth, 9);
        forth.kernel.emit_byte(Op::QDup as u8); // non-zero: duplicated
        forth.kernel.emit_byte(Op::Exit as u8);
        forth.execute(start);
        assert_eq!(forth.kernel.depth(), 3);
        assert_eq!(forth.kernel.pop(), 9);
        assert_eq!(forth.kernel.pop(), 9);
        assert_eq!(forth.kernel.pop(), 0);
    }
}
