/// Decompilation and inspection
///
/// SEE prints a raw listing of a word's bytecode with branch targets.
/// word_source() reconstructs a loadable source line for one user word;
/// SAVE strings those together. Reconstruction is best-effort: IF/ELSE/
/// THEN and DO/LOOP come back structurally, the compiled string-print
/// pattern comes back as a ." literal, but a bare BRANCH that is not one
/// of those is emitted as ELSE, so BEGIN/WHILE/REPEAT bodies do not
/// round-trip.
///
use crate::internals::opcodes::{decode, Opcode};
use crate::kernel::Addr;
use crate::runtime::ForthRuntime;

impl ForthRuntime {
    /// SEE/LIST prints a word's bytecode, one instruction per line.
    pub fn see_word(&mut self, name: &str) -> bool {
        let word = match self.kernel.find_word(name) {
            Some(w) => w.clone(),
            None => {
                eprintln!("? {}", name);
                return false;
            }
        };
        let mut listing = format!(": {}\n", word.name);
        let mut pc = word.addr as usize;
        while pc < self.kernel.here() {
            match decode(&self.kernel, &mut pc) {
                Err(byte) => listing.push_str(&format!("  OP_{}\n", byte)),
                Ok((op, operand)) => match op {
                    Opcode::Exit => {
                        listing.push_str("  ;\n");
                        break;
                    }
                    Opcode::Lit => listing.push_str(&format!("  LIT {}\n", operand.cell())),
                    Opcode::Call => {
                        listing.push_str(&format!("  {}\n", self.name_for_addr(operand.addr())))
                    }
                    Opcode::Branch => {
                        listing.push_str(&format!("  BRANCH -> {}\n", operand.addr()))
                    }
                    Opcode::BranchIfZero => {
                        listing.push_str(&format!("  BRANCH0 -> {}\n", operand.addr()))
                    }
                    Opcode::Loop => listing.push_str(&format!("  LOOP -> {}\n", operand.addr())),
                    _ => listing.push_str(&format!("  {}\n", op.name())),
                },
            }
        }
        self.print_str(&listing);
        self.io.flush();
        true
    }

    /// The oldest word whose body starts at addr, or "?".
    fn name_for_addr(&self, addr: Addr) -> String {
        self.kernel
            .words()
            .iter()
            .find(|w| w.addr == addr)
            .map(|w| w.name.clone())
            .unwrap_or_else(|| "?".to_string())
    }

    /// word_source decompiles the word table entry at index back to one
    /// line of source.
    pub fn word_source(&self, index: usize) -> String {
        let word = &self.kernel.words()[index];
        let mut out = format!(": {} ", word.name);
        let mut pc = word.addr as usize;
        // forward BRANCH0 targets still waiting for their THEN
        let mut pending: Vec<usize> = Vec::new();
        let here = self.kernel.here();
        while pc < here {
            while let Some(pos) = pending.iter().position(|&t| t == pc) {
                pending.remove(pos);
                out.push_str("THEN ");
            }
            match decode(&self.kernel, &mut pc) {
                Err(_) => break,
                Ok((op, operand)) => match op {
                    Opcode::Exit => break,
                    Opcode::Lit => out.push_str(&format!("{} ", operand.cell())),
                    Opcode::Call => {
                        out.push_str(&format!("{} ", self.name_for_addr(operand.addr())))
                    }
                    Opcode::BranchIfZero => {
                        out.push_str("IF ");
                        pending.push(operand.addr() as usize);
                    }
                    Opcode::Do => out.push_str("DO "),
                    Opcode::Loop => out.push_str("LOOP "),
                    Opcode::Branch => {
                        let target = operand.addr() as usize;
                        if let Some((text, after)) = self.match_string_print(pc, target) {
                            out.push_str(&format!(".\" {}\" ", text));
                            pc = after;
                        } else {
                            // the IF now exits where this branch goes
                            if let Some(last) = pending.last_mut() {
                                *last = target;
                            }
                            out.push_str("ELSE ");
                        }
                    }
                    _ => {
                        out.push_str(op.name());
                        out.push(' ');
                    }
                },
            }
        }
        out.push(';');
        out
    }

    /// match_string_print recognizes the compiled ." pattern: a BRANCH
    /// over inline string bytes, landing on LIT str_addr / LIT str_len /
    /// TYPE. str_start is the byte after the BRANCH operand. Returns the
    /// text and the pc just past TYPE.
    fn match_string_print(&self, str_start: usize, target: usize) -> Option<(String, usize)> {
        if target <= str_start || target >= self.kernel.here() {
            return None;
        }
        let mut pc = target;
        let (op, addr_lit) = decode(&self.kernel, &mut pc).ok()?;
        if op != Opcode::Lit || addr_lit.cell() as usize != str_start {
            return None;
        }
        let (op, len_lit) = decode(&self.kernel, &mut pc).ok()?;
        if op != Opcode::Lit {
            return None;
        }
        let len = len_lit.cell();
        if len < 0 || str_start + len as usize != target {
            return None;
        }
        let (op, _) = decode(&self.kernel, &mut pc).ok()?;
        if op != Opcode::Type {
            return None;
        }
        let text =
            String::from_utf8_lossy(self.kernel.bytes(str_start, len as usize)).to_string();
        Some((text, pc))
    }
}
