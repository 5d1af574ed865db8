/// Compiler and Interpreter
///
/// interpret_line() drives the tokenizer over one line of source. Each
/// token either executes immediately or compiles bytecode at HERE,
/// depending on the compiling flag. Structural tokens manipulate the
/// typed control-flow stack and patch forward branch operands once their
/// targets are known.
///
/// Every handler returns a success flag; the first failure aborts the
/// line and leaves the VM usable. Bytes already emitted by a failing
/// line are not rolled back.
///
use crate::internals::opcodes::Opcode;
use crate::kernel::{Addr, Cell, CELL_BYTES, NAME_MAX};
use crate::runtime::{ControlMarker, ForthRuntime};

/// next_token extracts the next whitespace-separated token, byte-wise
/// upper-cased and truncated to NAME_MAX bytes (the excess is skipped).
/// Returns the token and the unread remainder, or None at end of line.
pub fn next_token(input: &str) -> Option<(String, &str)> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }
    let mut token = String::new();
    let mut taken = 0;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && taken < NAME_MAX {
        token.push(bytes[i].to_ascii_uppercase() as char);
        i += 1;
        taken += 1;
    }
    // skip whatever remains of an over-long token
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    Some((token, &input[i..]))
}

/// strip_line_comment truncates at a backslash that stands alone as a
/// token (start of line or preceded by whitespace).
pub fn strip_line_comment(line: &str) -> &str {
    if let Some(pos) = line.find('\\') {
        if pos == 0 || line.as_bytes()[pos - 1].is_ascii_whitespace() {
            return &line[..pos];
        }
    }
    line
}

impl ForthRuntime {
    /// interpret_line processes one line of source. Returns false on the
    /// first failure.
    pub fn interpret_line(&mut self, line: &str) -> bool {
        let mut rest = strip_line_comment(line);
        while let Some((token, after)) = next_token(rest) {
            rest = after;
            self.msg.debug("interpret", "token", Some(&token));
            match token.as_str() {
                "(" => {
                    // skip input through the closing paren; no nesting
                    let bytes = rest.as_bytes();
                    let mut i = 0;
                    while i < bytes.len() && bytes[i] != b')' {
                        i += 1;
                    }
                    if i < bytes.len() {
                        i += 1;
                    }
                    rest = &rest[i..];
                }
                ":" => match next_token(rest) {
                    Some((name, after)) => {
                        rest = after;
                        if !self.define_word(&name) {
                            return false;
                        }
                    }
                    None => {
                        self.msg.error(":", "Definition needs a name", None::<bool>);
                        return false;
                    }
                },
                ";" => {
                    if !self.end_definition() {
                        return false;
                    }
                }
                "BYE" | "QUIT" | "EXIT" => {
                    self.exit_flag = true;
                    return true;
                }
                "IF" => {
                    if !self.compile_if() {
                        return false;
                    }
                }
                "THEN" => {
                    if !self.compile_then() {
                        return false;
                    }
                }
                "ELSE" => {
                    if !self.compile_else() {
                        return false;
                    }
                }
                "DO" => {
                    if !self.compile_do() {
                        return false;
                    }
                }
                "LOOP" => {
                    if !self.compile_loop() {
                        return false;
                    }
                }
                "BEGIN" => {
                    if !self.compile_begin() {
                        return false;
                    }
                }
                "WHILE" => {
                    if !self.compile_while() {
                        return false;
                    }
                }
                "REPEAT" => {
                    if !self.compile_repeat() {
                        return false;
                    }
                }
                ".\"" => match self.dot_quote(rest) {
                    Some(after) => rest = after,
                    None => return false,
                },
                "CONSTANT" => match next_token(rest) {
                    Some((name, after)) => {
                        rest = after;
                        if !self.define_constant(&name) {
                            return false;
                        }
                    }
                    None => {
                        self.msg
                            .error("CONSTANT", "CONSTANT needs a name", None::<bool>);
                        return false;
                    }
                },
                "VARIABLE" => match next_token(rest) {
                    Some((name, after)) => {
                        rest = after;
                        if !self.define_variable(&name) {
                            return false;
                        }
                    }
                    None => {
                        self.msg
                            .error("VARIABLE", "VARIABLE needs a name", None::<bool>);
                        return false;
                    }
                },
                "SEE" | "LIST" | "LOAD" | "SAVE" | "SAVEB" | "LOADB" => {
                    match next_token(rest) {
                        Some((name, after)) => {
                            rest = after;
                            let ok = match token.as_str() {
                                "LOAD" => self.load_source(&name),
                                "SAVE" => self.save_source(&name),
                                "SAVEB" => self.save_binary(&name),
                                "LOADB" => self.load_binary(&name),
                                _ => self.see_word(&name),
                            };
                            if !ok {
                                return false;
                            }
                            if self.exit_flag {
                                return true; // a loaded file said BYE
                            }
                        }
                        None => {
                            self.msg.error(&token, "Needs a name", None::<bool>);
                            return false;
                        }
                    }
                }
                // I must be inlined when compiling, never compiled as a
                // call; in immediate mode it reads the innermost frame.
                "I" => {
                    if self.compiling {
                        if !self.emit_op(Opcode::I) {
                            return false;
                        }
                    } else if self.kernel.rdepth() >= 2 {
                        let index = self.kernel.rpeek(0);
                        self.kernel.push(index);
                    }
                }
                _ => {
                    if !self.interpret_token(&token) {
                        eprintln!("? {}", token);
                        return false;
                    }
                }
            }
        }
        true
    }

    /// interpret_token resolves a word name or a literal number.
    fn interpret_token(&mut self, token: &str) -> bool {
        if let Some(word) = self.kernel.find_word(token) {
            let addr = word.addr;
            if self.compiling {
                return self.emit_op(Opcode::Call) && self.emit_addr_checked(addr);
            }
            self.execute(addr);
            return true;
        }
        // parse wide, then narrow with wrap
        if let Ok(val) = token.parse::<i64>() {
            let val = val as Cell;
            if self.compiling {
                return self.emit_op(Opcode::Lit) && self.emit_cell_checked(val);
            }
            self.kernel.push(val);
            return true;
        }
        false
    }

    /// ":" starts a definition at HERE. Stale control markers from an
    /// abandoned definition are discarded here, so redefining is the
    /// documented way to reset after a structure error.
    fn define_word(&mut self, name: &str) -> bool {
        if self.kernel.find_word(name).is_some() {
            self.msg.warning(":", "Redefining", Some(name));
        }
        let addr = self.kernel.here() as Addr;
        if !self.kernel.add_word(name, addr) {
            self.msg.error(":", "Word table is full", Some(name));
            return false;
        }
        self.cstack.clear();
        self.compiling = true;
        true
    }

    /// ";" finishes the definition with EXIT.
    fn end_definition(&mut self) -> bool {
        if !self.compiling {
            self.msg.error(";", "; outside a definition", None::<bool>);
            return false;
        }
        if !self.cstack.is_empty() {
            self.msg
                .error(";", "Unbalanced control structure", None::<bool>);
            return false;
        }
        if !self.emit_op(Opcode::Exit) {
            return false;
        }
        self.compiling = false;
        true
    }

    fn compile_if(&mut self) -> bool {
        if !self.compiling {
            self.msg
                .error("IF", "IF only works in compilation mode", None::<bool>);
            return false;
        }
        if !self.emit_op(Opcode::BranchIfZero) {
            return false;
        }
        let site = self.kernel.here() as Addr;
        if !self.emit_addr_checked(0) {
            return false;
        }
        self.cpush(ControlMarker::If(site))
    }

    fn compile_then(&mut self) -> bool {
        if !self.compiling {
            self.msg.error("THEN", "THEN without IF", None::<bool>);
            return false;
        }
        match self.cstack.pop() {
            Some(ControlMarker::If(site)) | Some(ControlMarker::Else(site)) => {
                let here = self.kernel.here() as Addr;
                self.kernel.patch_addr(site, here);
                true
            }
            Some(other) => {
                self.cstack.push(other);
                self.msg.error("THEN", "THEN without IF", None::<bool>);
                false
            }
            None => {
                self.msg.error("THEN", "THEN without IF", None::<bool>);
                false
            }
        }
    }

    fn compile_else(&mut self) -> bool {
        if !self.compiling || !matches!(self.cstack.last(), Some(ControlMarker::If(_))) {
            self.msg.error("ELSE", "ELSE without IF", None::<bool>);
            return false;
        }
        if !self.emit_op(Opcode::Branch) {
            return false;
        }
        let else_site = self.kernel.here() as Addr;
        if !self.emit_addr_checked(0) {
            return false;
        }
        if let Some(ControlMarker::If(if_site)) = self.cstack.pop() {
            let here = self.kernel.here() as Addr;
            self.kernel.patch_addr(if_site, here); // false path starts here
        }
        self.cpush(ControlMarker::Else(else_site))
    }

    fn compile_do(&mut self) -> bool {
        if !self.compiling {
            self.msg
                .error("DO", "DO only works in compilation mode", None::<bool>);
            return false;
        }
        if !self.emit_op(Opcode::Do) {
            return false;
        }
        let head = self.kernel.here() as Addr;
        self.cpush(ControlMarker::Do(head))
    }

    fn compile_loop(&mut self) -> bool {
        if !self.compiling {
            self.msg.error("LOOP", "LOOP without DO", None::<bool>);
            return false;
        }
        match self.cstack.pop() {
            Some(ControlMarker::Do(head)) => {
                self.emit_op(Opcode::Loop) && self.emit_addr_checked(head)
            }
            Some(other) => {
                self.cstack.push(other);
                self.msg.error("LOOP", "LOOP without DO", None::<bool>);
                false
            }
            None => {
                self.msg.error("LOOP", "LOOP without DO", None::<bool>);
                false
            }
        }
    }

    fn compile_begin(&mut self) -> bool {
        if !self.compiling {
            self.msg
                .error("BEGIN", "BEGIN only works in compilation mode", None::<bool>);
            return false;
        }
        let head = self.kernel.here() as Addr;
        self.cpush(ControlMarker::Begin(head))
    }

    fn compile_while(&mut self) -> bool {
        if !self.compiling || !matches!(self.cstack.last(), Some(ControlMarker::Begin(_))) {
            self.msg.error("WHILE", "WHILE without BEGIN", None::<bool>);
            return false;
        }
        if !self.emit_op(Opcode::BranchIfZero) {
            return false;
        }
        let site = self.kernel.here() as Addr;
        if !self.emit_addr_checked(0) {
            return false;
        }
        self.cpush(ControlMarker::While(site))
    }

    fn compile_repeat(&mut self) -> bool {
        if !self.compiling {
            self.msg
                .error("REPEAT", "REPEAT without BEGIN/WHILE", None::<bool>);
            return false;
        }
        let (while_site, begin_head) = match (self.cstack.pop(), self.cstack.pop()) {
            (Some(ControlMarker::While(w)), Some(ControlMarker::Begin(b))) => (w, b),
            (popped1, popped2) => {
                // restore whatever we disturbed
                if let Some(m) = popped2 {
                    self.cstack.push(m);
                }
                if let Some(m) = popped1 {
                    self.cstack.push(m);
                }
                self.msg
                    .error("REPEAT", "REPEAT without BEGIN/WHILE", None::<bool>);
                return false;
            }
        };
        if !self.emit_op(Opcode::Branch) || !self.emit_addr_checked(begin_head) {
            return false;
        }
        let here = self.kernel.here() as Addr;
        self.kernel.patch_addr(while_site, here); // WHILE exits to here
        true
    }

    /// ." prints a string literal, or compiles a branch over its bytes
    /// followed by LIT addr / LIT len / TYPE.
    fn dot_quote<'a>(&mut self, rest: &'a str) -> Option<&'a str> {
        let bytes = rest.as_bytes();
        let mut i = 0;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let start = i;
        while i < bytes.len() && bytes[i] != b'"' {
            i += 1;
        }
        if i >= bytes.len() {
            self.msg
                .error(".\"", "Unterminated string", None::<bool>);
            return None;
        }
        let text = rest[start..i].to_string();
        let after = &rest[i + 1..];

        if self.compiling {
            if !self.emit_op(Opcode::Branch) {
                return None;
            }
            let site = self.kernel.here() as Addr;
            if !self.emit_addr_checked(0) {
                return None;
            }
            let str_addr = self.kernel.here();
            for b in text.as_bytes() {
                if !self.kernel.emit_byte(*b) {
                    self.msg.error(".\"", "Dictionary is full", None::<bool>);
                    return None;
                }
            }
            let here = self.kernel.here() as Addr;
            self.kernel.patch_addr(site, here);
            if !(self.emit_op(Opcode::Lit)
                && self.emit_cell_checked(str_addr as Cell)
                && self.emit_op(Opcode::Lit)
                && self.emit_cell_checked(text.len() as Cell)
                && self.emit_op(Opcode::Type))
            {
                return None;
            }
        } else {
            self.print_str(&text);
            self.io.flush();
        }
        Some(after)
    }

    /// CONSTANT pops a value and defines a word that pushes it back.
    fn define_constant(&mut self, name: &str) -> bool {
        if self.kernel.depth() < 1 {
            self.msg
                .error("CONSTANT", "CONSTANT needs a value on stack", None::<bool>);
            return false;
        }
        let val = self.kernel.pop();
        let addr = self.kernel.here() as Addr;
        if !(self.emit_op(Opcode::Lit) && self.emit_cell_checked(val) && self.emit_op(Opcode::Exit))
        {
            return false;
        }
        if !self.kernel.add_word(name, addr) {
            self.msg.error("CONSTANT", "Word table is full", Some(name));
            return false;
        }
        true
    }

    /// VARIABLE reserves one cell and defines a word that pushes its address.
    fn define_variable(&mut self, name: &str) -> bool {
        let var_addr = self.kernel.here();
        for _ in 0..CELL_BYTES {
            if !self.kernel.emit_byte(0) {
                self.msg
                    .error("VARIABLE", "Dictionary is full", None::<bool>);
                return false;
            }
        }
        let addr = self.kernel.here() as Addr;
        if !(self.emit_op(Opcode::Lit)
            && self.emit_cell_checked(var_addr as Cell)
            && self.emit_op(Opcode::Exit))
        {
            return false;
        }
        if !self.kernel.add_word(name, addr) {
            self.msg.error("VARIABLE", "Word table is full", Some(name));
            return false;
        }
        true
    }

    // Emit helpers: the kernel reports fullness, these turn it into a
    // compile error.

    pub(crate) fn emit_op(&mut self, op: Opcode) -> bool {
        if self.kernel.emit_byte(op as u8) {
            true
        } else {
            self.msg
                .error("compile", "Dictionary is full", None::<bool>);
            false
        }
    }

    fn emit_cell_checked(&mut self, val: Cell) -> bool {
        if self.kernel.emit_cell(val) {
            true
        } else {
            self.msg
                .error("compile", "Dictionary is full", None::<bool>);
            false
        }
    }

    fn emit_addr_checked(&mut self, addr: Addr) -> bool {
        if self.kernel.emit_addr(addr) {
            true
        } else {
            self.msg
                .error("compile", "Dictionary is full", None::<bool>);
            false
        }
    }
}
