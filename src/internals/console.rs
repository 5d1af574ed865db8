/// Console words and the I/O capability
///
/// The VM never touches stdin/stdout directly: a Console is injected at
/// construction, so the engine runs unchanged on a terminal, under tests
/// with a capturing console, or on a target with neither. EMIT writes raw
/// bytes, not code points.
///
use crate::kernel::Cell;
use crate::runtime::ForthRuntime;
use std::io::{self, Read, Write};

pub trait Console {
    /// Read one byte of input, -1 at end of input.
    fn key(&mut self) -> Cell;
    /// Write one raw byte.
    fn put(&mut self, b: u8);
    /// Push buffered output out.
    fn flush(&mut self);
}

/// The standard console over line-buffered stdin/stdout.
pub struct StdConsole;

impl Console for StdConsole {
    fn key(&mut self) -> Cell {
        let mut buf = [0u8; 1];
        match io::stdin().lock().read(&mut buf) {
            Ok(1) => buf[0] as Cell,
            _ => -1,
        }
    }

    fn put(&mut self, b: u8) {
        io::stdout().write_all(&[b]).ok();
    }

    fn flush(&mut self) {
        io::stdout().flush().ok();
    }
}

impl ForthRuntime {
    /// print_str sends a string to the console byte by byte.
    pub fn print_str(&mut self, s: &str) {
        for b in s.as_bytes() {
            self.io.put(*b);
        }
    }

    /// print_num prints a cell as a decimal integer followed by a space
    /// (the . opcode's format).
    pub fn print_num(&mut self, val: Cell) {
        self.print_str(&format!("{} ", val));
    }

    /// show_stack prints the non-destructive stack view: "<n> v0 v1 … "
    pub fn show_stack(&mut self) {
        let view: Vec<Cell> = self.kernel.stack_view().to_vec();
        self.print_str(&format!("<{}> ", view.len()));
        for v in view {
            self.print_num(v);
        }
        self.io.flush();
    }

    /// list_words prints every word name, oldest first.
    pub fn list_words(&mut self) {
        let names: Vec<String> = self
            .kernel
            .words()
            .iter()
            .map(|w| w.name.clone())
            .collect();
        self.print_str("Words: ");
        for name in names {
            self.print_str(&name);
            self.print_str(" ");
        }
        self.print_str("\n");
        self.io.flush();
    }
}
