/// Message handling
///
/// Warnings and errors go to stderr, one human-readable line each,
/// gated by a debug level. Errors always print.
///
use std::fmt::Debug;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub enum DebugLevel {
    Error,
    Warning,
    Info,
    Debug,
}

#[derive(Debug, Clone, Copy)]
pub struct Msg {
    level: DebugLevel,
}

impl Msg {
    pub fn new() -> Msg {
        Msg {
            level: DebugLevel::Error,
        }
    }

    pub fn set_level(&mut self, level: DebugLevel) {
        self.level = level;
    }

    pub fn get_level(&self) -> DebugLevel {
        self.level
    }

    fn emit<T: Debug>(&self, tag: &str, caller: &str, text: &str, value: Option<T>) {
        match value {
            Some(v) => eprintln!("{}: {}: {} {:?}", tag, caller, text, v),
            None => eprintln!("{}: {}: {}", tag, caller, text),
        }
    }

    pub fn error<T: Debug>(&self, caller: &str, text: &str, value: Option<T>) {
        self.emit("ERROR", caller, text, value);
    }

    pub fn warning<T: Debug>(&self, caller: &str, text: &str, value: Option<T>) {
        if self.level >= DebugLevel::Warning {
            self.emit("WARNING", caller, text, value);
        }
    }

    pub fn info<T: Debug>(&self, caller: &str, text: &str, value: Option<T>) {
        if self.level >= DebugLevel::Info {
            self.emit("INFO", caller, text, value);
        }
    }

    pub fn debug<T: Debug>(&self, caller: &str, text: &str, value: Option<T>) {
        if self.level >= DebugLevel::Debug {
            self.emit("DEBUG", caller, text, value);
        }
    }
}
