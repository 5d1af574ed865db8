// system configuration and command line processing

use ::clap::{arg, Command};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use crate::internals::messages::DebugLevel;
use crate::runtime::ForthRuntime;

pub const VERSION: &str = "0.1.0";
/// The REPL reads at most this many bytes per line.
pub const LINE_MAX: usize = 256;

pub struct Config {
    pub debug_level: DebugLevel,
    pub quiet: bool,
    pub loaded_file: String,
    pub source_args: Vec<String>,
    pub run: bool,
}

impl Config {
    pub fn new() -> Config {
        Config {
            debug_level: DebugLevel::Error,
            quiet: false,
            loaded_file: "".to_owned(),
            source_args: Vec::new(),
            run: true,
        }
    }

    /// process_args handles command line argument processing using the clap library
    ///
    pub fn process_args(&mut self) -> &Config {
        let arguments = Command::new("fforth")
            .version(VERSION)
            .about("A fast Forth virtual machine")
            .arg(arg!(-q --quiet "Suppress the banner").required(false))
            .arg(
                arg!(--debuglevel <VALUE>)
                    .required(false)
                    .value_parser(["error", "warning", "info", "debug"]),
            )
            .arg(arg!([path] "Source file, or binary image ending in .fbc").required(false))
            .arg(
                arg!([code] ... "Forth source lines to interpret")
                    .required(false)
                    .allow_hyphen_values(true),
            )
            .get_matches();

        if arguments.get_flag("quiet") {
            self.quiet = true;
        }
        if let Some(level) = arguments.get_one::<String>("debuglevel") {
            match level.as_str() {
                "debug" => self.debug_level = DebugLevel::Debug,
                "info" => self.debug_level = DebugLevel::Info,
                "warning" => self.debug_level = DebugLevel::Warning,
                _ => self.debug_level = DebugLevel::Error,
            }
        }
        if let Some(path) = arguments.get_one::<String>("path") {
            self.loaded_file = path.to_string();
        }
        if let Some(code) = arguments.get_many::<String>("code") {
            self.source_args = code.cloned().collect();
        }
        self
    }

    /// run_forth builds the VM and dispatches on the command line mode:
    /// a binary image, a text file, or the interactive REPL. Returns the
    /// process exit status.
    pub fn run_forth(&self) -> i32 {
        let mut forth = ForthRuntime::new();
        forth.msg.set_level(self.debug_level);
        forth.cold_start();

        if !self.quiet {
            println!("fforth {}", VERSION);
            println!("================================");
        }

        if self.loaded_file.is_empty() {
            repl(&mut forth);
            return 0;
        }

        if is_binary_path(&self.loaded_file) {
            if !forth.load_binary(&self.loaded_file) {
                return 1;
            }
            for line in &self.source_args {
                forth.interpret_line(line);
                if forth.should_exit() {
                    break;
                }
            }
            return 0;
        }

        // plain text: interpret each line, first failure is fatal
        let file = match File::open(&self.loaded_file) {
            Ok(file) => file,
            Err(_) => {
                eprintln!("Cannot open {}", self.loaded_file);
                return 1;
            }
        };
        for line in BufReader::new(file).lines() {
            match line {
                Ok(line) => {
                    if !forth.interpret_line(&line) {
                        return 1;
                    }
                    if forth.should_exit() {
                        return 0;
                    }
                }
                Err(_) => return 1,
            }
        }
        for line in &self.source_args {
            if !forth.interpret_line(line) {
                return 1;
            }
            if forth.should_exit() {
                break;
            }
        }
        0
    }
}

/// A path is loaded as a binary image when it ends in .fbc, any case.
pub fn is_binary_path(path: &str) -> bool {
    path.to_lowercase().ends_with(".fbc")
}

/// repl is the interactive loop: prompt, read, interpret. The prompt is
/// "ok " in immediate mode and "  " while a definition is open; a
/// newline is echoed after every successful immediate-mode line.
pub fn repl(forth: &mut ForthRuntime) {
    let stdin = io::stdin();
    loop {
        print!("{}", if forth.compiling { "  " } else { "ok " });
        io::stdout().flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // end of input
            Ok(_) => {
                truncate_line(&mut line);
                if forth.interpret_line(&line) && !forth.compiling {
                    println!();
                }
                if forth.should_exit() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    println!();
}

/// Cap a line at LINE_MAX bytes without splitting a character.
fn truncate_line(line: &mut String) {
    if line.len() > LINE_MAX {
        let mut end = LINE_MAX;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        line.truncate(end);
    }
}
