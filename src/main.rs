// fforth main program
//
// A compact Forth VM and incremental compiler: single-byte opcodes over
// a byte-addressed dictionary, a dual-stack executor, and a single-pass
// compiler with forward-patched control flow.

mod config;
mod internals;
mod kernel;
mod runtime;

use config::Config;

fn main() {
    let mut config = Config::new();
    config.process_args();

    if config.run {
        std::process::exit(config.run_forth());
    }
}
