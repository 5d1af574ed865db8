pub mod compiler;
pub mod console;
pub mod debug;
pub mod files;
pub mod inner;
pub mod messages;
pub mod opcodes;
