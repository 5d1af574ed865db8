/// File words: source loading and image persistence
///
/// LOAD interprets a text file line by line. SAVE writes user-defined
/// words back as source via the decompiler. SAVEB/LOADB snapshot the
/// whole program image to a binary file with a magic header:
///
///     offset  size  field
///     0       4     magic 0x46545448, little-endian
///     4       2     version = 1
///     6       2     HERE
///     8       4     word_count (i32)
///     12      4     builtin_count (i32)
///     16      HERE  dictionary bytes
///     …       n×19  word entries: name[16] NUL-padded, addr u16, flags u8
///
/// The fixed 19-byte entry makes the format portable; images written by
/// other implementations fail the magic/size checks rather than being
/// misread. File handles are scoped to one directive and close on every
/// path.
///
use std::fs::{self, File};
use std::io::{BufRead, BufReader};

use crate::kernel::{Kernel, Word, DICT_SIZE, MAX_WORDS};
use crate::runtime::ForthRuntime;

pub const IMAGE_MAGIC: u32 = 0x4654_5448;
pub const IMAGE_VERSION: u16 = 1;
const NAME_FIELD: usize = 16;
const WORD_ENTRY_BYTES: usize = NAME_FIELD + 2 + 1;
const HEADER_BYTES: usize = 16;

/// encode_image serializes the kernel's dictionary and word table.
pub fn encode_image(kernel: &Kernel) -> Vec<u8> {
    let mut buf = Vec::with_capacity(
        HEADER_BYTES + kernel.here() + kernel.word_count() * WORD_ENTRY_BYTES,
    );
    buf.extend_from_slice(&IMAGE_MAGIC.to_le_bytes());
    buf.extend_from_slice(&IMAGE_VERSION.to_le_bytes());
    buf.extend_from_slice(&(kernel.here() as u16).to_le_bytes());
    buf.extend_from_slice(&(kernel.word_count() as i32).to_le_bytes());
    buf.extend_from_slice(&(kernel.builtin_count() as i32).to_le_bytes());
    buf.extend_from_slice(kernel.dict_slice());
    for word in kernel.words() {
        let mut name = [0u8; NAME_FIELD];
        let src = word.name.as_bytes();
        let n = src.len().min(NAME_FIELD - 1);
        name[..n].copy_from_slice(&src[..n]);
        buf.extend_from_slice(&name);
        buf.extend_from_slice(&word.addr.to_le_bytes());
        buf.push(word.flags);
    }
    buf
}

/// decode_image validates a serialized image and installs it. The whole
/// buffer is checked before the kernel is touched.
pub fn decode_image(kernel: &mut Kernel, data: &[u8]) -> Result<(), String> {
    if data.len() < HEADER_BYTES {
        return Err("Image truncated".to_string());
    }
    let magic = u32::from_le_bytes(data[0..4].try_into().unwrap());
    if magic != IMAGE_MAGIC {
        return Err("Invalid bytecode file: bad magic".to_string());
    }
    let version = u16::from_le_bytes(data[4..6].try_into().unwrap());
    if version != IMAGE_VERSION {
        return Err("Unsupported bytecode version".to_string());
    }
    let here = u16::from_le_bytes(data[6..8].try_into().unwrap()) as usize;
    let word_count = i32::from_le_bytes(data[8..12].try_into().unwrap());
    let builtin_count = i32::from_le_bytes(data[12..16].try_into().unwrap());
    if here > DICT_SIZE || word_count < 0 || word_count as usize > MAX_WORDS {
        return Err("Bytecode too large for VM".to_string());
    }
    if builtin_count < 0 || builtin_count > word_count {
        return Err("Bad builtin count".to_string());
    }
    let dict_end = HEADER_BYTES + here;
    let need = dict_end + word_count as usize * WORD_ENTRY_BYTES;
    if data.len() < need {
        return Err("Image truncated".to_string());
    }
    let mut words = Vec::with_capacity(word_count as usize);
    for i in 0..word_count as usize {
        let base = dict_end + i * WORD_ENTRY_BYTES;
        let name_bytes = &data[base..base + NAME_FIELD];
        let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(NAME_FIELD);
        let name = String::from_utf8_lossy(&name_bytes[..end]).to_string();
        let addr = u16::from_le_bytes([data[base + NAME_FIELD], data[base + NAME_FIELD + 1]]);
        let flags = data[base + NAME_FIELD + 2];
        words.push(Word { name, addr, flags });
    }
    kernel.replace_image(&data[HEADER_BYTES..dict_end], words, builtin_count as usize);
    Ok(())
}

impl ForthRuntime {
    /// LOAD interprets a source file line by line. The first failing
    /// line stops the load.
    pub fn load_source(&mut self, path: &str) -> bool {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(_) => {
                self.msg.error("LOAD", "Cannot open", Some(path));
                return false;
            }
        };
        let reader = BufReader::new(file);
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if !self.interpret_line(&line) {
                        return false;
                    }
                    if self.exit_flag {
                        break;
                    }
                }
                Err(e) => {
                    self.msg.error("LOAD", "Read failed", Some(e.to_string()));
                    return false;
                }
            }
        }
        self.print_str(&format!("Loaded {}\n", path));
        self.io.flush();
        true
    }

    /// SAVE writes user-defined words back as source.
    pub fn save_source(&mut self, path: &str) -> bool {
        let mut text = String::new();
        let user_words = self.kernel.builtin_count()..self.kernel.word_count();
        for index in user_words.clone() {
            text.push_str(&self.word_source(index));
            text.push('\n');
        }
        match fs::write(path, &text) {
            Ok(()) => {
                self.print_str(&format!("Saved {} words to {}\n", user_words.len(), path));
                self.io.flush();
                true
            }
            Err(_) => {
                self.msg.error("SAVE", "Cannot create", Some(path));
                false
            }
        }
    }

    /// SAVEB writes the binary image.
    pub fn save_binary(&mut self, path: &str) -> bool {
        let image = encode_image(&self.kernel);
        match fs::write(path, &image) {
            Ok(()) => {
                self.print_str(&format!(
                    "Saved bytecode ({} bytes, {} words) to {}\n",
                    self.kernel.here(),
                    self.kernel.word_count(),
                    path
                ));
                self.io.flush();
                true
            }
            Err(_) => {
                self.msg.error("SAVEB", "Cannot create", Some(path));
                false
            }
        }
    }

    /// LOADB replaces the image from a binary file.
    pub fn load_binary(&mut self, path: &str) -> bool {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(_) => {
                self.msg.error("LOADB", "Cannot open", Some(path));
                return false;
            }
        };
        match decode_image(&mut self.kernel, &data) {
            Ok(()) => {
                self.print_str(&format!(
                    "Loaded bytecode ({} bytes, {} words) from {}\n",
                    self.kernel.here(),
                    self.kernel.word_count(),
                    path
                ));
                self.io.flush();
                true
            }
            Err(text) => {
                self.msg.error("LOADB", &text, Some(path));
                false
            }
        }
    }
}
