//! Minimal UDMF (Universal Doom Map Format) text tokenizer.
//!
//! UDMF itself is treated as an external collaborator per the distilled spec —
//! this is a small hand-rolled scanner, not a parser-generator-backed grammar.
//! It yields `key = value;` assignments and `type { ... }` blocks, handling
//! double-quoted strings with backslash escapes and `//`/`/* */` comments.

mod tokenizer;

pub use tokenizer::{Block, Value, parse_blocks, serialize_blocks};
