//! Hand-rolled UDMF scanner: `key = value;` assignments inside `type { ... }`
//! blocks, double-quoted strings with `\` escapes, `//` and `/* */` comments.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Ident(String),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Ident(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Block {
    pub kind: String,
    /// Insertion order is not load-bearing for UDMF semantics, but a `BTreeMap`
    /// keeps output deterministic when re-serializing unrecognized keys.
    pub fields: BTreeMap<String, Value>,
}

struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Scanner { chars: src.chars().peekable() }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some('/') => {
                    let mut clone = self.chars.clone();
                    clone.next();
                    match clone.peek() {
                        Some('/') => {
                            while let Some(&c) = self.chars.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.chars.next();
                            }
                        }
                        Some('*') => {
                            self.chars.next();
                            self.chars.next();
                            let mut prev = '\0';
                            while let Some(c) = self.chars.next() {
                                if prev == '*' && c == '/' {
                                    break;
                                }
                                prev = c;
                            }
                        }
                        _ => return,
                    }
                }
                _ => return,
            }
        }
    }

    fn next_token(&mut self) -> Option<String> {
        self.skip_trivia();
        let &c = self.chars.peek()?;
        if c == '"' {
            self.chars.next();
            let mut s = String::new();
            while let Some(c) = self.chars.next() {
                match c {
                    '"' => break,
                    '\\' => {
                        if let Some(next) = self.chars.next() {
                            s.push(next);
                        }
                    }
                    _ => s.push(c),
                }
            }
            return Some(format!("\"{s}\""));
        }
        if "{}=;".contains(c) {
            self.chars.next();
            return Some(c.to_string());
        }
        let mut s = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || "{}=;\"".contains(c) {
                break;
            }
            s.push(c);
            self.chars.next();
        }
        if s.is_empty() { None } else { Some(s) }
    }
}

fn parse_value(tok: &str) -> Value {
    if let Some(stripped) = tok.strip_prefix('"') {
        return Value::Str(stripped.trim_end_matches('"').to_string());
    }
    match tok {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = tok.parse::<i64>() {
        return Value::Int(i);
    }
    if let Some(hex) = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")) {
        if let Ok(i) = i64::from_str_radix(hex, 16) {
            return Value::Int(i);
        }
    }
    if let Ok(f) = tok.parse::<f64>() {
        return Value::Float(f);
    }
    Value::Ident(tok.to_string())
}

/// Parse the entire `TEXTMAP` lump text into its top-level blocks. Global
/// `key = value;` assignments outside any block (e.g. `namespace = "zdoom";`)
/// are folded into a synthetic block of kind `"global"`.
pub fn parse_blocks(src: &str) -> Vec<Block> {
    let mut scanner = Scanner::new(src);
    let mut blocks = Vec::new();
    let mut global = Block { kind: "global".to_string(), fields: BTreeMap::new() };

    loop {
        let Some(tok) = scanner.next_token() else { break };
        let key = tok;
        let Some(next) = scanner.next_token() else { break };
        match next.as_str() {
            "=" => {
                let Some(val_tok) = scanner.next_token() else { break };
                let value = parse_value(&val_tok);
                // consume trailing ';'
                let _ = scanner.next_token();
                global.fields.insert(key, value);
            }
            "{" => {
                let mut block = Block { kind: key, fields: BTreeMap::new() };
                loop {
                    let Some(field_key) = scanner.next_token() else { break };
                    if field_key == "}" {
                        break;
                    }
                    let Some(eq) = scanner.next_token() else { break };
                    if eq != "=" {
                        continue;
                    }
                    let Some(val_tok) = scanner.next_token() else { break };
                    block.fields.insert(field_key, parse_value(&val_tok));
                    let _ = scanner.next_token(); // ';'
                }
                blocks.push(block);
            }
            _ => {}
        }
    }

    if !global.fields.is_empty() {
        blocks.insert(0, global);
    }
    blocks
}

fn serialize_value(v: &Value) -> String {
    match v {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{f}"),
        Value::Bool(b) => b.to_string(),
        Value::Str(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        Value::Ident(s) => s.clone(),
    }
}

/// Re-serialize blocks back into UDMF text, preserving every key (including
/// UDMF-only keys unrecognized by the level loader) — required by the
/// round-trip law `parseUDMF(serializeUDMF(level)) == level`.
pub fn serialize_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        if block.kind == "global" {
            for (k, v) in &block.fields {
                out.push_str(&format!("{k} = {};\n", serialize_value(v)));
            }
            continue;
        }
        out.push_str(&format!("{}\n{{\n", block.kind));
        for (k, v) in &block.fields {
            out.push_str(&format!("{k} = {};\n", serialize_value(v)));
        }
        out.push_str("}\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_block() {
        let src = r#"
            namespace = "zdoom";
            vertex { x = 0.0; y = 64.0; }
            linedef { v1 = 0; v2 = 1; sidefront = 0; twosided = true; }
        "#;
        let blocks = parse_blocks(src);
        assert_eq!(blocks[0].kind, "global");
        assert_eq!(blocks[0].fields["namespace"].as_str(), Some("zdoom"));

        let vertex = blocks.iter().find(|b| b.kind == "vertex").unwrap();
        assert_eq!(vertex.fields["x"].as_f64(), Some(0.0));
        assert_eq!(vertex.fields["y"].as_f64(), Some(64.0));

        let line = blocks.iter().find(|b| b.kind == "linedef").unwrap();
        assert_eq!(line.fields["twosided"].as_bool(), Some(true));
    }

    #[test]
    fn strips_comments() {
        let src = "// comment\nvertex { x = 1; /* block\ncomment */ y = 2; }";
        let blocks = parse_blocks(src);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].fields["x"].as_i64(), Some(1));
        assert_eq!(blocks[0].fields["y"].as_i64(), Some(2));
    }

    #[test]
    fn roundtrips_through_serialize() {
        let src = r#"sector { heightfloor = 0; heightceiling = 128; lightcolor = "0xff0000"; }"#;
        let blocks = parse_blocks(src);
        let text = serialize_blocks(&blocks);
        let blocks2 = parse_blocks(&text);
        assert_eq!(blocks[0].fields, blocks2[0].fields);
    }
}
