//! Extracting structured fields from raw entry bodies
//!
//! Entry bodies are opaque shell-ish config text. Parsers pull out the
//! fields worth showing (kernel image, initrd, root device, extra kernel
//! options) without claiming to understand the whole body.

use std::sync::LazyLock;

use regex::Regex;

/// Fields a parser recognized inside an entry body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFields {
    pub kernel: Option<String>,
    pub initrd: Option<String>,
    pub root_device: Option<String>,
    pub options: Option<String>,
}

pub trait ContentParser: Send + Sync {
    /// Returns None when the body does not look like this parser's format.
    fn parse(&self, content: &str) -> Option<EntryFields>;
    fn name(&self) -> &'static str;
}

static LINUX_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*linux(?:16)?\s+(\S+)(?:\s+root=(\S+))?((?:\s+\S+)*)\s*$")
        .unwrap_or_else(|e| panic!("linux line pattern: {e}"))
});

static INITRD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*initrd(?:16)?\s+(\S+)\s*$")
        .unwrap_or_else(|e| panic!("initrd line pattern: {e}"))
});

/// Recognizes the common linux/initrd entry shape.
pub struct LinuxParser;

impl ContentParser for LinuxParser {
    fn parse(&self, content: &str) -> Option<EntryFields> {
        let caps = LINUX_LINE.captures(content)?;
        let mut fields = EntryFields {
            kernel: caps.get(1).map(|m| m.as_str().to_string()),
            root_device: caps.get(2).map(|m| m.as_str().to_string()),
            ..EntryFields::default()
        };
        if let Some(rest) = caps.get(3) {
            let rest = rest.as_str().trim();
            if !rest.is_empty() {
                fields.options = Some(rest.to_string());
            }
        }
        if let Some(caps) = INITRD_LINE.captures(content) {
            fields.initrd = caps.get(1).map(|m| m.as_str().to_string());
        }
        Some(fields)
    }

    fn name(&self) -> &'static str {
        "linux"
    }
}

/// First parser accepting the body wins.
pub fn parse_with(parsers: &[&dyn ContentParser], content: &str) -> Option<EntryFields> {
    parsers.iter().find_map(|p| p.parse(content))
}
