//! Reading proxy fragments back from disk
//!
//! A proxy fragment is a two line header followed by a pipe from the
//! source script(s) into the filter binary, whose quoted argument is the
//! wire rule block. This module recognizes such files and pulls the
//! pieces back out; `core::proxy` writes them.

use std::fs;
use std::path::{Path, PathBuf};

const MARKER: &str = "#THIS IS A GRUB PROXY SCRIPT";

/// Cheap header sniff used while scanning the cfg dir, so fragments are
/// not mistaken for plain scripts.
pub fn is_proxy_script(path: &Path) -> bool {
    let Ok(content) = fs::read_to_string(path) else {
        return false;
    };
    content.lines().nth(1) == Some(MARKER)
}

/// The parts of a proxy fragment that matter for reconstruction.
#[derive(Debug, PartialEq, Eq)]
pub struct ProxyScriptData {
    /// Path of the script whose output the proxy filters. For a multi
    /// source fragment this is the first (owning) script.
    pub script_path: PathBuf,
    /// The verbatim wire rule block.
    pub rule_string: String,
    /// True when the fragment merges several scripts' output.
    pub multi: bool,
}

impl ProxyScriptData {
    pub fn parse(content: &str) -> Option<ProxyScriptData> {
        let mut lines = content.lines();
        if lines.next()? != "#!/bin/sh" || lines.next()? != MARKER {
            return None;
        }
        let body_start = content.find(MARKER)? + MARKER.len();
        let body = content[body_start..].trim_start_matches('\n');

        let multi_flag = body.trim_end().ends_with(" multi");
        let trimmed = if multi_flag {
            body.trim_end().strip_suffix(" multi")?
        } else {
            body.trim_end()
        };

        // rule block: the argument between the last quote pair
        let close = trimmed.rfind('"')?;
        let open = trimmed[..close].rfind('"')?;
        let rule_string = trimmed[open + 1..close].to_string();

        let script_path = if let Some(rest) = body.strip_prefix("sh -c '") {
            // the first BEGIN marker names the owning script
            let begin = rest.find("### BEGIN ")?;
            let tail = &rest[begin + "### BEGIN ".len()..];
            let end = tail.find(" ###")?;
            PathBuf::from(&tail[..end])
        } else {
            let inner = body.strip_prefix('\'')?;
            let end = inner.find('\'')?;
            PathBuf::from(&inner[..end])
        };

        Some(ProxyScriptData {
            script_path,
            rule_string,
            multi: multi_flag,
        })
    }

    pub fn load(path: &Path) -> Option<ProxyScriptData> {
        let content = fs::read_to_string(path).ok()?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_source_fragment() {
        let content = "#!/bin/sh\n#THIS IS A GRUB PROXY SCRIPT\n'/etc/menu.d/proxifiedScripts/linux' | /etc/menu.d/bin/menumeld_proxy \"+'Ubuntu'~abc123~\n-*\n\"";
        let data = ProxyScriptData::parse(content).unwrap();
        assert_eq!(data.script_path, PathBuf::from("/etc/menu.d/proxifiedScripts/linux"));
        assert_eq!(data.rule_string, "+'Ubuntu'~abc123~\n-*\n");
        assert!(!data.multi);
    }

    #[test]
    fn parses_a_multi_source_fragment() {
        let content = concat!(
            "#!/bin/sh\n#THIS IS A GRUB PROXY SCRIPT\n",
            "sh -c 'echo \"### BEGIN /etc/menu.d/proxifiedScripts/linux ###\";\n",
            "\"/etc/menu.d/proxifiedScripts/linux\";\n",
            "echo \"### END /etc/menu.d/proxifiedScripts/linux ###\";\n",
            "echo \"### BEGIN /etc/menu.d/proxifiedScripts/memtest ###\";\n",
            "\"/etc/menu.d/proxifiedScripts/memtest\";\n",
            "echo \"### END /etc/menu.d/proxifiedScripts/memtest ###\";'",
            " | /etc/menu.d/bin/menumeld_proxy \"+*\n\" multi"
        );
        let data = ProxyScriptData::parse(content).unwrap();
        assert_eq!(
            data.script_path,
            PathBuf::from("/etc/menu.d/proxifiedScripts/linux")
        );
        assert_eq!(data.rule_string, "+*\n");
        assert!(data.multi);
    }

    #[test]
    fn rejects_plain_scripts() {
        assert!(ProxyScriptData::parse("#!/bin/sh\nexec tail -n +3 $0\nmenuentry x {\n}\n").is_none());
    }
}
