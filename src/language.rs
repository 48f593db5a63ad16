use serde::{Deserialize, Serialize};

/// A programming language handled by codeprop.
///
/// Plain enum: cheap to copy and pattern-matched at dispatch boundaries. The
/// parsing logic itself sits behind the `FrontEnd` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKind {
    Java,
    Python,
}

impl LanguageKind {
    /// Returns true if this language kind matches a given file extension.
    pub fn matches_extension(&self, ext: &str) -> bool {
        match self {
            LanguageKind::Java => ext == "java",
            LanguageKind::Python => matches!(ext, "py" | "pyi"),
        }
    }

    /// Recognise a language from the first line of an extension-less file.
    pub fn matches_content(&self, head: &str) -> bool {
        let first_line = head.lines().next().unwrap_or("");
        match self {
            LanguageKind::Python => first_line.starts_with("#!") && first_line.contains("python"),
            LanguageKind::Java => false,
        }
    }

    /// Lowercase tag used in node ids and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageKind::Java => "java",
            LanguageKind::Python => "python",
        }
    }

    /// Parse a config or CLI string into a `LanguageKind`. Case-insensitive.
    ///
    /// Accepted values:
    /// - "java"             -> Java
    /// - "python" or "py"   -> Python
    pub fn from_str_loose(s: &str) -> Option<LanguageKind> {
        match s.trim().to_lowercase().as_str() {
            "java" => Some(LanguageKind::Java),
            "python" | "py" => Some(LanguageKind::Python),
            _ => None,
        }
    }
}
