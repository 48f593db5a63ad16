use serde::Serialize;

/// Category of a non-fatal issue recorded during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A file could not be (fully) parsed; its nodes may be missing.
    ParseError,
    /// A call site matched no method by any resolution rule.
    UnresolvedCall,
    /// A supertype or import named a type that is not part of the graph.
    UnresolvedType,
    /// The walk found no file in a supported language.
    NoFilesProcessed,
}

/// A non-fatal issue surfaced alongside the built graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn parse_error(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::ParseError,
            file: Some(file.into()),
            line: None,
            message: message.into(),
        }
    }

    pub fn unresolved_call(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::UnresolvedCall,
            file: Some(file.into()),
            line: Some(line),
            message: message.into(),
        }
    }

    pub fn unresolved_type(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::UnresolvedType,
            file: Some(file.into()),
            line: Some(line),
            message: message.into(),
        }
    }

    pub fn no_files_processed() -> Self {
        Self {
            kind: DiagnosticKind::NoFilesProcessed,
            file: None,
            line: None,
            message: "no files processed".to_owned(),
        }
    }

    /// Whether this diagnostic names `file` (relative path as stored on nodes).
    pub fn names_file(&self, file: &str) -> bool {
        self.file.as_deref() == Some(file)
    }
}

/// Count diagnostics of one kind.
pub fn count_kind(diagnostics: &[Diagnostic], kind: DiagnosticKind) -> usize {
    diagnostics.iter().filter(|d| d.kind == kind).count()
}
