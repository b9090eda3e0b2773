use thiserror::Error;

/// Model operations that can be refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("chain '{chain}' already exists in table '{table}'")]
    DuplicateChain { table: String, chain: String },
    #[error("table id {0} does not exist")]
    UnknownTable(usize),
}

/// Recoverable problems found while importing a dump.
///
/// None of these stop the import; the offending line is skipped or the
/// rule keeps a missing target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportWarning {
    #[error("line {line}: rule append without a chain name")]
    MissingAppendChain { line: usize },
    #[error("line {line}: '{directive}' before any table declaration")]
    NoCurrentTable { line: usize, directive: String },
    #[error("line {line}: chain declaration without a name")]
    MalformedChain { line: usize },
    #[error("line {line}: chain '{chain}' declared twice in table '{table}'")]
    DuplicateChain {
        line: usize,
        table: String,
        chain: String,
    },
    #[error("line {line}: chain '{chain}' does not exist in table '{table}', rule dropped")]
    UnknownChain {
        line: usize,
        table: String,
        chain: String,
    },
    #[error("line {line}: {flag} target '{target}' not found in table '{table}'")]
    UnresolvedTarget {
        line: usize,
        table: String,
        flag: &'static str,
        target: String,
    },
}

impl ImportWarning {
    pub fn line(&self) -> usize {
        match self {
            Self::MissingAppendChain { line }
            | Self::NoCurrentTable { line, .. }
            | Self::MalformedChain { line }
            | Self::DuplicateChain { line, .. }
            | Self::UnknownChain { line, .. }
            | Self::UnresolvedTarget { line, .. } => *line,
        }
    }
}
