use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid slug '{0}': must be lowercase alphanumeric words joined by '-' or '_', with at least one letter")]
    InvalidSlug(String),

    #[error("duplicate slug '{slug}' in {} (already seen in {})", .second.display(), .first.display())]
    DuplicateSlug {
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("root path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("no instruction set YAML files found under {}", .0.display())]
    NoManifests(PathBuf),

    #[error("invalid manifest {}: {reason}", .path.display())]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("{} defines multiple keys for {section}: {}", .path.display(), .keys.join(", "))]
    MultipleKeys {
        path: PathBuf,
        section: String,
        keys: Vec<String>,
    },

    #[error("no snippets defined in {}", .0.display())]
    EmptyInstructionSet(PathBuf),

    #[error("invalid candidate record (line {line}): {reason}")]
    InvalidCandidate { line: usize, reason: String },

    #[error("malformed NDJSON on line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("snippet slug mismatch in {}: candidate '{expected}', front matter '{found}'", .path.display())]
    SlugMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("invalid snippet {}: {reason}", .path.display())]
    InvalidSnippet { path: PathBuf, reason: String },

    #[error("file vanished: {}", .0.display())]
    FileVanished(PathBuf),

    #[error("invalid identity list: {0}")]
    InvalidIdentityList(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("explicit store paths are not allowed; set SNIPCAT_DB_PATH instead")]
    ExplicitStorePath,

    #[error("home directory not found: set HOME or SNIPCAT_DB_PATH")]
    HomeNotFound,

    #[error("catalog store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
