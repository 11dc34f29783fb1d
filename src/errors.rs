use thiserror::Error;

/// All errors that can occur while building a modular section.
#[derive(Debug, Error)]
pub enum ModsecError {
    // --- Configuration errors (user-correctable) ---
    #[error("{0}")]
    Config(String),

    // --- Internal-invariant faults (build ordering or consistency bugs) ---
    #[error("internal invariant violated: {0}")]
    Invariant(String),

    // --- Template errors ---
    #[error("Template error: {0}")]
    Template(String),

    // --- Key material errors ---
    #[error("Key store error: {0}")]
    KeyStore(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

/// Broad classification of a [`ModsecError`].
///
/// Callers use this to decide whether a failure is reported back to the
/// user as a configuration problem or treated as an unrecoverable fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The section configuration is wrong; the user can fix it.
    Configuration,
    /// The toolchain or the caller broke an ordering/consistency rule.
    InternalInvariant,
    /// Filesystem, key store, template or encryption failure.
    Environment,
}

impl ModsecError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Invariant(_) => ErrorKind::InternalInvariant,
            Self::Template(_)
            | Self::KeyStore(_)
            | Self::EncryptionFailed(_)
            | Self::Io(_)
            | Self::SerializationError(_)
            | Self::CommandFailed(_) => ErrorKind::Environment,
        }
    }

    /// Returns `true` for internal-invariant faults.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::InternalInvariant
    }
}

/// Convenience type alias for modsec results.
pub type Result<T> = std::result::Result<T, ModsecError>;
