use std::fmt;
use std::path::PathBuf;

/// Engine-level errors used across postfx crates.
///
/// Contract rule: this type lives in `postfx-core` and is re-exported by runtimes.
#[derive(Debug)]
pub enum EngineError {
    // ---- Configuration (fatal at point of use) ----
    /// A surface was bound for reading or writing before `finalize_surface`.
    SurfaceNotFinalized {
        surface: String,
    },

    SurfaceSizeMismatch {
        what: String,
        expected: (u32, u32),
        found: (u32, u32),
    },

    /// An enabled stage is missing one of the images its program declares.
    MissingInput {
        stage: &'static str,
        input: &'static str,
    },

    /// A stage would read from the surface it is writing to.
    AliasedTarget {
        stage: &'static str,
        surface: String,
    },

    UnknownSurface(String),
    UnknownTexture(u32),

    InvalidConfig {
        path: Option<PathBuf>,
        msg: String,
    },

    UnknownParam(String),

    // ---- Resource creation (fatal at construction) ----
    ShaderNotFound {
        effect: &'static str,
        path: Option<PathBuf>,
    },
    VertexCompile(String),
    FragmentCompile(String),
    Link(String),
    GlCreate(String),

    // ---- Files ----
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    // ---- Fallback ----
    Other(String),
}

/// Coarse classification used by callers to decide how to surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Programmer or configuration error: unfinalized or mismatched surfaces, missing inputs.
    Configuration,
    /// Shader compile/link or allocation failure; the pipeline is unusable until fixed.
    Resource,
    Io,
}

impl EngineError {
    pub fn other<T: Into<String>>(s: T) -> Self {
        EngineError::Other(s.into())
    }

    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        EngineError::InvalidConfig {
            path: None,
            msg: msg.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::SurfaceNotFinalized { .. }
            | EngineError::SurfaceSizeMismatch { .. }
            | EngineError::MissingInput { .. }
            | EngineError::AliasedTarget { .. }
            | EngineError::UnknownSurface(_)
            | EngineError::UnknownTexture(_)
            | EngineError::InvalidConfig { .. }
            | EngineError::UnknownParam(_)
            | EngineError::Other(_) => ErrorKind::Configuration,

            EngineError::ShaderNotFound { .. }
            | EngineError::VertexCompile(_)
            | EngineError::FragmentCompile(_)
            | EngineError::Link(_)
            | EngineError::GlCreate(_) => ErrorKind::Resource,

            EngineError::Io { .. } | EngineError::Json { .. } => ErrorKind::Io,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::SurfaceNotFinalized { surface } => {
                write!(f, "surface '{surface}' used before it was finalized")
            }
            EngineError::SurfaceSizeMismatch {
                what,
                expected,
                found,
            } => write!(
                f,
                "{what}: expected {}x{}, found {}x{}",
                expected.0, expected.1, found.0, found.1
            ),
            EngineError::MissingInput { stage, input } => {
                write!(f, "stage '{stage}' is missing required input '{input}'")
            }
            EngineError::AliasedTarget { stage, surface } => write!(
                f,
                "stage '{stage}' would read and write surface '{surface}' in the same pass"
            ),
            EngineError::UnknownSurface(name) => write!(f, "unknown surface '{name}'"),
            EngineError::UnknownTexture(id) => write!(f, "unknown texture handle {id}"),
            EngineError::InvalidConfig { path, msg } => match path {
                Some(p) => write!(f, "invalid config at {}: {}", p.display(), msg),
                None => write!(f, "invalid config: {msg}"),
            },
            EngineError::UnknownParam(name) => write!(f, "unknown parameter '{name}'"),

            EngineError::ShaderNotFound { effect, path } => match path {
                Some(p) => write!(f, "shader for '{effect}' not found at {}", p.display()),
                None => write!(f, "no shader registered for '{effect}'"),
            },
            EngineError::VertexCompile(msg) => write!(f, "vertex shader compile error: {msg}"),
            EngineError::FragmentCompile(msg) => write!(f, "fragment shader compile error: {msg}"),
            EngineError::Link(msg) => write!(f, "program link error: {msg}"),
            EngineError::GlCreate(msg) => write!(f, "backend object creation failed: {msg}"),

            EngineError::Io { path, source } => {
                write!(f, "io error at {}: {}", path.display(), source)
            }
            EngineError::Json { path, source } => {
                write!(f, "json parse error at {}: {}", path.display(), source)
            }

            EngineError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            EngineError::Json { source, .. } => Some(source),
            _ => None,
        }
    }
}
