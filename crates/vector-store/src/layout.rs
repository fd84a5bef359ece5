use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORE_NAME: &str = "store";

const VECTORS_INFIX: &str = ".vectors.";
const VECTORS_SUFFIX: &str = ".bin";

/// File names of one store, all sharing a path prefix:
///
/// ```text
/// <prefix>.vectors.<generation>.bin   vector artifact (one live generation)
/// <prefix>.chunks.json                chunk artifact + commit header
/// <prefix>.documents.txt              ingested document names
/// <prefix>.lock                       advisory write lock
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    prefix: PathBuf,
}

impl StoreLayout {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Layout for the default store name inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_STORE_NAME))
    }

    #[must_use]
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    #[must_use]
    pub fn dir(&self) -> PathBuf {
        match self.prefix.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    #[must_use]
    pub fn chunks_path(&self) -> PathBuf {
        self.with_suffix(".chunks.json")
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.with_suffix(".documents.txt")
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.with_suffix(".lock")
    }

    #[must_use]
    pub fn vectors_file_name(&self, generation: u64) -> String {
        format!(
            "{}{VECTORS_INFIX}{generation:08}{VECTORS_SUFFIX}",
            self.stem()
        )
    }

    #[must_use]
    pub fn vectors_path(&self, generation: u64) -> PathBuf {
        self.dir().join(self.vectors_file_name(generation))
    }

    /// Parse the generation out of a vector artifact file name belonging to this store
    #[must_use]
    pub fn parse_vectors_generation(&self, file_name: &str) -> Option<u64> {
        let rest = file_name.strip_prefix(self.stem().as_str())?;
        let digits = rest
            .strip_prefix(VECTORS_INFIX)?
            .strip_suffix(VECTORS_SUFFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Generations of every vector artifact currently on disk, ascending. A missing store
    /// directory holds no generations.
    pub(crate) fn vector_generations_on_disk(&self) -> std::io::Result<Vec<u64>> {
        let read_dir = match std::fs::read_dir(self.dir()) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut out = Vec::new();
        for entry in read_dir {
            let entry = entry?;
            if let Some(generation) = entry
                .file_name()
                .to_str()
                .and_then(|name| self.parse_vectors_generation(name))
            {
                out.push(generation);
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    fn stem(&self) -> String {
        self.prefix
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string())
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.stem());
        name.push(suffix);
        self.dir().join(name)
    }
}
