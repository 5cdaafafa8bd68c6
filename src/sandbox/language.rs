use std::ffi::OsString;
use std::path::Path;

use uuid::Uuid;

use crate::config::Toolchain;

/// Longest file stem kept by [`safe_filename`].
pub const MAX_STEM_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    C,
    Cpp,
    Java,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::C => write!(f, "c"),
            Language::Cpp => write!(f, "c++"),
            Language::Java => write!(f, "java"),
        }
    }
}

/// One external command of a build/run pipeline.
#[derive(Debug, Clone)]
pub struct Step {
    pub program: String,
    pub args: Vec<OsString>,
}

impl Step {
    fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Language {
    /// Resolve a language tag case-insensitively. Accepts the delimited-form
    /// aliases as well as bare extensions.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "python" | "py" | ".py" => Some(Language::Python),
            "c" | ".c" => Some(Language::C),
            "c++" | "cpp" | ".cpp" => Some(Language::Cpp),
            "java" | ".java" => Some(Language::Java),
            _ => None,
        }
    }

    /// Canonical source extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
        }
    }

    /// Compile step for `source` inside `dir`, if the language has one.
    pub fn compile_step(&self, tools: &Toolchain, dir: &Path, source: &Path) -> Option<Step> {
        match self {
            Language::Python => None,
            Language::C => Some(
                Step::new(&tools.cc)
                    .arg(source)
                    .arg("-O2")
                    .arg("-o")
                    .arg(binary_path(dir, source)),
            ),
            Language::Cpp => Some(
                Step::new(&tools.cxx)
                    .arg(source)
                    .arg("-O2")
                    .arg("-o")
                    .arg(binary_path(dir, source)),
            ),
            Language::Java => Some(
                Step::new(&tools.javac)
                    .arg("-d")
                    .arg(dir)
                    .arg(source),
            ),
        }
    }

    pub fn run_step(&self, tools: &Toolchain, dir: &Path, source: &Path) -> Step {
        match self {
            Language::Python => Step::new(&tools.python).arg(source),
            Language::C | Language::Cpp => {
                let binary = binary_path(dir, source);
                Step {
                    program: binary.to_string_lossy().into_owned(),
                    args: Vec::new(),
                }
            }
            Language::Java => Step::new(&tools.java)
                .arg("-Xmx256m")
                .arg("-cp")
                .arg(dir)
                .arg(file_stem(source)),
        }
    }

    /// The JVM reserves far more virtual memory than it touches, so an
    /// address-space ceiling would stop it from starting at all.
    pub fn honors_address_space_limit(&self) -> bool {
        !matches!(self, Language::Java)
    }
}

fn file_stem(path: &Path) -> OsString {
    path.file_stem().map(OsString::from).unwrap_or_default()
}

fn binary_path(dir: &Path, source: &Path) -> std::path::PathBuf {
    dir.join(file_stem(source))
}

/// Reduce a client-supplied file name to a safe one ending in the language's
/// canonical extension.
///
/// Directory components are dropped, only ASCII alphanumerics, `-`, `_` and
/// `.` survive, the stem is bounded by [`MAX_STEM_LEN`], and an empty stem is
/// replaced by a random one.
pub fn safe_filename(filename: &str, language: Language) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();

    let stem = match cleaned.rfind('.') {
        Some(idx) => &cleaned[..idx],
        None => cleaned.as_str(),
    };
    let stem = stem.trim_matches('.');
    let stem = &stem[..stem.len().min(MAX_STEM_LEN)];

    if stem.is_empty() {
        format!("job_{}.{}", random_stem(), language.extension())
    } else {
        format!("{}.{}", stem, language.extension())
    }
}

fn random_stem() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..12].to_string()
}
