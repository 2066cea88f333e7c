//! Platform-specific command candidates for each converter capability.
//!
//! Different deployments have different tools installed in different places.
//! Rather than branching on the OS inside each converter, the candidates are
//! data: an ordered list of [`CommandTemplate`]s per [`Capability`], bare
//! program names first, then known absolute install locations.

use crate::process::{exists, CommandSpec, ProcessError, ProcessRunner};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// The operating-system family the candidate lists are chosen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Unix
        }
    }
}

/// A conversion capability that can be served by several executables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Headless office suite: deck → PDF.
    OfficeToPdf,
    /// Poppler's `pdftoppm`.
    Poppler,
    /// Ghostscript's PNG device.
    Ghostscript,
    /// MuPDF's `mutool convert`.
    MuPdf,
}

/// Values substituted into [`CommandTemplate`] arguments.
///
/// Recognised placeholders: `{input}`, `{outdir}`, `{output_prefix}`,
/// `{output_pattern}`, `{dpi}`.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    vars: Vec<(&'static str, String)>,
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &'static str, value: impl AsRef<str>) -> Self {
        self.vars.push((key, value.as_ref().to_string()));
        self
    }

    pub fn path(self, key: &'static str, value: &Path) -> Self {
        let rendered = value.to_string_lossy().into_owned();
        self.set(key, rendered)
    }

    fn apply(&self, arg: &str) -> String {
        self.vars.iter().fold(arg.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{key}}}"), value)
        })
    }
}

/// A program plus argument templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Substitute placeholders and produce a runnable command.
    pub fn render(&self, vars: &TemplateVars) -> CommandSpec {
        CommandSpec::new(&self.program).args(self.args.iter().map(|a| vars.apply(a)))
    }

    /// Same arguments, different executable.
    pub fn with_program(&self, program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: self.args.clone(),
        }
    }
}

const OFFICE_ARGS: &[&str] = &["--headless", "--convert-to", "pdf", "--outdir", "{outdir}", "{input}"];
const POPPLER_ARGS: &[&str] = &["-png", "-r", "{dpi}", "{input}", "{output_prefix}"];
const GHOSTSCRIPT_ARGS: &[&str] = &[
    "-dNOPAUSE",
    "-dBATCH",
    "-dSAFER",
    "-sDEVICE=png16m",
    "-r{dpi}",
    "-sOutputFile={output_pattern}",
    "{input}",
];
const MUPDF_ARGS: &[&str] = &["convert", "-o", "{output_pattern}", "-O", "resolution={dpi}", "{input}"];

/// Resolves the ordered candidate list for a capability on a platform.
#[derive(Debug, Clone, Copy)]
pub struct StrategyProbe {
    platform: Platform,
}

impl Default for StrategyProbe {
    fn default() -> Self {
        Self::new(Platform::current())
    }
}

impl StrategyProbe {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Ordered candidate invocations for `capability`.
    pub fn candidates(&self, capability: Capability) -> Vec<CommandTemplate> {
        let (programs, args) = match capability {
            Capability::OfficeToPdf => (self.office_programs(), OFFICE_ARGS),
            Capability::Poppler => (self.poppler_programs(), POPPLER_ARGS),
            Capability::Ghostscript => {
                let (names, paths) = self.ghostscript_programs();
                (names.into_iter().chain(paths).collect(), GHOSTSCRIPT_ARGS)
            }
            Capability::MuPdf => (vec!["mutool"], MUPDF_ARGS),
        };
        programs
            .into_iter()
            .map(|p| CommandTemplate::new(p, args))
            .collect()
    }

    fn office_programs(&self) -> Vec<&'static str> {
        match self.platform {
            Platform::Windows => vec![
                "soffice",
                r"C:\Program Files\LibreOffice\program\soffice.exe",
                r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
            ],
            Platform::MacOs => vec![
                "soffice",
                "libreoffice",
                "/Applications/LibreOffice.app/Contents/MacOS/soffice",
            ],
            Platform::Unix => vec![
                "soffice",
                "libreoffice",
                "/usr/bin/soffice",
                "/usr/bin/libreoffice",
            ],
        }
    }

    fn poppler_programs(&self) -> Vec<&'static str> {
        match self.platform {
            Platform::Windows => vec![
                "pdftoppm",
                r"C:\Program Files\poppler\bin\pdftoppm.exe",
                r"C:\poppler\bin\pdftoppm.exe",
            ],
            Platform::MacOs | Platform::Unix => vec!["pdftoppm"],
        }
    }

    /// Ghostscript ships under different names per platform; the absolute
    /// paths are only consulted when no name answers `--version`.
    fn ghostscript_programs(&self) -> (Vec<&'static str>, Vec<&'static str>) {
        match self.platform {
            Platform::Windows => (
                vec!["gswin64c", "gswin32c", "gs"],
                vec![
                    r"C:\Program Files\gs\gs10.03.0\bin\gswin64c.exe",
                    r"C:\Program Files\gs\gs10.04.0\bin\gswin64c.exe",
                    r"C:\Program Files\gs\gs10.05.0\bin\gswin64c.exe",
                    r"C:\Program Files\gs\gs10.06.0\bin\gswin64c.exe",
                ],
            ),
            Platform::MacOs | Platform::Unix => (vec!["gs", "ghostscript"], vec![]),
        }
    }

    /// Find the Ghostscript executable: the first name that answers
    /// `--version`, else the first absolute install path that exists.
    pub async fn discover_ghostscript(
        &self,
        runner: &dyn ProcessRunner,
        timeout: Duration,
    ) -> Option<String> {
        let (names, paths) = self.ghostscript_programs();
        for name in names {
            let spec = CommandSpec::new(name).arg("--version");
            match runner.run(&spec, timeout).await {
                Ok(out) if out.success() => {
                    debug!("Ghostscript found as '{}' ({})", name, out.stdout.trim());
                    return Some(name.to_string());
                }
                Ok(_) | Err(_) => debug!("Ghostscript not answering as '{}'", name),
            }
        }
        paths.into_iter().find(|p| exists(p)).map(str::to_string)
    }

    /// Whether `program` can be launched: absolute paths must exist, bare
    /// names are looked up with `which` (or `where` on Windows). Without a
    /// locator the answer is unknown and the name is assumed launchable; the
    /// attempt itself will report `NotFound` if it is not.
    pub async fn is_installed(
        &self,
        runner: &dyn ProcessRunner,
        program: &str,
        timeout: Duration,
    ) -> bool {
        if Path::new(program).is_absolute() {
            return exists(program);
        }
        let locator = match self.platform {
            Platform::Windows => "where",
            Platform::MacOs | Platform::Unix => "which",
        };
        let spec = CommandSpec::new(locator).arg(program);
        match runner.run(&spec, timeout).await {
            Ok(out) => out.success(),
            Err(ProcessError::NotFound { .. }) => {
                debug!("'{}' unavailable, assuming '{}' may exist", locator, program);
                true
            }
            Err(_) => false,
        }
    }
}
