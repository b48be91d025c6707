use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::executor::{Script, ScriptExecutor};
use crate::process::ExitStatus;

/// Scripts run by [`ImportRunner::run_all`], in order.
pub const DEFAULT_SCRIPTS: [&str; 2] = ["0_init.cyphers", "1_yelp.cyphers"];

const BANNER_RULE: &str = "------------------------------------------------------------";

/// Result of copying the source CSV into the import directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub from: PathBuf,
    pub to: PathBuf,
    pub bytes: u64,
}

/// Copy `source` into `import_dir`, keeping its file name and replacing any
/// existing file.
pub async fn stage_csv(source: &Path, import_dir: &Path) -> Result<StagedFile> {
    let file_name = source.file_name().ok_or_else(|| {
        ImportError::Configuration(format!("{} has no file name", source.display()))
    })?;
    let to = import_dir.join(file_name);
    let bytes = tokio::fs::copy(source, &to)
        .await
        .map_err(|e| ImportError::Stage {
            from: source.to_path_buf(),
            to: to.clone(),
            source: e,
        })?;
    Ok(StagedFile {
        from: source.to_path_buf(),
        to,
        bytes,
    })
}

/// Resolve `name` inside `dir`, rejecting anything but a bare file name.
pub fn script_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(name)),
        _ => Err(ImportError::InvalidScriptName {
            name: name.to_owned(),
        }),
    }
}

#[derive(Debug)]
pub struct ScriptOutcome {
    pub name: String,
    pub result: Result<ExitStatus>,
}

impl ScriptOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(status) if status.success())
    }
}

/// What happened during [`ImportRunner::run_all`].
#[derive(Debug)]
pub struct ImportReport {
    pub staging: Result<StagedFile>,
    pub scripts: Vec<ScriptOutcome>,
    /// Scripts never attempted because an earlier step failed.
    pub skipped: Vec<String>,
}

impl ImportReport {
    pub fn succeeded(&self) -> bool {
        self.staging.is_ok()
            && self.skipped.is_empty()
            && self.scripts.iter().all(ScriptOutcome::succeeded)
    }
}

/// Stages the CSV and feeds each script to an executor, strictly one after
/// another. Banners and script bodies are echoed to `console`.
pub struct ImportRunner<E, W> {
    config: ImportConfig,
    executor: E,
    console: W,
    scripts: Vec<String>,
    keep_going: bool,
}

impl<E: ScriptExecutor, W: Write> ImportRunner<E, W> {
    pub fn new(config: ImportConfig, executor: E, console: W) -> Self {
        Self {
            config,
            executor,
            console,
            scripts: DEFAULT_SCRIPTS.iter().map(|s| s.to_string()).collect(),
            keep_going: false,
        }
    }

    /// Replace the script list. Order is preserved.
    pub fn with_scripts<I, S>(mut self, scripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scripts = scripts.into_iter().map(Into::into).collect();
        self
    }

    /// Continue past a failed copy or script instead of stopping.
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_console(self) -> W {
        self.console
    }

    /// Read `name` from the script directory, echo it, and hand it to the
    /// executor.
    pub async fn run(&mut self, name: &str) -> Result<ExitStatus> {
        let path = script_path(&self.config.scripts_dir, name)?;
        let contents = tokio::fs::read(&path)
            .await
            .map_err(|source| ImportError::ReadScript {
                path: path.clone(),
                source,
            })?;

        self.echo(name, &contents).map_err(ImportError::Console)?;

        info!(script = name, client = %self.executor.describe(), "running script");
        let script = Script {
            name: name.to_owned(),
            path,
            contents,
        };
        self.executor.execute(&script).await
    }

    fn echo(&mut self, name: &str, contents: &[u8]) -> std::io::Result<()> {
        writeln!(self.console, "{BANNER_RULE}")?;
        writeln!(self.console, "Running {name}")?;
        writeln!(self.console, "{BANNER_RULE}")?;
        self.console.write_all(contents)?;
        if !contents.is_empty() && !contents.ends_with(b"\n") {
            writeln!(self.console)?;
        }
        self.console.flush()
    }

    /// Stage the CSV, then run every script in order.
    pub async fn run_all(&mut self) -> ImportReport {
        // Always shown, whatever the log level. The password is redacted.
        if let Err(e) = writeln!(self.console, "Configuration: {}", self.config) {
            warn!("failed to print configuration: {e}");
        }

        let import_dir = self.config.import_dir();
        let staging = stage_csv(&self.config.csv_source, &import_dir).await;
        match &staging {
            Ok(staged) => info!(
                "staged {} -> {} ({} bytes)",
                staged.from.display(),
                staged.to.display(),
                staged.bytes
            ),
            Err(e) => error!("staging failed: {e}"),
        }

        let mut scripts = Vec::with_capacity(self.scripts.len());
        let mut skipped = Vec::new();
        let mut halted = staging.is_err() && !self.keep_going;

        for name in self.scripts.clone() {
            if halted {
                skipped.push(name);
                continue;
            }
            let result = self.run(&name).await;
            match &result {
                Ok(status) if status.success() => info!(script = %name, "script finished"),
                Ok(status) => error!(script = %name, "script failed with {status}"),
                Err(e) => error!(script = %name, "script could not run: {e}"),
            }
            let outcome = ScriptOutcome { name, result };
            halted = !outcome.succeeded() && !self.keep_going;
            scripts.push(outcome);
        }

        let report = ImportReport {
            staging,
            scripts,
            skipped,
        };
        if report.succeeded() {
            info!("import complete: {} scripts ran", report.scripts.len());
        } else {
            warn!(
                "import incomplete: {} of {} scripts succeeded, {} skipped",
                report.scripts.iter().filter(|s| s.succeeded()).count(),
                self.scripts.len(),
                report.skipped.len()
            );
        }
        report
    }
}
