//! External decompiler driver.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

const PYC_SUFFIX: &str = ".pyc";

/// A decompiler invoked as `<program> <file.pyc>` that prints source to stdout.
#[derive(Debug, Clone)]
pub struct Decompiler {
    program: PathBuf,
}

impl Decompiler {
    /// Resolve `name` through `PATH`.
    pub fn locate(name: &str) -> Result<Self> {
        let program =
            which::which(name).with_context(|| format!("Decompiler `{name}` not found"))?;
        Ok(Self { program })
    }

    /// Decompile one `.pyc` image.
    pub fn decompile(&self, image: &[u8]) -> Result<String> {
        let mut file = tempfile::Builder::new()
            .prefix("unfreeze-")
            .suffix(PYC_SUFFIX)
            .tempfile()
            .context("Failed to create temporary file")?;
        file.write_all(image)?;
        file.flush()?;

        let output = Command::new(&self.program)
            .arg(file.path())
            .output()
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Decompile every `.pyc` in `files`.
    ///
    /// Returns sources keyed by their `.py` path. Entries that fail are
    /// logged and left out.
    pub fn decompile_all(
        &self,
        files: &BTreeMap<String, Vec<u8>>,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let targets: Vec<(&String, String)> = files
            .keys()
            .filter_map(|path| source_path(path).map(|source| (path, source)))
            .collect();

        println!("Decompiling {} files...", targets.len());

        let pb = ProgressBar::new(targets.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("#>-"),
        );

        let mut sources = BTreeMap::new();
        let mut errors = 0;
        for (path, source) in targets {
            match self.decompile(&files[path]) {
                Ok(text) => {
                    sources.insert(source, text.into_bytes());
                }
                Err(e) => {
                    pb.suspend(|| tracing::warn!("Failed to decompile {path}: {e:#}"));
                    errors += 1;
                }
            }
            pb.inc(1);
        }

        pb.finish_with_message("Done");
        println!("Decompiled {} files ({} errors)", sources.len(), errors);

        Ok(sources)
    }
}

/// Source path for a compiled module, `None` for anything else.
pub fn source_path(pyc_path: &str) -> Option<String> {
    pyc_path
        .strip_suffix(PYC_SUFFIX)
        .map(|stem| format!("{stem}.py"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_path() {
        assert_eq!(source_path("app/__init__.pyc").as_deref(), Some("app/__init__.py"));
        assert_eq!(source_path("main.pyc").as_deref(), Some("main.py"));
        assert_eq!(source_path("secret.pyc.encrypted"), None);
        assert_eq!(source_path("PYZ-00.pyz"), None);
    }

    #[test]
    fn test_missing_decompiler() {
        assert!(Decompiler::locate("unfreeze-no-such-decompiler-xyz").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_decompile_with_cat() {
        let Ok(cat) = Decompiler::locate("cat") else {
            return;
        };

        let mut files = BTreeMap::new();
        files.insert("a.pyc".to_string(), b"print('a')\n".to_vec());
        files.insert("data.bin".to_string(), b"ignored".to_vec());

        let sources = cat.decompile_all(&files).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources["a.py"], b"print('a')\n");
    }
}
