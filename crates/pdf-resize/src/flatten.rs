//! PDF flattening through Ghostscript
//!
//! Flattening rewrites a finished PDF with Ghostscript's `pdfwrite` device and
//! `-dNoOutputFonts`, so text becomes outlines and the file no longer depends
//! on embedded fonts. Ghostscript is an external program located at run time;
//! each configured executable is tried in turn until one succeeds.

use crate::types::*;
use std::ffi::OsString;
use std::process::Output;
use tokio::process::Command;

#[cfg(target_os = "windows")]
const DEFAULT_COMMANDS: &[&str] = &["gswin64c", "gswin32c", "gs"];
#[cfg(not(target_os = "windows"))]
const DEFAULT_COMMANDS: &[&str] = &["gs"];

/// Path of a Ghostscript executable, tried before the default command names
pub const GHOSTSCRIPT_ENV: &str = "PDF_RESIZE_GS";

/// Options passed before the output and input file arguments
const FLATTEN_ARGS: &[&str] = &[
    "-dBATCH",
    "-dNOPAUSE",
    "-dSAFER",
    "-dQUIET",
    "-sDEVICE=pdfwrite",
    "-dNoOutputFonts",
    "-dCompatibilityLevel=1.7",
];

/// A list of Ghostscript executables to try, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ghostscript {
    commands: Vec<OsString>,
}

impl Default for Ghostscript {
    /// `$PDF_RESIZE_GS` if set, then the platform's usual command names on `PATH`
    fn default() -> Self {
        let mut commands: Vec<OsString> = std::env::var_os(GHOSTSCRIPT_ENV).into_iter().collect();
        commands.extend(DEFAULT_COMMANDS.iter().map(OsString::from));
        Self { commands }
    }
}

impl Ghostscript {
    /// Try exactly these executables
    pub fn with_commands<I, C>(commands: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<OsString>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }

    pub fn commands(&self) -> &[OsString] {
        &self.commands
    }

    /// Version reported by the first working executable
    pub async fn version(&self) -> Result<String> {
        let output = self.run(&[OsString::from("--version")]).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub async fn is_available(&self) -> bool {
        self.version().await.is_ok()
    }

    /// Flatten one PDF document.
    ///
    /// Input and output go through a private temporary directory that is
    /// removed when the call returns.
    pub async fn flatten(&self, pdf: Vec<u8>) -> Result<Vec<u8>> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("input.pdf");
        let output = dir.path().join("flattened.pdf");
        tokio::fs::write(&input, &pdf).await?;

        let mut output_arg = OsString::from("-sOutputFile=");
        output_arg.push(&output);
        let mut args: Vec<OsString> = FLATTEN_ARGS.iter().map(OsString::from).collect();
        args.push(output_arg);
        args.push(input.into_os_string());

        self.run(&args).await?;
        let flattened = tokio::fs::read(&output).await?;
        if flattened.is_empty() {
            return Err(ResizeError::Flatten(
                "Ghostscript produced an empty file".to_string(),
            ));
        }
        log::debug!("Flattened PDF: {} -> {} bytes", pdf.len(), flattened.len());
        Ok(flattened)
    }

    async fn run(&self, args: &[OsString]) -> Result<Output> {
        let mut last_error = "no Ghostscript executable configured".to_string();
        for command in &self.commands {
            let name = command.to_string_lossy();
            match Command::new(command).args(args).kill_on_drop(true).output().await {
                Ok(output) if output.status.success() => return Ok(output),
                Ok(output) => {
                    last_error = format!(
                        "'{}' failed with {}: {}",
                        name,
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                Err(e) => {
                    last_error = format!("failed to run '{}': {}", name, e);
                }
            }
            log::debug!("Ghostscript attempt: {}", last_error);
        }
        Err(ResizeError::Flatten(last_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ends_with_platform_commands() {
        let gs = Ghostscript::default();
        let tail = &gs.commands()[gs.commands().len() - DEFAULT_COMMANDS.len()..];
        let expected: Vec<OsString> = DEFAULT_COMMANDS.iter().map(OsString::from).collect();
        assert_eq!(tail, expected.as_slice());
    }

    #[tokio::test]
    async fn test_missing_executables_reported() {
        let gs = Ghostscript::with_commands(["pdf-resize-no-such-gs-a", "pdf-resize-no-such-gs-b"]);
        assert!(!gs.is_available().await);

        match gs.flatten(b"%PDF-1.7".to_vec()).await {
            Err(ResizeError::Flatten(msg)) => assert!(msg.contains("pdf-resize-no-such-gs-b")),
            other => panic!("Expected Flatten error, got {:?}", other.map(|b| b.len())),
        }
    }

    #[tokio::test]
    async fn test_no_executables_configured() {
        let gs = Ghostscript::with_commands(Vec::<OsString>::new());
        match gs.version().await {
            Err(ResizeError::Flatten(msg)) => assert!(msg.contains("no Ghostscript")),
            other => panic!("Expected Flatten error, got {:?}", other),
        }
    }
}
