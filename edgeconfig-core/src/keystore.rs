//! CA certificate import through an external keytool

use log::{debug, info};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::Config;
use crate::error::{Error, Result};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// A keytool-compatible command line and the keystore it writes to
#[derive(Debug, Clone)]
pub struct Keytool {
    /// Program followed by any leading arguments
    command: Vec<String>,
    keystore: PathBuf,
    storepass: String,
}

impl Keytool {
    pub fn new(command: Vec<String>, keystore: impl Into<PathBuf>, storepass: &str) -> Result<Self> {
        if command.is_empty() {
            return Err(Error::Config("keytool command must not be empty".to_string()));
        }
        Ok(Self {
            command,
            keystore: keystore.into(),
            storepass: storepass.to_string(),
        })
    }

    /// Keytool from the configuration; `keystore` overrides the configured one
    pub fn from_config(config: &Config, keystore: Option<&Path>) -> Result<Self> {
        let keystore = keystore
            .map(Path::to_path_buf)
            .or_else(|| config.keystore.clone())
            .ok_or_else(|| Error::Config("No keystore given or configured".to_string()))?;
        Self::new(config.keytool.clone(), keystore, &config.storepass)
    }

    pub fn with_storepass(mut self, storepass: &str) -> Self {
        self.storepass = storepass.to_string();
        self
    }

    pub fn keystore(&self) -> &Path {
        &self.keystore
    }

    fn args(&self, alias: &str) -> Vec<String> {
        let mut args: Vec<String> = self.command[1..].to_vec();
        args.extend(
            ["-importcert", "-noprompt", "-trustcacerts", "-alias"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(alias.to_string());
        args.push("-keystore".to_string());
        args.push(self.keystore.to_string_lossy().into_owned());
        args.push("-storepass".to_string());
        args.push(self.storepass.clone());
        args
    }

    /// Imports the PEM certificate text under `alias`
    pub fn import_pem(&self, alias: &str, pem: &str) -> Result<()> {
        check_pem(pem)?;
        if alias.trim().is_empty() {
            return Err(Error::Certificate("alias must not be empty".to_string()));
        }

        let program = &self.command[0];
        debug!("Running {} to import '{}'", program, alias);
        let mut child = Command::new(program)
            .args(self.args(alias))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::io(program, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(pem.as_bytes())
                .map_err(|e| Error::io(program, e))?;
        }
        let output = child.wait_with_output().map_err(|e| Error::io(program, e))?;

        if !output.status.success() {
            return Err(Error::ExternalCommand {
                program: program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        info!(
            "Imported certificate '{}' into {}",
            alias,
            self.keystore.display()
        );
        Ok(())
    }

    /// Reads a PEM file and imports it under `alias`
    pub fn import_file<P: AsRef<Path>>(&self, alias: &str, path: P) -> Result<()> {
        let path = path.as_ref();
        let pem = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        self.import_pem(alias, &pem)
    }
}

/// Rejects text that carries no complete PEM certificate block
pub fn check_pem(pem: &str) -> Result<()> {
    match pem.find(PEM_BEGIN) {
        Some(start) if pem[start..].contains(PEM_END) => Ok(()),
        Some(_) => Err(Error::Certificate(format!("missing {}", PEM_END))),
        None => Err(Error::Certificate(format!("missing {}", PEM_BEGIN))),
    }
}
