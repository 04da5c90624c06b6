use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Edit EDGE/CWB configuration tables")]
pub struct Cli {
    /// Path to the configuration file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default config file if there is none, then create the schema databases
    Init,

    /// List the editable tables
    Tables,

    /// List every row of a table
    List {
        /// Table name (cpu, role, flags, ...)
        table: String,
    },

    /// Show one row
    Show {
        table: String,
        key: String,

        /// Print the row as JSON
        #[clap(long)]
        json: bool,
    },

    /// Create or update a row
    Set {
        table: String,
        key: String,

        /// Field assignment, e.g. `-f ipadr=10.0.0.1` (repeatable)
        #[clap(long = "field", short = 'f', value_name = "NAME=VALUE")]
        fields: Vec<String>,

        /// New natural key for the row
        #[clap(long)]
        rename: Option<String>,
    },

    /// Edit a row interactively
    Edit { table: String, key: String },

    /// Delete a row
    Del {
        table: String,
        key: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Clear a bitmask row's bit in every row that uses it
    ClearBit {
        table: String,
        key: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Write the ANSS station configuration file
    ExportStations {
        /// Output file (stdout if omitted)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Load class descriptions from a Javadoc directory into the help table
    ImportHelp {
        /// Javadoc output directory
        dir: PathBuf,
    },

    /// Import a CA certificate into a keystore
    ImportCert {
        /// PEM certificate file
        pem: PathBuf,

        /// Keystore to import into (defaults to the configured keystore)
        #[clap(long)]
        keystore: Option<PathBuf>,

        /// Alias for the certificate
        #[clap(long)]
        alias: String,

        /// Keystore password (defaults to the configured one)
        #[clap(long)]
        storepass: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_collects_fields() {
        let cli = Cli::parse_from([
            "edgeconfig",
            "set",
            "cpu",
            "gldketchup",
            "-f",
            "ipadr=10.0.0.1",
            "--field",
            "os=linux",
            "--config",
            "/tmp/e.yaml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/e.yaml")));
        match cli.command {
            Command::Set { table, key, fields, rename } => {
                assert_eq!(table, "cpu");
                assert_eq!(key, "gldketchup");
                assert_eq!(fields, vec!["ipadr=10.0.0.1", "os=linux"]);
                assert!(rename.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_clear_bit_name() {
        let cli = Cli::parse_from(["edgeconfig", "clear-bit", "flags", "LOWRATE", "--yes"]);
        assert!(matches!(cli.command, Command::ClearBit { yes: true, .. }));
    }
}
