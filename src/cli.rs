use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::access::Modifier;

#[derive(Debug, Clone, Parser)]
#[command(name = "class-meta")]
#[command(about = "Extract class, field, method and annotation metadata from compiled Java classes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Worker threads used for decoding
    #[arg(long, value_name = "N", global = true)]
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// List the classes found under the given locations
    Scan {
        /// Directories, jars or class files; defaults to $CLASSPATH
        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,

        #[arg(long, value_name = "CLASS")]
        subclass_of: Option<String>,

        #[arg(long, value_name = "ANNOTATION")]
        annotated_with: Option<String>,

        #[arg(long, value_name = "ANNOTATION")]
        member_annotated_with: Option<String>,

        /// Keep classes carrying any of these modifiers
        #[arg(long, value_enum, value_delimiter = ',', value_name = "MODIFIER")]
        modifiers: Vec<Modifier>,

        /// Require every modifier given to --modifiers instead of any one
        #[arg(long, requires = "modifiers")]
        all_modifiers: bool,

        #[arg(long, value_name = "REGEX")]
        name_regex: Option<String>,

        /// Ignore nested classes (`Outer$Inner`)
        #[arg(long)]
        skip_inner: bool,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Show everything known about one class
    Show {
        class_name: String,

        #[arg(value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Keep the raw class bytes and report their digest
        #[arg(long)]
        retain_bytecode: bool,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
