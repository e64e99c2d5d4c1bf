use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "pdu")]
#[command(about = "Offline heap file decoding and disaster-recovery toolkit")]
#[command(version)]
pub struct Cli {
    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Number of worker threads for parallel work (0 = all cores)
    #[arg(long, default_value = "0", global = true)]
    pub threads: usize,

    /// Read data files through a memory map
    #[arg(long, global = true)]
    pub mmap: bool,

    /// Diagnostic log level written to stderr (overrides RUST_LOG)
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

/// Row output format for `unload`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RowFormat {
    Json,
    Csv,
    Sql,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show page headers and line pointers of a data file
    Info {
        /// Path to the heap data file
        #[arg(short, long)]
        file: String,

        /// Show a single page (0-based)
        #[arg(short, long)]
        page: Option<u64>,

        /// List every line pointer
        #[arg(short, long)]
        verbose: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Classify every page of every data file in a directory
    Scan {
        /// Data directory to search for relation files
        #[arg(short, long)]
        dir: String,

        /// List each damaged page
        #[arg(short, long)]
        verbose: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Decode live tuples of a data file
    Unload {
        /// Path to the heap data file
        #[arg(short, long)]
        file: String,

        /// JSON schema file describing table columns
        #[arg(short, long, requires = "table")]
        schema: Option<String>,

        /// Table to look up in the schema file
        #[arg(short, long, requires = "schema")]
        table: Option<String>,

        /// Row output format
        #[arg(long, default_value = "json")]
        format: RowFormat,

        /// Unload a single page (0-based)
        #[arg(short, long)]
        page: Option<u64>,
    },

    /// Recover heap pages from a damaged file or raw disk image
    Dropscan {
        /// Path to the file or image to scan
        #[arg(short, long)]
        file: String,

        /// JSON schema file describing table columns
        #[arg(short, long, requires = "table")]
        schema: Option<String>,

        /// Table to look up in the schema file
        #[arg(short, long, requires = "schema")]
        table: Option<String>,

        /// Distance between probes inside a damaged window, in bytes
        #[arg(long = "probe-step", default_value = "512")]
        probe_step: usize,

        /// Bytes per parallel scan region
        #[arg(long = "region-size", default_value = "8388608")]
        region_size: u64,

        /// Byte offset to start scanning from
        #[arg(long, default_value = "0")]
        start: u64,

        /// Stop scanning at this byte offset
        #[arg(long)]
        stop: Option<u64>,

        /// Print a hex dump of unreadable tuples
        #[arg(short, long)]
        verbose: bool,

        /// Output one JSON object per recovered page (NDJSON)
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}
