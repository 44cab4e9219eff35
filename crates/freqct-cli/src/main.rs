//! CLI for freqct: two-attribute frequency tables with confidence intervals.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "freqct")]
#[command(about = "freqct: contingency tables of two corpus attributes")]
#[command(version = freqct_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reference contingency-table server over a JSON dataset
    Serve {
        /// Dataset file: {"tables": [{"attr1", "attr2", "rows": [[v1, v2, abs, domain_size]]}]}
        #[arg(long)]
        dataset: String,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port
        #[arg(long, default_value = "8042")]
        port: u16,
    },

    /// Fetch a table from a server and print the matrix or flat view
    Fetch {
        /// First attribute (rows)
        #[arg(long)]
        attr1: String,

        /// Second attribute (columns)
        #[arg(long)]
        attr2: String,

        /// Position of the first attribute, -6..=6 relative to the KWIC
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        pos1: i8,

        /// KWIC edge the first position is counted from
        #[arg(long, default_value = "left", value_parser = ["left", "right"])]
        align1: String,

        /// Position of the second attribute, -6..=6 relative to the KWIC
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        pos2: i8,

        /// KWIC edge the second position is counted from
        #[arg(long, default_value = "left", value_parser = ["left", "right"])]
        align2: String,

        /// Minimum frequency threshold
        #[arg(long, default_value = "1")]
        min_freq: String,

        /// Threshold kind: absolute, ipm, or cumulative percentile of either
        #[arg(long, default_value = "abs", value_parser = ["abs", "ipm", "pabs", "pipm"])]
        min_freq_type: String,

        /// Confidence level of the intervals (defaults to the configured level)
        #[arg(long, value_parser = ["0.1", "0.05", "0.01", "0.001"])]
        alpha: Option<String>,

        /// Which view to print and export
        #[arg(long, default_value = "matrix", value_parser = ["matrix", "flat"])]
        view: String,

        /// Sort matrix rows
        #[arg(long, value_parser = ["attr", "abs", "ipm"])]
        sort_rows: Option<String>,

        /// Sort matrix columns
        #[arg(long, value_parser = ["attr", "abs", "ipm"])]
        sort_cols: Option<String>,

        /// Sort the flat list; repeat the same column to reverse it
        #[arg(long, value_parser = ["attr1", "abs", "ipm"])]
        flat_sort: Vec<String>,

        /// Hide rows and columns without any visible cell
        #[arg(long)]
        hide_empty: bool,

        /// Swap rows and columns of the matrix
        #[arg(long)]
        transpose: bool,

        /// Quantity shown in matrix cells
        #[arg(long, default_value = "abs", value_parser = ["abs", "ipm"])]
        quantity: String,

        /// Heatmap color mapping
        #[arg(long, default_value = "linear", value_parser = ["linear", "percentile"])]
        color_mapping: String,

        /// Write the server's CSV export of the printed view to this path
        #[arg(long)]
        export: Option<String>,

        /// JSON configuration file
        #[arg(long)]
        config: Option<String>,

        /// Server base URL (overrides the configuration)
        #[arg(long)]
        server: Option<String>,

        /// Print the state as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the Wilson confidence interval of a proportion
    Interval {
        /// Absolute frequency
        #[arg(long)]
        abs: u64,

        /// Size of the domain the frequency was counted in
        #[arg(long)]
        total: u64,

        /// Confidence level
        #[arg(long, default_value = "0.05", value_parser = ["0.1", "0.05", "0.01", "0.001"])]
        alpha: String,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            dataset,
            host,
            port,
        } => commands::serve::run(&dataset, &host, port),
        Commands::Fetch {
            attr1,
            attr2,
            pos1,
            align1,
            pos2,
            align2,
            min_freq,
            min_freq_type,
            alpha,
            view,
            sort_rows,
            sort_cols,
            flat_sort,
            hide_empty,
            transpose,
            quantity,
            color_mapping,
            export,
            config,
            server,
            json,
        } => commands::fetch::run(commands::fetch::FetchCommandConfig {
            attr1,
            attr2,
            pos1,
            align1: &align1,
            pos2,
            align2: &align2,
            min_freq,
            min_freq_type: &min_freq_type,
            alpha: alpha.as_deref(),
            view: &view,
            sort_rows: sort_rows.as_deref(),
            sort_cols: sort_cols.as_deref(),
            flat_sort: &flat_sort,
            hide_empty,
            transpose,
            quantity: &quantity,
            color_mapping: &color_mapping,
            export_path: export.as_deref(),
            config_path: config.as_deref(),
            server: server.as_deref(),
            json,
        }),
        Commands::Interval { abs, total, alpha } => commands::interval::run(abs, total, &alpha),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
