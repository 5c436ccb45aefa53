use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Turn a meal description into a shopping list in grams", long_about = None)]
pub struct Cli {
    /// Meal request, e.g. "borscht for two weeks"
    #[arg(short, long, conflicts_with_all = ["request_file", "interactive"])]
    pub text: Option<String>,

    /// Path to a text file holding the meal request
    #[arg(short, long, conflicts_with = "interactive")]
    pub request_file: Option<String>,

    /// Read one request per line from stdin until EOF
    #[arg(short, long)]
    pub interactive: bool,

    /// Query portion count and ingredients at the same time
    #[arg(long)]
    pub concurrent: bool,

    /// Abort a whole extraction after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Override the configured model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// Connect to the proxy without login/password
    #[arg(long)]
    pub no_proxy_auth: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
