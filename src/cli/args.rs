use clap::{Args, Parser, Subcommand};

/// Seed local user data from the remote sync store on first use
#[derive(Parser)]
#[command(name = "userdata-init")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options describing the host session.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Profile directory holding user data. Defaults to ~/.userdata
    #[arg(long, env = "USERDATA_PROFILE_DIR")]
    pub profile_dir: Option<String>,

    /// Workspace opened in this session
    #[arg(short = 'w', long)]
    pub workspace: Option<String>,

    /// Product configuration (product.json)
    #[arg(long, env = "USERDATA_PRODUCT")]
    pub product: Option<String>,

    /// Launch options supplied by the embedder (JSON)
    #[arg(long)]
    pub options: Option<String>,

    /// Run as a web-hosted session
    #[arg(long)]
    pub web: bool,

    /// Retries for transient sync store failures (0 disables retrying)
    #[arg(long)]
    pub max_retries: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the startup sequence and seed user data if this session qualifies
    Init {
        #[command(flatten)]
        session: SessionArgs,

        /// Do not install extensions from the remote store
        #[arg(long)]
        skip_extensions: bool,
    },
    /// Show whether remote initialization would run, and why not
    Status {
        #[command(flatten)]
        session: SessionArgs,
    },
}
