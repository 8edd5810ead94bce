use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "kv-node", about = "A single node of the distributed key-value store")]
pub struct Cli {
    /// Path to the node's config file.
    #[arg(long, default_value = "conf/kv.conf")]
    pub config: PathBuf,
}
