use std::path::PathBuf;

use clap::Parser;

use crate::config::types::HostKeyMode;

#[derive(Parser, Debug)]
#[command(
    name = "sftpgate",
    version,
    about = "Browse and transfer files on a remote host over SFTP through a local JSON API"
)]
pub struct Cli {
    /// SFTP host address (required)
    #[arg(long)]
    pub host: Option<String>,

    /// SFTP user name (required)
    #[arg(long)]
    pub user: Option<String>,

    /// SFTP port [default: 22]
    #[arg(long)]
    pub port: Option<u16>,

    /// Password credential (mutually exclusive with --key)
    #[arg(long)]
    pub password: Option<String>,

    /// Private key file credential (mutually exclusive with --password)
    #[arg(long, value_name = "KEYFILE")]
    pub key: Option<PathBuf>,

    /// Address the JSON API listens on [default: 127.0.0.1:8080]
    #[arg(long)]
    pub listen: Option<String>,

    /// Local folder downloads are written to [default: $HOME/temporary]
    #[arg(long = "download-to", value_name = "DIR")]
    pub download_to: Option<PathBuf>,

    /// Host key verification policy [default: tofu]
    #[arg(long = "host-key", value_enum)]
    pub host_key: Option<HostKeyMode>,

    /// Accepted host key fingerprint for --host-key pinned (can be repeated)
    #[arg(long = "fingerprint", value_name = "SHA256:...", action = clap::ArgAction::Append)]
    pub fingerprints: Vec<String>,

    /// Trust-on-first-use store [default: <config dir>/sftpgate/known_hosts.json]
    #[arg(long = "known-hosts", value_name = "FILE")]
    pub known_hosts: Option<PathBuf>,

    /// TOML config file [default: <config dir>/sftpgate/config.toml if present]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for verbose, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode: suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}
