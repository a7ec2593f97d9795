//! Command-line arguments

use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(name = "teleput", version, about = "Browse, rename, delete and download your put.io files")]
pub struct Cli {
    /// OAuth token (overrides PUTIO_TOKEN and the stored token)
    #[arg(long)]
    pub token: Option<String>,

    /// Directory downloads are written to
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Append diagnostics to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Debug-level logging (only with --log-file)
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["teleput"]);
        assert_eq!(cli.dir, PathBuf::from("."));
        assert!(cli.token.is_none());
        assert!(cli.log_file.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn all_flags() {
        let cli = Cli::parse_from([
            "teleput", "--token", "abc", "--dir", "/data", "--log-file", "/tmp/t.log", "-v",
        ]);
        assert_eq!(cli.token.as_deref(), Some("abc"));
        assert_eq!(cli.dir, PathBuf::from("/data"));
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/t.log")));
        assert!(cli.verbose);
    }
}
