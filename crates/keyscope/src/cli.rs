use std::path::PathBuf;

use clap::Parser;

/// Browse the members of a Redis sorted set, hash or stream.
#[derive(Debug, Parser)]
#[command(name = "keyscope", version, about)]
pub struct Args {
    /// Key to open.
    pub key: String,

    /// Server to connect to; falls back to the configured default.
    #[arg(long, env = "KEYSCOPE_URI")]
    pub uri: Option<String>,

    /// Alternative config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Rows shown at once.
    #[arg(long, default_value_t = 20)]
    pub rows: usize,

    /// Rows scrolled past before printing.
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Only members matching this glob pattern.
    #[arg(long = "match", value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Highest scores first.
    #[arg(long)]
    pub desc: bool,

    /// Consumer group to open (streams).
    #[arg(long)]
    pub group: Option<String>,

    /// Consumer whose pending entries are listed (streams).
    #[arg(long, requires = "group")]
    pub consumer: Option<String>,

    /// Claim the listed pending entries for this consumer.
    #[arg(long, requires = "consumer")]
    pub claim_for: Option<String>,

    /// Minimum idle time, in milliseconds, of entries to claim.
    #[arg(long, default_value_t = 0)]
    pub min_idle: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_browse_flags() {
        let args = Args::parse_from([
            "keyscope", "--uri", "redis://cache:6379/1", "--rows", "5", "--match", "b*", "--desc",
            "scores",
        ]);

        assert_eq!(args.key, "scores");
        assert_eq!(args.uri.as_deref(), Some("redis://cache:6379/1"));
        assert_eq!(args.rows, 5);
        assert_eq!(args.pattern.as_deref(), Some("b*"));
        assert!(args.desc);
    }

    #[test]
    fn claiming_needs_a_consumer() {
        let result = Args::try_parse_from(["keyscope", "--claim-for", "worker-2", "orders"]);
        assert!(result.is_err());
    }
}
