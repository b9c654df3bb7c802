use crate::api::FetchCaps;
use crate::retry::RetryPolicy;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Extract Reddit posts and their comment trees from a spreadsheet of URLs")]
pub struct Args {
    /// Spreadsheet with one post URL per row in the first column.
    pub input: PathBuf,

    /// Output .xlsx path. Its directory must already exist.
    pub output: PathBuf,

    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Global request budget per minute, shared by all workers.
    #[arg(long, default_value_t = 60)]
    pub rpm: u32,

    /// Tries per API call, the first included.
    #[arg(long, default_value_t = 4)]
    pub attempts: u32,

    /// Seconds before the first retry; doubles each time.
    #[arg(long, default_value_t = 2.0)]
    pub backoff_base: f64,

    #[arg(long, default_value_t = 60.0)]
    pub backoff_max: f64,

    #[arg(long, default_value_t = 500)]
    pub max_comments: usize,

    /// Deepest reply level kept, top-level comments being 0.
    #[arg(long, default_value_t = 8)]
    pub max_depth: usize,

    #[arg(long, default_value = ".env")]
    pub env_file: PathBuf,

    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

impl Args {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            base: secs(self.backoff_base),
            max: secs(self.backoff_max),
            ..RetryPolicy::default()
        }
    }

    pub fn caps(&self) -> FetchCaps {
        FetchCaps {
            max_comments: self.max_comments,
            max_depth: self.max_depth,
        }
    }
}

fn secs(s: f64) -> Duration {
    if s.is_finite() && s > 0.0 {
        Duration::from_secs_f64(s)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_paths_and_defaults() {
        let a = Args::try_parse_from(["threadsheet", "in.xlsx", "out/res.xlsx"]).unwrap();
        assert_eq!(a.input, PathBuf::from("in.xlsx"));
        assert_eq!(a.output, PathBuf::from("out/res.xlsx"));
        assert_eq!(a.caps(), FetchCaps::default());
        let p = a.retry_policy();
        assert_eq!(p.attempts, 4);
        assert_eq!(p.base, Duration::from_secs(2));
    }

    #[test]
    fn both_paths_required() {
        assert!(Args::try_parse_from(["threadsheet", "in.xlsx"]).is_err());
    }
}
