// Command line of the `sanity` binary.

use std::ffi::OsString;
use std::io::Write;

use clap::Parser;
use tracing::debug;

use crate::config::{HarnessConfig, RunMode};
use crate::harness::Harness;
use crate::scheme::Ntru;

/// NTRUEncrypt round-trip sanity checks and benchmarks.
#[derive(Parser, Debug)]
#[command(name = "sanity")]
pub struct Cli {
    /// Run quick & dirty benchmarks; omit to run just sanity checks.
    #[arg(long)]
    pub bench: bool,
}

pub fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [-bench]\n\
         -bench runs quick & dirty benchmarks; omit to run just sanity checks\n"
    )
}

/// Parses `args` (program name first). The single-dash `-bench` is accepted
/// as a spelling of `--bench`.
pub fn parse_mode<I, T>(args: I) -> Result<RunMode, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args = args.into_iter().map(Into::into).enumerate().map(|(i, a): (usize, OsString)| {
        // exact match only; prefixes such as `-benchmark` are usage errors
        if i > 0 && a == "-bench" {
            OsString::from("--bench")
        } else {
            a
        }
    });
    let cli = Cli::try_parse_from(args)?;
    Ok(if cli.bench { RunMode::Bench } else { RunMode::Sanity })
}

/// Runs the tool and returns the process exit status. Progress and usage
/// go to `stderr`.
pub fn run<I, T>(args: I, stderr: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let prog = args
        .first()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sanity".to_string());

    let mode = match parse_mode(args) {
        Ok(mode) => mode,
        Err(e) => {
            debug!(error = %e, "rejected command line");
            let _ = stderr.write_all(usage(&prog).as_bytes());
            return 0;
        }
    };

    let config = HarnessConfig::new(mode).with_env_overrides();
    let mut harness = Harness::new(Ntru, config);
    harness.run(stderr).exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bench_flag_spellings() {
        assert_eq!(parse_mode(["sanity"]).unwrap(), RunMode::Sanity);
        assert_eq!(parse_mode(["sanity", "-bench"]).unwrap(), RunMode::Bench);
        assert_eq!(parse_mode(["sanity", "--bench"]).unwrap(), RunMode::Bench);
    }

    #[test]
    fn other_arguments_are_rejected() {
        assert!(parse_mode(["sanity", "-b"]).is_err());
        assert!(parse_mode(["sanity", "-benchmark"]).is_err());
        assert!(parse_mode(["sanity", "--bench", "extra"]).is_err());
        assert!(parse_mode(["sanity", "-bench", "-bench"]).is_err());
        assert!(parse_mode(["sanity", "--help"]).is_err());
        // the program name itself is never rewritten
        assert_eq!(parse_mode(["-bench"]).unwrap(), RunMode::Sanity);
    }

    #[test]
    fn unknown_flag_prints_usage_and_exits_zero() {
        let mut err = Vec::new();
        let code = run(["./sanity", "--frobnicate"], &mut err);
        assert_eq!(code, 0);
        let text = String::from_utf8(err).unwrap();
        assert_eq!(
            text,
            "Usage: ./sanity [-bench]\n-bench runs quick & dirty benchmarks; omit to run just sanity checks\n"
        );
        assert!(!text.contains("Testing parameter set"));
    }
}
