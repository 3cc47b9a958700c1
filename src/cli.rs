use crate::model::{
    ScanConfig, WriteMode, DEFAULT_CONCURRENCY, DEFAULT_INPUT, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_OUTPUT, DEFAULT_SEARCH_TEXT, DEFAULT_VIRTUAL_HOST,
};
use crate::util::parse_duration;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(author, version, about = "Bulk HTTPS virtual host prober", long_about = None)]
pub struct Cli {
    /// Input file name (one address per line)
    #[arg(short = 'i', long = "input", value_name = "FILE", default_value = DEFAULT_INPUT)]
    pub input: PathBuf,

    /// Output file for matched addresses, e.g. /etc/hosts
    #[arg(short = 'o', long = "output", value_name = "FILE", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Hostname to check
    #[arg(short = 'H', long = "hostname", default_value = DEFAULT_VIRTUAL_HOST)]
    pub hostname: String,

    /// Search text in content; empty accepts any response
    #[arg(short = 's', long = "search", default_value = DEFAULT_SEARCH_TEXT)]
    pub search: String,

    /// Command to execute when an address matches, e.g. 'echo %s %s >/dev/null' (hostname, address)
    #[arg(long = "found-exec", alias = "foundExec", value_name = "COMMAND", default_value = "")]
    pub found_exec: String,

    /// Timeout per request (e.g. 500ms, 10s, 1m)
    #[arg(short = 't', long = "timeout", default_value = "10s", value_parser = parse_timeout)]
    pub timeout: Duration,

    /// Concurrent workers
    #[arg(long = "threads", alias = "concurrency", default_value_t = DEFAULT_CONCURRENCY)]
    pub threads: usize,

    /// Append to results instead of overwriting
    #[arg(long = "append-file", alias = "appendFile", action = ArgAction::SetTrue)]
    pub append_file: bool,

    /// Suppress all console output
    #[arg(long = "silent-mode", alias = "silentMode", action = ArgAction::SetTrue)]
    pub silent_mode: bool,

    /// Stop the whole scan on the first match
    #[arg(long = "stop-on-found", alias = "stopOnFound", action = ArgAction::SetTrue)]
    pub stop_on_found: bool,

    /// Largest response body buffered per probe
    #[arg(long = "max-body-bytes", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

fn parse_timeout(raw: &str) -> Result<Duration, String> {
    parse_duration(raw).map_err(|err| err.to_string())
}

impl Cli {
    pub fn into_config(self) -> anyhow::Result<ScanConfig> {
        if self.threads == 0 {
            anyhow::bail!("threads must be greater than zero");
        }

        if self.timeout.is_zero() {
            anyhow::bail!("timeout must be greater than zero");
        }

        if self.max_body_bytes == 0 {
            anyhow::bail!("max-body-bytes must be greater than zero");
        }

        Ok(ScanConfig {
            input: self.input,
            output: self.output,
            virtual_host: self.hostname,
            search_text: self.search,
            found_exec: Some(self.found_exec).filter(|cmd| !cmd.trim().is_empty()),
            timeout: self.timeout,
            concurrency: self.threads,
            write_mode: if self.append_file {
                WriteMode::Append
            } else {
                WriteMode::Overwrite
            },
            silent: self.silent_mode,
            stop_on_found: self.stop_on_found,
            max_body_bytes: self.max_body_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_defaults() {
        let cfg = Cli::parse_from(["nethunter"]).into_config().unwrap();
        let defaults = ScanConfig::default();
        assert_eq!(cfg.input, defaults.input);
        assert_eq!(cfg.virtual_host, defaults.virtual_host);
        assert_eq!(cfg.search_text, defaults.search_text);
        assert_eq!(cfg.timeout, defaults.timeout);
        assert_eq!(cfg.concurrency, defaults.concurrency);
        assert_eq!(cfg.write_mode, WriteMode::Overwrite);
        assert!(cfg.found_exec.is_none());
    }

    #[test]
    fn accepts_camel_case_flag_spellings() {
        let cfg = Cli::parse_from([
            "nethunter",
            "--appendFile",
            "--silentMode",
            "--stopOnFound",
            "--foundExec",
            "echo %s %s",
            "--timeout",
            "750ms",
            "--threads",
            "16",
            "--search",
            "",
        ])
        .into_config()
        .unwrap();
        assert_eq!(cfg.write_mode, WriteMode::Append);
        assert!(cfg.silent);
        assert!(cfg.stop_on_found);
        assert_eq!(cfg.found_exec.as_deref(), Some("echo %s %s"));
        assert_eq!(cfg.timeout, Duration::from_millis(750));
        assert_eq!(cfg.concurrency, 16);
        assert!(cfg.search_text.is_empty());
    }

    #[test]
    fn rejects_zero_threads() {
        let err = Cli::parse_from(["nethunter", "--threads", "0"])
            .into_config()
            .unwrap_err();
        assert!(err.to_string().contains("threads"));
    }

    #[test]
    fn rejects_bad_timeout() {
        assert!(Cli::try_parse_from(["nethunter", "--timeout", "soon"]).is_err());
    }
}
