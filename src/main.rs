use clap::Parser;
use nethunter::cli::Cli;
use nethunter::output::Console;
use nethunter::Engine;
use tracing_subscriber::EnvFilter;

const EXIT_ABORTED: i32 = 1;
const EXIT_INPUT_FAILED: i32 = 2;
const EXIT_USAGE: i32 = 3;

const BANNER: &str = "\
# - - - - - - - - - - - - - - - - #
# - NetHunter IP Scanner v0.1.0 - #
# - - - - - - - - - - - - - - - - #

Scanning any network without permission may be illegal in your country.
Users are solely responsible for their actions.
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            std::process::exit(EXIT_USAGE);
        }
    };
    let cfg = match cli.into_config() {
        Ok(cfg) => cfg,
        Err(err) => usage_error(&err),
    };

    let filter = if cfg.silent {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let silent = cfg.silent;
    let console = Console::stdout(silent);
    console.emit(BANNER).await;

    let mut engine = match Engine::new(cfg, console.clone()) {
        Ok(engine) => engine,
        Err(err) => {
            console.shutdown().await?;
            usage_error(&err)
        }
    };
    let result = engine.run().await;
    console.shutdown().await?;

    match result {
        Ok(report) if report.is_aborted() => std::process::exit(EXIT_ABORTED),
        Ok(_) => Ok(()),
        Err(err) => {
            if !silent {
                let reason = format!("{err:#}");
                tracing::error!(error = %reason, "scan failed");
            }
            std::process::exit(EXIT_INPUT_FAILED);
        }
    }
}

fn usage_error(err: &anyhow::Error) -> ! {
    eprintln!("error: {err:#}");
    std::process::exit(EXIT_USAGE);
}
