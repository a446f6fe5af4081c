use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;
use todo_probe::errors::Result;
use todo_probe::{ConfigOverrides, FixtureConfig, SessionFixture};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_TASK: &str = "Buy groceries";
const FAILURE_PREFIX: &str = "test_add_task_failure";

fn cli() -> Command {
    Command::new("todo-probe")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Adds a task to the to-do app in Chrome and checks that it is listed")
        .arg(
            Arg::new("url")
                .long("url")
                .value_name("URL")
                .help("Application URL [env: TODO_APP_URL]"),
        )
        .arg(
            Arg::new("headed")
                .long("headed")
                .help("Show the browser window")
                .action(ArgAction::SetTrue)
                .conflicts_with("headless"),
        )
        .arg(
            Arg::new("headless")
                .long("headless")
                .help("Run without a browser window [env: HEADLESS]")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .help("Explicit-wait timeout [env: WAIT_TIMEOUT]")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("artifacts-dir")
                .long("artifacts-dir")
                .value_name("DIR")
                .help("Where failure screenshots go [env: ARTIFACTS_DIR]")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("task")
                .long("task")
                .value_name("TEXT")
                .help("Task label to add")
                .default_value(DEFAULT_TASK),
        )
        .arg(
            Arg::new("walkthrough")
                .long("walkthrough")
                .help("Perform the steps and save a screenshot without waiting or asserting")
                .action(ArgAction::SetTrue),
        )
}

fn overrides(matches: &ArgMatches) -> ConfigOverrides {
    let headless = if matches.get_flag("headed") {
        Some(false)
    } else if matches.get_flag("headless") {
        Some(true)
    } else {
        None
    };

    ConfigOverrides {
        app_url: matches.get_one::<String>("url").cloned(),
        headless,
        wait_timeout_secs: matches.get_one::<u64>("timeout").copied(),
        artifacts_dir: matches.get_one::<PathBuf>("artifacts-dir").cloned(),
    }
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config = FixtureConfig::from_env(overrides(matches))?;
    let task = matches
        .get_one::<String>("task")
        .map(String::as_str)
        .unwrap_or(DEFAULT_TASK);

    info!("Starting add-task check");
    info!("APP_URL = {}", config.app_url);

    // Dropping the fixture on an early return releases Chrome too
    let fixture = SessionFixture::launch(config).await?;
    {
        let probe = fixture.probe().named(FAILURE_PREFIX);

        if matches.get_flag("walkthrough") {
            let run = probe.walkthrough(task).await?;
            if let Some(path) = run.screenshot {
                info!("Walkthrough screenshot: {}", path.display());
            }
        } else {
            probe.add_and_verify(task).await?;
        }
    }

    fixture.close();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = cli().get_matches();

    match run(&matches).await {
        Ok(()) => {
            info!("Test completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(path) = e.screenshot() {
                error!("Failure screenshot: {}", path.display());
            }
            error!("Test failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
