// src/cli.rs
use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf, process::ExitCode};

use crate::infra::t;

pub mod commands;

use commands::run::RunOptions;

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|arg| arg == "--lang")
        .and_then(|pos| args.get(pos + 1))
        .cloned()
}

fn build_cli(locale: &str) -> Command {
    Command::new("run-matrix")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .args_conflicts_with_subcommands(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help(t!("arg_config", locale = locale).to_string())
                .value_name("CONFIG")
                .default_value("Matrix.toml")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("concurrency")
                .short('j')
                .long("concurrency")
                .help(t!("arg_concurrency", locale = locale).to_string())
                .value_name("JOBS")
                .value_parser(clap::value_parser!(u64).range(1..))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("filter")
                .short('f')
                .long("filter")
                .help(t!("arg_filter", locale = locale).to_string())
                .value_name("VALUE")
                .num_args(1..)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("total-runners")
                .long("total-runners")
                .help(t!("arg_total_runners", locale = locale).to_string())
                .value_name("TOTAL_RUNNERS")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set)
                .requires("runner-index"),
        )
        .arg(
            Arg::new("runner-index")
                .long("runner-index")
                .help(t!("arg_runner_index", locale = locale).to_string())
                .value_name("RUNNER_INDEX")
                .value_parser(clap::value_parser!(usize))
                .action(ArgAction::Set)
                .requires("total-runners"),
        )
        .arg(
            Arg::new("cache-dir")
                .long("cache-dir")
                .help(t!("arg_cache_dir", locale = locale).to_string())
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .help(t!("arg_report", locale = locale).to_string())
                .value_name("JSON")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("html")
                .long("html")
                .help(t!("arg_html", locale = locale).to_string())
                .value_name("HTML")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help(t!("arg_timeout", locale = locale).to_string())
                .value_name("SECS")
                .value_parser(clap::value_parser!(u64).range(1..))
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cmd_init_about", locale = locale).to_string())
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("arg_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("arg_output", locale = locale).to_string())
                        .value_name("PATH")
                        .default_value("Matrix.toml")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                ),
        )
}

/// Parses the command line and dispatches.
///
/// Returns the process exit code for a completed run: success iff every
/// variant passed. Errors raised before any job starts are returned as `Err`.
pub async fn run() -> Result<ExitCode> {
    let explicit_lang = pre_parse_language();
    let language = explicit_lang.clone().unwrap_or_else(|| {
        crate::init();
        (*rust_i18n::locale()).to_string()
    });
    rust_i18n::set_locale(&language);

    let matches = build_cli(&language).get_matches();

    match matches.subcommand() {
        Some(("init", init_matches)) => {
            if explicit_lang.is_none() {
                println!(
                    "🌐 {}",
                    t!("system_language_detected", locale = &language, lang = &language)
                );
            }
            let output = init_matches
                .get_one::<PathBuf>("output")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("Matrix.toml"));
            commands::init::run_init_wizard(
                &language,
                init_matches.get_flag("non-interactive"),
                init_matches.get_flag("force"),
                &output,
            )?;
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            let options = run_options(&matches, explicit_lang);
            let report = commands::run::execute(options).await?;
            Ok(if report.passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn run_options(matches: &ArgMatches, lang: Option<String>) -> RunOptions {
    RunOptions {
        config: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .unwrap_or_else(|| PathBuf::from("Matrix.toml")),
        concurrency: matches
            .get_one::<u64>("concurrency")
            .map(|n| usize::try_from(*n).unwrap_or(usize::MAX)),
        filters: matches
            .get_many::<String>("filter")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        total_runners: matches.get_one::<usize>("total-runners").copied(),
        runner_index: matches.get_one::<usize>("runner-index").copied(),
        cache_dir: matches.get_one::<PathBuf>("cache-dir").cloned(),
        report: matches.get_one::<PathBuf>("report").cloned(),
        html: matches.get_one::<PathBuf>("html").cloned(),
        timeout_secs: matches.get_one::<u64>("timeout").copied(),
        lang,
    }
}
