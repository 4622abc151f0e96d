use anyhow::Result;
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use multibalance_cli::balance::input::BalanceRunConfig;
use multibalance_cli::balance::run::{run_adjust, run_summary};

fn input_args() -> Vec<Arg> {
    vec![
        Arg::new("input")
            .help("Path to the samples file (*.csv or *.tsv) with true, predicted and group columns")
            .required(false)
            .value_parser(clap::builder::NonEmptyStringValueParser::new())
            .value_hint(ValueHint::FilePath),
        Arg::new("config")
            .short('c')
            .long("config")
            .help("Path to a JSON run configuration. Command-line options override its values.")
            .value_parser(clap::value_parser!(PathBuf))
            .value_hint(ValueHint::FilePath),
        Arg::new("y_true_col")
            .long("y-true-col")
            .help("Column holding the true labels (default: y_true)")
            .value_parser(clap::builder::NonEmptyStringValueParser::new()),
        Arg::new("y_pred_col")
            .long("y-pred-col")
            .help("Column holding the predicted labels (default: y_pred)")
            .value_parser(clap::builder::NonEmptyStringValueParser::new()),
        Arg::new("group_col")
            .long("group-col")
            .help("Column holding the protected-group labels (default: group)")
            .value_parser(clap::builder::NonEmptyStringValueParser::new()),
        Arg::new("summary_json")
            .long("summary-json")
            .help("Write the summary as JSON to this path")
            .value_parser(clap::builder::NonEmptyStringValueParser::new())
            .value_hint(ValueHint::FilePath),
        Arg::new("report")
            .long("report")
            .help("Write an HTML report with charts to this path")
            .value_parser(clap::builder::NonEmptyStringValueParser::new())
            .value_hint(ValueHint::FilePath),
    ]
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("MULTIBALANCE_LOG", "error,multibalance=info"))
        .init();

    let matches = Command::new("multibalance")
        .version(clap::crate_version!())
        .about("Fairness post-processing for multiclass classifier predictions")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("adjust")
                .about("Solve for per-group randomized relabelings that satisfy a fairness goal")
                .args(input_args())
                .arg(
                    Arg::new("goal")
                        .short('g')
                        .long("goal")
                        .help("Fairness goal. Overrides the goal in the configuration file.")
                        .value_parser(["odds", "strict", "opportunity"])
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("loss")
                        .short('l')
                        .long("loss")
                        .help("Loss aggregation. Overrides the loss in the configuration file.")
                        .value_parser(["macro", "micro"])
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help("Seed for sampling adjusted labels")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("predictions")
                        .short('o')
                        .long("predictions")
                        .help("Write the adjusted labels and probabilities to this path (*.csv or *.tsv)")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("summary")
                .about("Report per-group error rates of the original predictions")
                .args(input_args()),
        )
        .subcommand(Command::new("config").about("Print the default run configuration as JSON"))
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("adjust", sub_m)) => handle_adjust(sub_m),
        Some(("summary", sub_m)) => handle_summary(sub_m),
        Some(("config", _)) => {
            println!("{}", serde_json::to_string_pretty(&BalanceRunConfig::default())?);
            Ok(())
        }
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_adjust(matches: &ArgMatches) -> Result<()> {
    let params = BalanceRunConfig::from_arguments(matches.get_one::<PathBuf>("config"), matches)?;
    log::info!(
        "[multibalance::cli] Adjusting {} for goal={} loss={}",
        params.input,
        params.balance.goal,
        params.balance.loss
    );

    match run_adjust(&params) {
        Ok(summary) => {
            print!("{}", summary);
            Ok(())
        }
        Err(e) => {
            log::error!("Adjustment failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_summary(matches: &ArgMatches) -> Result<()> {
    let params = BalanceRunConfig::from_arguments(matches.get_one::<PathBuf>("config"), matches)?;

    match run_summary(&params) {
        Ok(summary) => {
            print!("{}", summary);
            Ok(())
        }
        Err(e) => {
            log::error!("Summary failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
