use anyhow::Result;
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;

use ppi_cli::serve::input::ServeConfig;
use ppi_cli::serve::server;
use ppi_cli::train::input::TrainConfig;
use ppi_cli::train::trainer;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("PPI_LOG", "error,ppi=info"))
        .init();

    let matches = Command::new("ppi")
        .version(clap::crate_version!())
        .about("Protein-protein interaction prediction: train models and serve predictions")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train an interaction model from known-positive pairs")
                .arg(
                    Arg::new("config")
                        .help("Path to training configuration file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("train_data")
                        .short('d')
                        .long("train_data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to the positive-pair table. Overrides the training data file \
                             specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("sequence_data")
                        .short('s')
                        .long("sequence_data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to the identifier/sequence table. Overrides the sequence data \
                             file specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output_file")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "File path that the safetensors trained model will be written to. \
                             Overrides the path specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("cache_file")
                        .short('c')
                        .long("cache_file")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Embedding cache file to load and update. Overrides the cache file \
                             specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve predictions from a trained model over HTTP")
                .arg(
                    Arg::new("config")
                        .help("Path to serve configuration file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("model_file")
                        .short('m')
                        .long("model")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to the trained model checkpoint (*.safetensors). Overrides \
                             the model file specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("cache_file")
                        .short('c')
                        .long("cache_file")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Embedding cache file to warm-start from. Overrides the cache file \
                             specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_parser(clap::value_parser!(u16))
                        .help("Port to listen on. Overrides the configuration file.")
                        .value_hint(ValueHint::Other),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("serve", sub_m)) => handle_serve(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let config_path: &PathBuf = matches.get_one("config").unwrap();
    log::info!("[PPI] Training from config: {:?}", config_path);

    let config = TrainConfig::from_arguments(config_path, matches)?;
    match trainer::run_training(&config) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_serve(matches: &ArgMatches) -> Result<()> {
    let config_path: &PathBuf = matches.get_one("config").unwrap();
    log::info!("[PPI] Serving from config: {:?}", config_path);

    let config = ServeConfig::from_arguments(config_path, matches)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    match runtime.block_on(server::run_server(config)) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Server failed: {:#}", e);
            std::process::exit(1)
        }
    }
}
