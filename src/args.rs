use crate::errors::HprofHistoError;
use crate::errors::HprofHistoError::InvalidTopPositiveInt;
use crate::instance_aggregator::{AggregatorConfig, DEFAULT_ARRAY_HEADER_SIZE};
use clap::{Arg, ArgMatches, Command};
use clap::{crate_authors, crate_description, crate_name, crate_version};

fn command() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .author(crate_authors!("\n"))
        .about(crate_description!())
        .arg(
            Arg::new("inputFile")
                .help("binary hprof input file")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new("top")
                .help("only display the top N classes")
                .long("top")
                .short('t')
                .num_args(1)
                .value_parser(clap::value_parser!(usize))
                .required(false),
        )
        .arg(
            Arg::new("arrayHeaderSize")
                .help("bytes of header overhead accounted for each array")
                .long("arrayHeaderSize")
                .num_args(1)
                .default_value("16")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("debug")
                .help("debug info")
                .long("debug")
                .short('d')
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .help("additional JSON output in file")
                .long("json")
                .action(clap::ArgAction::SetTrue),
        )
}

pub fn get_args() -> Result<Args, HprofHistoError> {
    let matches = command().get_matches();
    Args::from_matches(&matches)
}

#[derive(Debug)]
pub struct Args {
    pub file_path: String,
    pub top: Option<usize>,
    pub config: AggregatorConfig,
    pub debug: bool,
    pub json_output: bool,
}

impl Args {
    fn from_matches(matches: &ArgMatches) -> Result<Self, HprofHistoError> {
        // required by clap
        let file_path = matches
            .get_one::<String>("inputFile")
            .map(|f| f.trim().to_string())
            .unwrap_or_default();

        let top = matches.get_one::<usize>("top").copied();
        if top == Some(0) {
            return Err(InvalidTopPositiveInt);
        }

        let array_header_size = matches
            .get_one::<u64>("arrayHeaderSize")
            .copied()
            .unwrap_or(DEFAULT_ARRAY_HEADER_SIZE);

        Ok(Args {
            file_path,
            top,
            config: AggregatorConfig { array_header_size },
            debug: matches.get_flag("debug"),
            json_output: matches.get_flag("json"),
        })
    }
}
