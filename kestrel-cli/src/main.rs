use std::env;
use std::fs;
use std::io::{self, Read, Write};

use clap::{App, AppSettings, Arg};
use env_logger::{fmt, Builder, Target};
use log::{error, info};
use log::{Level, LevelFilter, Record};

use anyhow::{anyhow, Error};

use kestrel::config::SolverConfig;
use kestrel::{ProofFormat, Solver};
use kestrel_dimacs::Strictness;

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{}", err);
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stdout)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("KESTREL_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn banner() {
    info!("This is kestrel {}", env!("CARGO_PKG_VERSION"));
}

fn main_with_err() -> Result<i32, Error> {
    let matches = App::new("kestrel")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::DisableHelpSubcommand)
        .arg_from_usage("[INPUT] 'The input file to use (stdin if omitted)'")
        .arg(
            Arg::from_usage("[option] -O --option")
                .value_name("OPTION>=<VALUE")
                .help("Set a single solver option, see 'kestrel -O help' for a list of options.")
                .multiple(true)
                .number_of_values(1),
        )
        .arg_from_usage("[proof-file] --proof=[FILE] 'Write a DRAT proof to the specified file'")
        .arg(
            Arg::from_usage(
                "[proof-format] --proof-format=[FORMAT] 'Specify the proof format to use.'",
            )
            .possible_values(&["drat", "binary-drat"])
            .default_value("drat")
            .case_insensitive(true),
        )
        .arg_from_usage(
            "--self-check 'Enable self checking by verifying all derived clauses on the fly'",
        )
        .arg_from_usage("--relaxed 'Parse the input leniently, ignoring header mismatches'")
        .arg_from_usage("--pedantic 'Parse the input pedantically'")
        .get_matches();

    let options: Vec<String> = matches
        .values_of("option")
        .map(|values| values.map(str::to_owned).collect())
        .unwrap_or_default();

    if options.iter().any(|option| option == "help") {
        print!("{}", SolverConfig::help());
        return Ok(0);
    }

    init_logging();
    banner();

    let mut solver = Solver::new();

    for option in options {
        let mut split = option.splitn(2, '=');
        let name = split.next().unwrap();
        let value = split
            .next()
            .ok_or_else(|| anyhow!("expected '{}=<value>'", name))?;
        let value: i64 = value
            .parse()
            .map_err(|_| anyhow!("option '{}' expects an integer value", name))?;
        solver.set_option(name, value)?;
    }

    let strictness = if matches.is_present("pedantic") {
        Strictness::Pedantic
    } else if matches.is_present("relaxed") {
        Strictness::Relaxed
    } else {
        Strictness::Normal
    };

    if let Some(path) = matches.value_of("proof-file") {
        let proof_format = match &matches
            .value_of("proof-format")
            .unwrap()
            .to_ascii_lowercase()[..]
        {
            "drat" => ProofFormat::Drat,
            "binary-drat" => ProofFormat::BinaryDrat,
            _ => unreachable!(),
        };

        info!("writing proof to file '{}'", path);

        solver.write_proof(fs::File::create(path)?, proof_format);
    }

    if matches.is_present("self-check") {
        solver.enable_self_checking();
    }

    let stdin = io::stdin();

    let mut locked_stdin;
    let mut opened_file;

    let file = match matches.value_of("INPUT") {
        Some(path) => {
            info!("reading file '{}'", path);
            opened_file = fs::File::open(path)?;
            &mut opened_file as &mut dyn Read
        }
        None => {
            info!("reading from stdin");
            locked_stdin = stdin.lock();
            &mut locked_stdin as &mut dyn Read
        }
    };

    solver.add_dimacs_cnf_with_strictness(file, strictness)?;

    let result = solver.solve();

    solver.close_proof();

    match result {
        Some(true) => {
            println!("s SATISFIABLE");
            print!("v");
            for lit in solver.model().unwrap() {
                print!(" {}", lit);
            }
            println!(" 0");
            Ok(10)
        }
        Some(false) => {
            println!("s UNSATISFIABLE");
            Ok(20)
        }
        None => {
            println!("s UNKNOWN");
            Ok(0)
        }
    }
}
