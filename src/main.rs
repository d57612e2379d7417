use std::error::Error;
use std::io::{self, BufRead, Write};
use std::process;

use clap::{App, Arg, ArgMatches};
use log::{error, info};
use prettytable::format::consts::FORMAT_CLEAN;
use prettytable::{Cell, Row, Table};
use separator::Separatable;

use hospital_planner::action::{Action, Plan};
use hospital_planner::actor::Actor;
use hospital_planner::config::Config;
use hospital_planner::fs;
use hospital_planner::planner::replay;
use hospital_planner::problem::Problem;
use hospital_planner::{LoadLevel, Solve};

const CLIENT_NAME: &str = "hospital-planner";

fn main() {
    env_logger::init();

    let matches = App::new("hospital-planner")
        .author("martin-t")
        .version("0.1")
        .about("Plans joint actions for agents and boxes in hospital levels")
        .arg(
            Arg::with_name("client")
                .long("client")
                .help("Talk to a server on stdin/stdout - read the level, send rows, wait for replies"),
        )
        .arg(
            Arg::with_name("memory")
                .long("memory")
                .takes_value(true)
                .value_name("MB")
                .help("Memory ceiling for searches"),
        )
        .arg(
            Arg::with_name("radius")
                .long("radius")
                .takes_value(true)
                .help("Cells farther than this from a conflict are walled off while searching"),
        )
        .arg(
            Arg::with_name("patience")
                .long("patience")
                .takes_value(true)
                .help("Steps to wait for a moving agent before planning around it"),
        )
        .arg(
            Arg::with_name("max-cycles")
                .long("max-cycles")
                .takes_value(true)
                .help("Give up after this many steps"),
        )
        .arg(
            Arg::with_name("verify")
                .long("verify")
                .help("Replay the plan and check it solves the level"),
        )
        .arg(
            Arg::with_name("stats")
                .long("stats")
                .help("Print search statistics and a per-agent summary"),
        )
        .arg(Arg::with_name("FILE").help("Level file, stdin if missing"))
        .get_matches();

    let config = parse_config(&matches).unwrap_or_else(|err| {
        eprintln!("{}", err);
        process::exit(2);
    });

    if matches.is_present("client") {
        if let Err(err) = run_client(config) {
            error!("{}", err);
            eprintln!("{}", err);
            process::exit(1);
        }
        return;
    }

    let problem = load(matches.value_of("FILE")).unwrap_or_else(|err| {
        eprintln!("Can't load level: {}", err);
        process::exit(1);
    });
    info!("Loaded {} ({})", problem.name(), problem.strategy());

    let planner_ok = problem.solve(config).unwrap_or_else(|err| {
        eprintln!("Unsolved: {}", err);
        process::exit(1);
    });
    print!("{}", planner_ok.plan);

    if matches.is_present("stats") {
        println!();
        println!("{:?}", planner_ok);
        print!("{}", summary(&problem, &planner_ok.plan));
    }
    if matches.is_present("verify") {
        if let Err(err) = verify(&problem, &planner_ok.plan) {
            eprintln!("{}", err);
            process::exit(1);
        }
        println!("Verified");
    }
}

fn parse_config(matches: &ArgMatches<'_>) -> Result<Config, Box<dyn Error>> {
    let mut config = Config::default();
    if let Some(memory) = matches.value_of("memory") {
        config.memory_ceiling_mb = memory.parse()?;
    }
    if let Some(radius) = matches.value_of("radius") {
        config.narrowing_radius = radius.parse()?;
    }
    if let Some(patience) = matches.value_of("patience") {
        config.patience = patience.parse()?;
    }
    if let Some(max_cycles) = matches.value_of("max-cycles") {
        config.max_cycles = max_cycles.parse()?;
    }
    Ok(config)
}

fn load(path: Option<&str>) -> Result<Problem, Box<dyn Error>> {
    match path {
        Some(path) => path.load_level(),
        None => Ok(fs::read_stdin()?.parse::<Problem>()?),
    }
}

fn verify(problem: &Problem, plan: &Plan) -> Result<(), String> {
    let end = replay(problem, plan).map_err(|row| format!("Row {} is illegal", row))?;
    if !problem.is_solved(&end) {
        return Err(format!(
            "Plan doesn't solve the level, ends in:\n{}",
            problem.formatter(Some(&end))
        ));
    }
    Ok(())
}

/// Sends the name, reads the level, sends one row at a time waiting for a reply after each.
fn run_client(config: Config) -> Result<(), Box<dyn Error>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut output = stdout.lock();

    writeln!(output, "{}", CLIENT_NAME)?;
    output.flush()?;

    let problem: Problem = fs::read_level(&mut input)?.parse()?;
    info!("Planning {}", problem.name());
    let planner_ok = problem.solve(config)?;
    info!(
        "Found plan of length {} in {} cycles",
        planner_ok.plan.len(),
        planner_ok.cycles.separated_string()
    );

    let mut reply = String::new();
    for row in &planner_ok.plan {
        writeln!(output, "{}", Plan::row_to_string(row))?;
        output.flush()?;
        reply.clear();
        if input.read_line(&mut reply)? == 0 {
            return Err("Server closed the connection".into());
        }
    }
    Ok(())
}

fn summary(problem: &Problem, plan: &Plan) -> Table {
    let mut table = Table::new();
    table.set_format(*FORMAT_CLEAN);
    table.set_titles(Row::new(
        ["Agent", "Color", "Moves", "Pushes", "Pulls", "Waits"]
            .iter()
            .map(|title| Cell::new(title))
            .collect(),
    ));
    for (i, agent) in problem.agents().iter().enumerate() {
        let column = plan.column(i);
        let count = |pred: fn(&Action) -> bool| column.iter().filter(|a| pred(a)).count();
        let moves = count(|a| match a {
            Action::Move(_) => true,
            _ => false,
        });
        let pushes = count(|a| match a {
            Action::Push(..) => true,
            _ => false,
        });
        let pulls = count(|a| match a {
            Action::Pull(..) => true,
            _ => false,
        });
        let waits = count(|a| a.is_noop());
        table.add_row(Row::new(vec![
            Cell::new(&agent.id().to_string()),
            Cell::new(&agent.color().to_string()),
            Cell::new(&moves.to_string()),
            Cell::new(&pushes.to_string()),
            Cell::new(&pulls.to_string()),
            Cell::new(&waits.to_string()),
        ]));
    }
    table
}
