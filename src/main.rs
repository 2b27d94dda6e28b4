use clap::Parser;
use clap::Subcommand;
use expression_compiler::{Expression, Lexer};
use log::{LevelFilter, Log, Metadata, Record, info};
use miette::{NamedSource, Report, WrapErr, miette};

#[derive(Parser, Debug)]
#[command(version, about = "Compile and evaluate arithmetic expressions")]
struct Args {
    /// More output on stderr; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the token stream
    Tokenize { expression: String },
    /// Print the compiled tree
    Parse {
        expression: String,
        /// Declare a variable
        #[arg(long = "var", value_name = "NAME")]
        vars: Vec<String>,
        #[arg(long)]
        optimize: bool,
    },
    /// Evaluate once
    Eval {
        expression: String,
        /// Declare a variable and its value
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_binding)]
        vars: Vec<(String, f64)>,
        #[arg(long)]
        optimize: bool,
    },
    /// Compile once, then evaluate over an evenly spaced range of one variable
    Sweep {
        expression: String,
        /// The variable being swept
        #[arg(long)]
        over: String,
        #[arg(long, allow_hyphen_values = true)]
        from: f64,
        #[arg(long, allow_hyphen_values = true)]
        to: f64,
        #[arg(long, default_value_t = 10)]
        steps: usize,
        #[arg(long)]
        optimize: bool,
    },
}

fn parse_binding(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|e| format!("bad value for `{name}`: {e}"))?;
    Ok((name.trim().to_string(), value))
}

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn compile(expression: &str, names: &[&str], optimize: bool) -> miette::Result<Expression> {
    let with_source = |e: expression_compiler::Error| {
        Report::new(e).with_source_code(NamedSource::new("<expression>", expression.to_string()))
    };
    let mut compiled = Expression::compile(expression, names).map_err(with_source)?;
    if optimize {
        compiled
            .optimize()
            .map_err(|e| with_source(e.into()))
            .wrap_err("constant folding failed")?;
    }
    Ok(compiled)
}

fn main() -> miette::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::Tokenize { expression } => {
            for token in Lexer::new(&expression) {
                let token = token.map_err(|e| {
                    Report::new(e)
                        .with_source_code(NamedSource::new("<expression>", expression.clone()))
                })?;
                println!("{token}");
            }
            println!("EOF  null");
        }
        Commands::Parse {
            expression,
            vars,
            optimize,
        } => {
            let names = vars.iter().map(String::as_str).collect::<Vec<_>>();
            let compiled = compile(&expression, &names, optimize)?;
            println!("{compiled}");
        }
        Commands::Eval {
            expression,
            vars,
            optimize,
        } => {
            let names = vars.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>();
            let values = vars.iter().map(|(_, value)| *value).collect::<Vec<_>>();
            let mut compiled = compile(&expression, &names, optimize)?;
            let result = compiled.evaluate(&values).map_err(Report::new)?;
            println!("{result}");
        }
        Commands::Sweep {
            expression,
            over,
            from,
            to,
            steps,
            optimize,
        } => {
            if steps == 0 {
                return Err(miette!("--steps must be at least 1"));
            }
            let mut compiled = compile(&expression, &[over.as_str()], optimize)?;
            info!("sweeping `{over}` from {from} to {to} in {steps} step(s)");

            let width = if steps == 1 { 0.0 } else { (to - from) / (steps - 1) as f64 };
            for i in 0..steps {
                let x = from + width * i as f64;
                let result = compiled
                    .evaluate(&[x])
                    .map_err(Report::new)
                    .wrap_err_with(|| format!("evaluating at {over} = {x}"))?;
                println!("{x}\t{result}");
            }
        }
    }
    Ok(())
}
