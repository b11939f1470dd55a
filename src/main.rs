use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use serde::Serialize;

use sagebrush::{DEFAULT_MAX_STEPS, LineIndex, Parser, ParserOptions, ScanError, TokenResult};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Document to parse; stdin when omitted
    #[arg(value_name = "FILE")]
    file: Option<String>,

    /// Root expression
    #[arg(short = 'r', long, value_name = "NAME", default_value = "Program")]
    root: String,

    /// Simulation step budget
    #[arg(short = 's', long, value_name = "N", default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Print the token stream instead of the parse tree
    #[arg(short = 't', long)]
    tokens: bool,

    /// Single-line JSON
    #[arg(short = 'c', long)]
    compact: bool,
}

#[derive(Serialize)]
struct ScanOutput {
    tokens: Vec<TokenResult>,
    errors: Vec<ScanError>,
}

fn read_source(file: Option<&str>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path).with_context(|| format!("Failed to read {path}")),
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read stdin")?;
            Ok(source)
        }
    }
}

fn to_json<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    Ok(if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    })
}

fn run(args: Args) -> Result<String> {
    let source = read_source(args.file.as_deref())?;
    let options = ParserOptions {
        root: args.root,
        max_steps: args.max_steps,
    };
    let parser = Parser::with_options(&source, options)?;

    if args.tokens {
        let (tokens, errors) = parser.scan()?;
        let lines = LineIndex::new(parser.content());
        let output = ScanOutput {
            tokens: tokens
                .iter()
                .map(|token| TokenResult::locate(token, &lines))
                .collect(),
            errors,
        };
        return to_json(&output, args.compact);
    }
    to_json(&parser.parse()?, args.compact)
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(output) => println!("{output}"),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(1);
        }
    }
}
