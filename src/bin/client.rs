//! `bibfed-client` — sends one query (or loan request, with `-p`) built from
//! `--field=value` pairs to every server in the registry, and prints what
//! each one answers.

use bibfed::client::{self, ServerOutcome};
use bibfed::protocol::{MSG_LOAN, MSG_QUERY};
use bibfed::server::default_bib_conf_path;
use clap::Parser;

/// Queries every federated library server for books matching the given
/// field:value pairs.
#[derive(Parser, Debug)]
#[command(name = "bibfed-client")]
struct Args {
    /// Request a loan on every matching book instead of just listing them.
    #[arg(short = 'p', long = "loan")]
    loan: bool,

    /// One or more `--field=value` pairs, e.g. `--autore=Eco`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    fields: Vec<String>,
}

fn parse_field(raw: &str) -> Option<(String, String)> {
    let rest = raw.strip_prefix("--")?;
    let equal = rest.find('=')?;
    if equal == 0 {
        return None;
    }
    let (field, value) = rest.split_at(equal);
    Some((field.to_string(), value[1..].to_string()))
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    if args.fields.is_empty() {
        eprintln!(
            "bibfed-client requires at least one field:value pair, in the form:\n\
             bibfed-client --field=\"value\" [-p]\n\
             where -p, if present, requests a loan on every book found."
        );
        std::process::exit(1);
    }

    let mut fields = Vec::with_capacity(args.fields.len());
    for raw in &args.fields {
        match parse_field(raw) {
            Some(pair) => fields.push(pair),
            None => {
                eprintln!("every field:value pair must be of the form --field=\"value\": {}", raw);
                std::process::exit(1);
            }
        }
    }

    let request = client::build_request(&fields);
    let message_type = if args.loan { MSG_LOAN } else { MSG_QUERY };

    let bib_conf_path = default_bib_conf_path();
    let results = match client::broadcast(&bib_conf_path, message_type, &request) {
        Ok(results) => results,
        Err(err) => {
            eprintln!("aborting: {}", err);
            std::process::exit(1);
        }
    };

    if results.is_empty() {
        println!("no server found");
        return;
    }

    for (name, outcome) in results {
        println!("\nasking library \"{}\"", name);
        match outcome {
            ServerOutcome::NoMatch => println!("no matching book was found"),
            ServerOutcome::Matched(text) => println!("{}", text),
            ServerOutcome::ServerError(message) => println!("the server reported an error: {}", message),
            ServerOutcome::ConnectionRefused => println!("connection refused"),
        }
    }
}
