use std::env;
use std::io::{self, Read};
use std::process;

use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_target(false)
    .with_writer(io::stderr)
    .init();
}

fn read_source(arg: &str) -> io::Result<String> {
  if arg != "-" {
    return Ok(arg.to_owned());
  }
  let mut source = String::new();
  io::stdin().read_to_string(&mut source)?;
  Ok(source)
}

fn main() {
  init_tracing();

  let args: Vec<String> = env::args().collect();
  if args.len() != 2 {
    let program = args.first().map(String::as_str).unwrap_or("tacc");
    eprintln!("usage: {program} <program | ->");
    process::exit(1);
  }

  let source = match read_source(&args[1]) {
    Ok(source) => source,
    Err(err) => {
      error!(error = %err, "failed to read program from stdin");
      eprintln!("{program}: {err}", program = args[0]);
      process::exit(1);
    }
  };
  debug!(bytes = source.len(), "compiling");

  match tacc::compile(&source) {
    // An empty program prints nothing rather than a blank line.
    Ok(listing) if listing.is_empty() => {}
    Ok(listing) => println!("{listing}"),
    Err(err) => {
      eprintln!("{}", err.render(&source));
      process::exit(1);
    }
  }
}
