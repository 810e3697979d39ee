use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hbnb::{Console, DEFAULT_STORE_FILE, Flow, ObjectStore, derive_store_path};

#[derive(Parser, Debug)]
#[command(name = "hbnb", version, about = "HBNB object store console")]
struct Cli {
    /// JSON file backing the object store
    #[arg(
        short = 'f',
        long = "file",
        env = "HBNB_FILE",
        value_name = "PATH",
        default_value = DEFAULT_STORE_FILE
    )]
    file: String,

    /// Execute a console line and exit instead of reading stdin (repeatable)
    #[arg(short = 'c', long = "command", value_name = "LINE")]
    commands: Vec<String>,

    /// Never print the prompt, even when stdin is a terminal
    #[arg(long = "no-prompt")]
    no_prompt: bool,
}

pub(crate) fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut store = ObjectStore::new(derive_store_path(&cli.file));
    store.reload()?;

    let mut console = Console::new(&mut store);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if !cli.commands.is_empty() {
        for line in &cli.commands {
            match console.execute(line, &mut out) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(err) => eprintln!("error: {err:#}"),
            }
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let interactive = !cli.no_prompt && stdin.is_terminal();
    console.run(stdin.lock(), &mut out, interactive)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
