use clap::{Parser, Subcommand};
use log::{debug, error, LevelFilter};
use simple_logger::SimpleLogger;
use std::env::current_dir;
use std::path::PathBuf;
use std::process::exit;
use typedkv::*;

#[derive(Parser, Debug)]
#[command(name = "kvctl", version, about = "Inspect and edit a typedkv sled database")]
struct Opt {
    #[arg(long, global = true, help = "Database directory (defaults to the current directory)")]
    path: Option<PathBuf>,
    #[arg(long, global = true, value_enum, help = "Value codec")]
    codec: Option<CodecKind>,
    #[arg(long, global = true, help = "Keep every key under this namespace")]
    namespace: Option<String>,
    #[arg(long, short, global = true, help = "Log debug output to stderr")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Print the value of a key")]
    Get {
        #[arg(id = "KEY")]
        key: String,
    },
    #[command(about = "Set the value of a key")]
    Set {
        #[arg(id = "KEY")]
        key: String,
        #[arg(id = "VALUE")]
        value: String,
    },
    #[command(name = "rm", about = "Remove a key")]
    Remove {
        #[arg(id = "KEY")]
        key: String,
    },
    #[command(about = "Append a suffix to the value of an existing key")]
    Append {
        #[arg(id = "KEY")]
        key: String,
        #[arg(id = "SUFFIX")]
        suffix: String,
    },
    #[command(name = "ls", about = "List keys and values")]
    List {
        #[arg(long, help = "Only keys starting with this prefix")]
        prefix: Option<String>,
    },
}

fn main() {
    let opt = Opt::parse();
    let level = if opt.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("{}", e);
    }
    if let Err(e) = run(opt) {
        error!("{}", e);
        exit(1);
    }
}

fn run(opt: Opt) -> Result<()> {
    let mut config = Config::from_env()?.with_backend(BackendKind::sled);
    config.path = match opt.path {
        Some(path) => path,
        None => current_dir()?,
    };
    if let Some(codec) = opt.codec {
        config.codec = codec;
    }
    debug!("opening {} with {:?} codec", config.path.display(), config.codec);

    let base = open::<String, String>(&config)?;
    let ctx = Context::background();
    let res = match &opt.namespace {
        Some(ns) => execute(&Prefix::new(&base, ns)?, &ctx, opt.command),
        None => execute(&base, &ctx, opt.command),
    };
    base.close(&ctx)?;
    res
}

fn execute<S: Store<String, String>>(store: &S, ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Get { key } => match store.get(ctx, &key) {
            Ok(value) => println!("{}", value),
            Err(Error::KeyNotFound) => println!("Key not found"),
            Err(e) => return Err(e),
        },
        Command::Set { key, value } => store.set(ctx, &key, &value)?,
        Command::Remove { key } => store.delete(ctx, &key)?,
        Command::Append { key, suffix } => {
            match store.edit(ctx, &key, &mut |v: String| Ok(v + &suffix)) {
                Err(Error::KeyNotFound) => println!("Key not found"),
                res => res?,
            }
        }
        Command::List { prefix } => {
            let mut print = |k: String, v: String| {
                println!("{}\t{}", k, v);
                Ok::<(), Error>(())
            };
            match prefix {
                Some(p) => store.range_with_prefix(ctx, &p, &mut print)?,
                None => store.range(ctx, &mut print)?,
            }
        }
    }
    Ok(())
}
