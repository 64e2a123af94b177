/// scriptmods - Module Loader CLI
use scriptmods::backend::{LoaderConfig, ModuleLoader, RepositorySource, Value};
use scriptmods::repl::{ReplConfig, ScriptHelper};
use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::process;

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tracing::Level;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_usage() {
    eprintln!("scriptmods v{}", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    scriptmods [OPTIONS] <MODULE-ID>");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -h, --help                Print this help message");
    eprintln!("    -V, --version             Print version information");
    eprintln!("    -r, --repository <SRC>    Add a repository (directory, file: or jar:file: URI)");
    eprintln!("    -c, --config <FILE>       Read loader configuration from FILE");
    eprintln!("    --resolve                 Print the module's location instead of loading it");
    eprintln!("    --list                    Print the repository chain");
    eprintln!("    --repl                    Start interactive console");
    eprintln!("    -v, --verbose             Log lookups (repeat for probes)");
    eprintln!();
    eprintln!("ARGUMENTS:");
    eprintln!("    <MODULE-ID>               Module to load, e.g. text/util");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("    scriptmods -r ./modules text/util");
    eprintln!("    scriptmods -r 'jar:file:/opt/geo.jar!/lib' --resolve geo/point");
    eprintln!("    scriptmods --repl");
}

fn print_version() {
    println!("scriptmods {}", VERSION);
}

struct Options {
    module: Option<String>,
    repositories: Vec<String>,
    config: Option<PathBuf>,
    resolve_only: bool,
    list: bool,
    repl_mode: bool,
    verbosity: u8,
}

fn parse_args() -> Result<Options, String> {
    let args: Vec<String> = env::args().collect();

    let mut options = Options {
        module: None,
        repositories: Vec::new(),
        config: None,
        resolve_only: false,
        list: false,
        repl_mode: false,
        verbosity: 0,
    };
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "-V" | "--version" => {
                print_version();
                process::exit(0);
            }
            "-r" | "--repository" => {
                i += 1;
                let repo = args
                    .get(i)
                    .ok_or_else(|| "Missing repository after -r".to_string())?;
                options.repositories.push(repo.clone());
            }
            "-c" | "--config" => {
                i += 1;
                let path = args
                    .get(i)
                    .ok_or_else(|| "Missing configuration file after -c".to_string())?;
                options.config = Some(PathBuf::from(path));
            }
            "--resolve" => options.resolve_only = true,
            "--list" => options.list = true,
            "--repl" => options.repl_mode = true,
            "-v" | "--verbose" => options.verbosity += 1,
            "-vv" => options.verbosity += 2,
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            arg => {
                if options.module.is_some() {
                    return Err("Multiple module ids specified".to_string());
                }
                options.module = Some(arg.to_string());
            }
        }
        i += 1;
    }

    Ok(options)
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Render an error followed by its chain of causes.
fn format_error(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut cause = err.source();
    while let Some(e) = cause {
        message.push_str(&format!("\n  caused by: {}", e));
        cause = e.source();
    }
    message
}

fn build_loader(options: &Options) -> Result<ModuleLoader, String> {
    let config = match &options.config {
        Some(path) => LoaderConfig::load(path),
        None => LoaderConfig::discover(),
    }
    .map_err(|e| format_error(&e))?;

    let loader = ModuleLoader::with_config(config).map_err(|e| format_error(&e))?;
    for repo in &options.repositories {
        loader
            .add_repository(RepositorySource::descriptor(repo.as_str()))
            .map_err(|e| format_error(&e))?;
    }
    Ok(loader)
}

fn run_repl(loader: &ModuleLoader) -> rustyline::Result<()> {
    println!("scriptmods console v{}", VERSION);
    println!("Enter expressions; (require \"id\") loads a module. Type 'exit' or 'quit' to exit.\n");

    let repl_config = ReplConfig::load();
    let editor_config = rustyline::Config::builder()
        .max_history_size(repl_config.max_history)?
        .build();
    let mut rl: Editor<ScriptHelper, DefaultHistory> = Editor::with_config(editor_config)?;
    rl.set_helper(Some(ScriptHelper::new()));

    if let Some(path) = &repl_config.history_path {
        // Missing history on first start
        let _ = rl.load_history(path);
    }

    let mut line_num = 1;
    loop {
        match rl.readline(&format!("sx[{}]> ", line_num)) {
            Ok(line) => {
                let input = line.trim();
                if input == "exit" || input == "quit" {
                    println!("Goodbye!");
                    break;
                }
                if input.is_empty() {
                    continue;
                }
                rl.add_history_entry(input)?;
                if let Some(helper) = rl.helper_mut() {
                    helper.add_to_history(input.to_string());
                    helper.record_definitions(input);
                }

                match loader.evaluate_console(input) {
                    Ok(Value::Nil) => {}
                    Ok(value) => println!("{}", value),
                    Err(e) => eprintln!("Error: {}", format_error(&e)),
                }
                line_num += 1;
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e),
        }
    }

    if let Some(path) = &repl_config.history_path {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        rl.save_history(path)?;
    }
    Ok(())
}

fn main() {
    let options = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            process::exit(1);
        }
    };

    init_logging(options.verbosity);

    let loader = match build_loader(&options) {
        Ok(loader) => loader,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if options.list {
        for (index, uri) in loader.repositories().iter().enumerate() {
            println!("{:>3}  {}", index, uri);
        }
        if options.module.is_none() && !options.repl_mode {
            return;
        }
    }

    if options.repl_mode {
        if let Err(e) = run_repl(&loader) {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
        return;
    }

    let Some(module) = options.module.as_deref() else {
        eprintln!("Error: Missing module id");
        eprintln!();
        print_usage();
        process::exit(1);
    };

    if options.resolve_only {
        match loader.resolve(module) {
            Some(resource) => println!("{}", resource.uri()),
            None => {
                eprintln!("Error: Module '{}' not found", module.trim());
                process::exit(1);
            }
        }
        return;
    }

    match loader.load(module) {
        Ok(exports) => println!("{}", exports),
        Err(e) => {
            eprintln!("Error: {}", format_error(&e));
            process::exit(1);
        }
    }
}
