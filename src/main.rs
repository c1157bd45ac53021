//! Entry point for **spacewrangler**.
//!
//! ```text
//! spacewrangler [--fixture <path>] refresh
//! spacewrangler [--fixture <path>] spaces
//! spacewrangler [--fixture <path>] relocate
//! spacewrangler [--fixture <path>] move <space-id> <window-id>...
//! spacewrangler [--fixture <path>] daemon
//! ```
//!
//! One-shot commands run against the window server and print their result
//! as JSON.  `daemon` spawns the Unix-socket [`CommandSource`] on a
//! background thread and processes incoming commands on the main thread.
//!
//! `--fixture` swaps the SkyLight backend for a simulated window server
//! described by a JSON file.

use log::{debug, error, info, warn};
use spacewrangler::command::{parse_command, Command};
use spacewrangler::config::Config;
use spacewrangler::ipc::listener::UnixSocketListener;
use spacewrangler::session::{Response, Session};
use spacewrangler::sim::SimulatedWindowServer;
use spacewrangler::traits::{CommandSource, WindowServer};
use std::path::PathBuf;
use std::sync::mpsc;

const USAGE: &str = "usage: spacewrangler [--fixture <path>] \
                     (refresh | spaces | relocate | move <space-id> <window-id>... | daemon)";

/// Default socket path for the command listener.
fn default_socket_path() -> String {
    let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
    format!("{}/spacewrangler.sock", runtime)
}

/// Resolve the config directory (`$XDG_CONFIG_HOME/spacewrangler`).
fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("spacewrangler")
}

/// Try to load the config from `$XDG_CONFIG_HOME/spacewrangler/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

//  Arguments

enum Invocation {
    Once(Command),
    Daemon,
}

struct Args {
    fixture: Option<PathBuf>,
    invocation: Invocation,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut fixture = None;
    let mut words = Vec::new();
    let mut iter = raw.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--fixture" => {
                let path = iter.next().ok_or("--fixture needs a path")?;
                fixture = Some(PathBuf::from(path));
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            _ => words.push(arg.as_str()),
        }
    }

    let invocation = if words.first().is_some_and(|w| w.eq_ignore_ascii_case("daemon")) {
        if words.len() > 1 {
            return Err("daemon takes no arguments".to_string());
        }
        Invocation::Daemon
    } else {
        Invocation::Once(parse_command(&words).map_err(|e| e.to_string())?)
    };

    Ok(Args {
        fixture,
        invocation,
    })
}

//  Main

fn main() {
    env_logger::init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{}", msg);
            if msg != USAGE {
                eprintln!("{}", USAGE);
            }
            std::process::exit(1);
        }
    };

    let config = load_config();

    let code = match args.fixture {
        Some(path) => match SimulatedWindowServer::load(&path) {
            Ok(server) => {
                info!("using simulated window server from {}", path.display());
                run(server, args.invocation, &config)
            }
            Err(e) => {
                error!("failed to load fixture {}: {}", path.display(), e);
                1
            }
        },
        None => run_native(args.invocation, &config),
    };
    std::process::exit(code);
}

#[cfg(target_os = "macos")]
fn run_native(invocation: Invocation, config: &Config) -> i32 {
    run(
        spacewrangler::skylight::SkyLightServer::new(),
        invocation,
        config,
    )
}

#[cfg(not(target_os = "macos"))]
fn run_native(_invocation: Invocation, _config: &Config) -> i32 {
    error!("no window server on this platform; pass --fixture <path> for a dry run");
    1
}

fn run<W: WindowServer>(server: W, invocation: Invocation, config: &Config) -> i32 {
    let mut session = Session::new(server, config);
    match invocation {
        Invocation::Once(cmd) => run_once(&mut session, cmd),
        Invocation::Daemon => {
            run_daemon(&mut session);
            0
        }
    }
}

/// Execute one command and print its result.
fn run_once<W: WindowServer>(session: &mut Session<W>, cmd: Command) -> i32 {
    let response = match session.handle(cmd) {
        Ok(response) => response,
        Err(e) => {
            error!("{}", e);
            return 1;
        }
    };

    let json = match &response {
        Response::Spaces(directory) => serde_json::to_string_pretty(directory),
        other => serde_json::to_string_pretty(other),
    };
    match json {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            error!("failed to encode result: {}", e);
            1
        }
    }
}

//  Event loop

fn run_daemon<W: WindowServer>(session: &mut Session<W>) {
    if !session.relocator().server().is_accessibility_trusted() {
        warn!("accessibility permission not granted; relocation commands will be refused");
    }

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
    spawn_command_sources(cmd_tx);

    info!("spacewrangler running");
    for cmd in cmd_rx {
        let name = cmd.to_string();
        match session.handle(cmd) {
            Ok(response) => {
                info!("{} done", name);
                debug!("{:?}", response);
            }
            Err(e) => error!("{} failed: {}", name, e),
        }
    }
    info!("all command sources closed, exiting");
}

//  Helpers

fn spawn_command_sources(tx: mpsc::Sender<Command>) {
    {
        let tx = tx.clone();
        let path = default_socket_path();
        std::thread::spawn(move || {
            let mut source = UnixSocketListener::new(&path);
            if let Err(e) = source.run(tx) {
                error!("socket listener error: {}", e);
            }
        });
    }

    drop(tx);
}
