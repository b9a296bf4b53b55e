//! Arbor CLI - Command-line access to a remote tree store

use arbor_client::{stream, Mirror, RemoteClient, StreamEvent};
use arbor_core::Config;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Mirror and mutate a remote JSON tree", long_about = None)]
struct Cli {
    /// Base URL of the tree store
    #[arg(long, global = true, env = "ARBOR_BASE_URL")]
    base_url: Option<String>,

    /// Auth credential appended to every request
    #[arg(long, global = true, env = "ARBOR_AUTH")]
    auth: Option<String>,

    /// Config file (TOML); flags override its values
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Compact JSON output (watch prints raw events instead of the mirror)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check connectivity to the store
    Probe,

    /// Read the value at a location
    Get {
        /// Location name, e.g. "experiments/e1"
        name: String,
    },

    /// Replace the value at a location
    Put {
        name: String,
        /// New value as JSON (null deletes)
        data: String,
    },

    /// Shallow-merge an object into a location
    Patch {
        name: String,
        /// Entries to merge, as a JSON object
        data: String,
    },

    /// Append a value under a store-generated child key
    Post {
        name: String,
        /// Value as JSON
        data: String,
    },

    /// Delete the value at a location
    Remove { name: String },

    /// Subscribe to a location and mirror it live
    Watch { name: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(2);
        }
    };

    let result = match &cli.command {
        Commands::Probe => cmd_probe(&config),
        Commands::Get { name } => cmd_get(&config, name, cli.json),
        Commands::Put { name, data } => cmd_put(&config, name, data, cli.json),
        Commands::Patch { name, data } => cmd_patch(&config, name, data, cli.json),
        Commands::Post { name, data } => cmd_post(&config, name, data, cli.json),
        Commands::Remove { name } => cmd_remove(&config, name),
        Commands::Watch { name } => cmd_watch(&config, name, cli.json),
    };

    match result {
        Ok(true) => {}
        // Dropped operation (failure detail went to the log)
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(2);
        }
    }
}

fn load_config(cli: &Cli) -> arbor_core::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.remote.base_url = base_url.clone();
    }
    if let Some(auth) = &cli.auth {
        config.remote.auth = auth.clone();
    }
    Ok(config)
}

fn print_value(value: &Value, json: bool) -> arbor_core::Result<()> {
    if json {
        println!("{value}");
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

fn cmd_probe(config: &Config) -> arbor_core::Result<bool> {
    let client = RemoteClient::new(config.remote.clone())?;
    let up = client.test();
    println!("{}", if up { "ok" } else { "unreachable" });
    Ok(up)
}

fn cmd_get(config: &Config, name: &str, json: bool) -> arbor_core::Result<bool> {
    let client = RemoteClient::new(config.remote.clone())?;
    match client.get(name) {
        Some(value) => {
            print_value(&value, json)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn cmd_put(config: &Config, name: &str, data: &str, json: bool) -> arbor_core::Result<bool> {
    let data: Value = serde_json::from_str(data)?;
    let client = RemoteClient::new(config.remote.clone())?;
    match client.put(name, &data) {
        Some(stored) => {
            print_value(&stored, json)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn cmd_patch(config: &Config, name: &str, data: &str, json: bool) -> arbor_core::Result<bool> {
    let data: Value = serde_json::from_str(data)?;
    let client = RemoteClient::new(config.remote.clone())?;
    match client.patch(name, &data) {
        Some(merged) => {
            print_value(&merged, json)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn cmd_post(config: &Config, name: &str, data: &str, json: bool) -> arbor_core::Result<bool> {
    let data: Value = serde_json::from_str(data)?;
    let client = RemoteClient::new(config.remote.clone())?;
    match client.post(name, &data) {
        Some(created) => {
            print_value(&created, json)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

fn cmd_remove(config: &Config, name: &str) -> arbor_core::Result<bool> {
    let client = RemoteClient::new(config.remote.clone())?;
    Ok(client.remove(name).is_some())
}

fn cmd_watch(config: &Config, name: &str, json: bool) -> arbor_core::Result<bool> {
    let subscription = stream::subscribe(config, name);
    let mut mirror = Mirror::new();

    for event in subscription.events().iter() {
        if json {
            let line = match &event {
                StreamEvent::Put { path, data } => {
                    json!({"event": "put", "path": path, "data": data})
                }
                StreamEvent::Patch { path, data } => {
                    json!({"event": "patch", "path": path, "data": data})
                }
                StreamEvent::Error => json!({"event": "error"}),
            };
            println!("{line}");
        }
        match &event {
            StreamEvent::Error => {
                eprintln!("stream error, exiting");
                return Ok(false);
            }
            event => {
                mirror.apply(event)?;
                if !json {
                    println!("{}", serde_json::to_string_pretty(&mirror.snapshot())?);
                }
            }
        }
    }
    Ok(true)
}
