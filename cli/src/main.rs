//! spacerpc CLI — invoke Space inference endpoints from the terminal.
//!
//! Usage:
//! ```bash
//! # Resolve the replica a Space would be routed to
//! spacerpc resolve --space owner/repo
//!
//! # Submit input and wait for the result
//! spacerpc predict --space owner/repo --endpoint /infer --data '["a cat", 0]'
//!
//! # Download a file produced by a job
//! spacerpc download --space owner/repo --path /tmp/out.png --out out.png
//! ```

use std::env;
use std::process;

use serde_json::Value;
use spacerpc_core::space::SpaceId;
use spacerpc_http::{resolver_for, SpaceClient, SpaceClientConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "resolve" => cmd_resolve(&args[2..]).await,
        "predict" => cmd_predict(&args[2..]).await,
        "download" => cmd_download(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("spacerpc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("spacerpc {}", env!("CARGO_PKG_VERSION"));
    println!("Invoke Space inference endpoints from the terminal\n");
    println!("USAGE:");
    println!("    spacerpc <COMMAND>\n");
    println!("COMMANDS:");
    println!("    resolve    Resolve the replica a Space is routed to");
    println!("    predict    Submit input to an endpoint and print the result");
    println!("    download   Download a file served by a Space");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("COMMON FLAGS:");
    println!("    --space <owner/repo>     Space identifier  [required]");
    println!("PREDICT FLAGS:");
    println!("    --endpoint </path>       Endpoint path  [required]");
    println!("    --data <json-array>      Input payload  [required]");
    println!("DOWNLOAD FLAGS:");
    println!("    --path <remote-path>     File path on the Space  [required]");
    println!("    --out <local-path>       Where to write the file  [required]");
}

async fn cmd_resolve(args: &[String]) -> Result<(), String> {
    let space = parse_flag(args, "--space").ok_or("--space is required")?;
    let id: SpaceId = space.parse().map_err(|e| format!("{e}"))?;

    let config = SpaceClientConfig::default();
    let resolver = resolver_for(&config);
    match resolver
        .resolve(&id.owner, &id.resource, &Default::default())
        .await
    {
        Some(replica) => println!("{replica}"),
        None => {
            println!("(no replica resolved — calls fall back to the load balancer)");
        }
    }
    Ok(())
}

async fn cmd_predict(args: &[String]) -> Result<(), String> {
    let space = parse_flag(args, "--space").ok_or("--space is required")?;
    let endpoint = parse_flag(args, "--endpoint").ok_or("--endpoint is required")?;
    let data = parse_flag(args, "--data").ok_or("--data is required")?;

    let data: Vec<Value> =
        serde_json::from_str(&data).map_err(|e| format!("--data must be a JSON array: {e}"))?;

    let client = SpaceClient::connect(&space).await.map_err(|e| e.to_string())?;
    println!("Host: {}", client.host());

    let result: Value = client
        .predict(&endpoint, data)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
    Ok(())
}

async fn cmd_download(args: &[String]) -> Result<(), String> {
    let space = parse_flag(args, "--space").ok_or("--space is required")?;
    let path = parse_flag(args, "--path").ok_or("--path is required")?;
    let out = parse_flag(args, "--out").ok_or("--out is required")?;

    let client = SpaceClient::connect(&space).await.map_err(|e| e.to_string())?;
    let response = client.download(&path).await.map_err(|e| e.to_string())?;
    if !response.status().is_success() {
        return Err(format!("download failed: HTTP {}", response.status()));
    }
    let bytes = response.bytes().await.map_err(|e| e.to_string())?;
    std::fs::write(&out, &bytes).map_err(|e| e.to_string())?;
    println!("Wrote {} bytes to {out}", bytes.len());
    Ok(())
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
