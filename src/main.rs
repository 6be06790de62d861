use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::Arc,
    thread,
};

use aincrad::{
    Binding, Client, ClientEvent, Config, MAX_BODY_LENGTH, Operate, Processor, Role, Server,
    Stdout, register_processor, registration,
};
use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "aincrad")]
#[command(version)]
#[command(about = "Peer-addressable remote command hub")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = ".config")]
    config: PathBuf,

    /// Overrides `[basic] role`
    #[arg(long, value_enum)]
    role: Option<Role>,

    /// Overrides `[server] addr`
    #[arg(long)]
    server: Option<String>,

    /// Name to register under instead of the machine's hostname
    #[arg(long)]
    hostname: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    let role = args.role.unwrap_or(config.basic.role);
    let hostname = match args.hostname.clone() {
        Some(hostname) => hostname,
        None => hostname::get()
            .context("failed to read the machine hostname")?
            .to_string_lossy()
            .into_owned(),
    };

    let operate = Arc::new(Operate::new(config.settings(), Arc::new(Stdout))?);
    log::info!("starting as {role:?} ({hostname})");

    match role {
        Role::Server => run_server(hostname, operate, &config).await,
        Role::Client => run_client(hostname, operate, &config, &args, false).await,
        Role::Terminal => run_client(hostname, operate, &config, &args, true).await,
    }
}

async fn run_server(hostname: String, operate: Arc<Operate>, config: &Config) -> Result<()> {
    let server = Server::new(hostname);
    register_processor(operate, Some(&server), None)?;

    server.start(("0.0.0.0", config.server.port)).await?;

    tokio::signal::ctrl_c().await?;
    log::info!("[Server] shutting down");
    server.shutdown();
    Ok(())
}

async fn run_client(
    hostname: String,
    operate: Arc<Operate>,
    config: &Config,
    args: &Args,
    interactive: bool,
) -> Result<()> {
    let client = Client::new(hostname);
    let processor = register_processor(operate, None, Some(&client))?;
    client.on(ClientEvent::Connect, |_, client| {
        if let Err(e) = client.send(registration(&client.hostname())) {
            log::warn!("[Client] registration dropped: {e}");
        }
    });

    let addr = args.server.as_deref().unwrap_or(&config.server.addr);
    client
        .connect((addr, config.server.port))
        .await
        .with_context(|| format!("failed to connect to {addr}:{}", config.server.port))?;

    if interactive {
        spawn_terminal(processor, client.clone())?;
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = client.closed() => {}
    }
    client.close();
    Ok(())
}

// Feeds stdin lines to the interpreter bound to `client`. EOF closes the
// client.
fn spawn_terminal(processor: Processor, client: Client) -> Result<()> {
    thread::Builder::new()
        .name("terminal".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::warn!("stdin: {e}");
                        break;
                    }
                };
                let line = clamp(&line);
                if line.is_empty() {
                    continue;
                }
                if processor
                    .submit_line(line, Binding::peer(client.clone()))
                    .is_err()
                {
                    break;
                }
            }
            client.close();
        })?;
    Ok(())
}

// Longest prefix that fits in one package.
fn clamp(line: &str) -> &str {
    let mut end = line.len().min(MAX_BODY_LENGTH);
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
