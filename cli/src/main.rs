use cli::{parse_command, Command, Shell};
use mutexdev::DeviceConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

fn load_config() -> Result<DeviceConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let bytes = std::fs::read(&path)?;
            let config = DeviceConfig::from_json(&bytes)?;
            info!("loaded device config from {path}");
            Ok(config)
        }
        None => Ok(DeviceConfig::default()),
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("cannot load config: {e}");
            std::process::exit(1);
        }
    };
    let mut shell = match Shell::new(&config) {
        Ok(shell) => shell,
        Err(e) => {
            error!("cannot register device: {e}");
            std::process::exit(1);
        }
    };

    println!("/dev/{} ready, 'help' lists commands", shell.device().name());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("stdin: {e}");
                break;
            }
        };
        let cmd = match parse_command(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(msg) => {
                println!("error: {msg}");
                continue;
            }
        };
        if cmd == Command::Quit {
            break;
        }
        match shell.execute(cmd).await {
            Ok(out) => println!("{out}"),
            Err(msg) => println!("error: {msg}"),
        }
    }

    if let Err(e) = shell.shutdown().await {
        error!("shutdown: {e}");
    }
    info!("Program completed");
}
