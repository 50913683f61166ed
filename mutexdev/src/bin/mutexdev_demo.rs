//! Device CLI Demo
//!
//! Writes each stdin line to the device, reads it back in small chunks,
//! and shows that a second open is refused while the session is open.

use std::sync::Arc;

use mutexdev::{Device, DeviceConfig, DeviceError, DeviceRegistry, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let registry = DeviceRegistry::new();
    let device = registry.register(&DeviceConfig::default())?;

    let session = device.open()?;
    println!("Enter text (empty line to quit):");

    let stdin = tokio::io::stdin();
    let reader = tokio::io::BufReader::new(stdin);
    let mut lines = tokio::io::AsyncBufReadExt::lines(reader);

    while let Ok(Some(line)) = lines.next_line().await {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }

        let written = session.write(trimmed.as_bytes()).await?;
        println!("(w) {written} bytes");

        session.seek(0);
        read_all(&session).await;
        try_second_open(&device);
    }

    session.close().await;
    registry.unregister(device.name()).await?;
    println!("Device closed");
    Ok(())
}

async fn read_all(session: &Session) {
    let mut buf = [0u8; 4];

    loop {
        match session.read(&mut buf).await {
            Ok(0) => {
                println!("(r) EOF");
                break;
            }
            Ok(n) => {
                #[allow(clippy::indexing_slicing)]
                let data = String::from_utf8_lossy(&buf[..n]);
                println!("(r) {data}");
            }
            Err(e) => {
                eprintln!("(r) Error: {e} (errno={})", e.errno());
                break;
            }
        }
    }
}

fn try_second_open(device: &Arc<Device>) {
    match device.open() {
        Err(DeviceError::Busy) => println!("(intruder) device busy, as expected"),
        Err(e) => eprintln!("(intruder) unexpected error: {e}"),
        Ok(session) => {
            eprintln!("(intruder) second open succeeded: {session:?}");
            drop(session);
        }
    }
}
