//! Interactive shell state: one device, numbered session slots

use std::sync::Arc;

use mutexdev::{Device, DeviceConfig, DeviceRegistry, RegistryError, Session};
use tracing::{debug, info, warn};

use crate::command::{Command, Slot, HELP};

pub struct Shell {
    registry: DeviceRegistry,
    device: Arc<Device>,
    sessions: Vec<Option<Session>>,
}

impl Shell {
    /// Register a device from `config` and start with no sessions
    ///
    /// # Errors
    /// Whatever the registry rejects the configuration with.
    pub fn new(config: &DeviceConfig) -> Result<Self, RegistryError> {
        let registry = DeviceRegistry::new();
        let device = registry.register(config)?;
        Ok(Self {
            registry,
            device,
            sessions: Vec::new(),
        })
    }

    #[must_use]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Run one command and return the text to print
    ///
    /// `Quit` is not handled here, see [`Shell::shutdown`].
    ///
    /// # Errors
    /// A message to print; the shell keeps going.
    pub async fn execute(&mut self, cmd: Command) -> Result<String, String> {
        debug!(?cmd, "executing");
        match cmd {
            Command::Open => {
                let session = self
                    .device
                    .open()
                    .map_err(|e| format!("open: {e} (errno {})", e.errno()))?;
                let handle = session.handle();
                let slot = self.store(session);
                Ok(format!("session {slot} opened ({handle})"))
            }
            Command::Close(slot) => {
                let session = self.take(slot)?;
                session.close().await;
                Ok(format!("session {slot} closed"))
            }
            Command::Write(slot, text) => {
                let session = self.session(slot)?;
                let n = session
                    .write(text.as_bytes())
                    .await
                    .map_err(|e| format!("write: {e} (errno {})", e.errno()))?;
                Ok(format!("wrote {n} bytes"))
            }
            Command::Read(slot, n) => {
                let session = self.session(slot)?;
                let data = session
                    .read_vec(n)
                    .await
                    .map_err(|e| format!("read: {e} (errno {})", e.errno()))?;
                if data.is_empty() {
                    Ok("EOF".to_string())
                } else {
                    Ok(format!(
                        "read {} bytes: {:?}",
                        data.len(),
                        String::from_utf8_lossy(&data)
                    ))
                }
            }
            Command::Seek(slot, pos) => {
                self.session(slot)?.seek(pos);
                Ok(format!("session {slot} at {pos}"))
            }
            Command::Signal(slot) => {
                if self.session(slot)?.interrupter().interrupt() {
                    Ok(format!("session {slot} signalled"))
                } else {
                    Err(format!("session {slot} is not accepting signals"))
                }
            }
            Command::Status => {
                let s = self.device.snapshot().await;
                Ok(format!(
                    "/dev/{} ({}): open {} len {}/{} registered {} payload {:?}",
                    self.device.name(),
                    self.device.number(),
                    s.open_count,
                    s.valid_len,
                    s.capacity,
                    s.registered,
                    String::from_utf8_lossy(&s.payload)
                ))
            }
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok(String::new()),
        }
    }

    /// Close every open session and unregister the device
    ///
    /// # Errors
    /// Whatever the registry reports on unregister.
    pub async fn shutdown(mut self) -> Result<(), RegistryError> {
        for (slot, session) in self.sessions.drain(..).enumerate() {
            if let Some(session) = session {
                info!(slot, "closing session left open");
                session.close().await;
            }
        }
        self.registry.unregister(self.device.name()).await
    }

    fn store(&mut self, session: Session) -> Slot {
        if let Some(slot) = self.sessions.iter().position(Option::is_none) {
            self.sessions[slot] = Some(session);
            return slot;
        }
        self.sessions.push(Some(session));
        self.sessions.len() - 1
    }

    fn session(&self, slot: Slot) -> Result<&Session, String> {
        self.sessions
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                warn!(slot, "no such session");
                format!("no session in slot {slot}")
            })
    }

    fn take(&mut self, slot: Slot) -> Result<Session, String> {
        self.sessions
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or_else(|| format!("no session in slot {slot}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parse_command;

    async fn run(shell: &mut Shell, line: &str) -> Result<String, String> {
        let cmd = parse_command(line)?.expect("command");
        shell.execute(cmd).await
    }

    #[tokio::test]
    async fn test_session_walkthrough() {
        let mut shell = Shell::new(&DeviceConfig::default()).unwrap();

        assert!(run(&mut shell, "open").await.unwrap().starts_with("session 0 opened"));
        let err = run(&mut shell, "open").await.unwrap_err();
        assert!(err.contains("errno 16"), "{err}");

        assert_eq!(run(&mut shell, "write 0 hello").await.unwrap(), "wrote 5 bytes");
        assert_eq!(
            run(&mut shell, "read 0 10").await.unwrap(),
            "read 5 bytes: \"hello\""
        );
        assert_eq!(run(&mut shell, "read 0 10").await.unwrap(), "EOF");
        run(&mut shell, "seek 0 1").await.unwrap();
        assert_eq!(
            run(&mut shell, "read 0 2").await.unwrap(),
            "read 2 bytes: \"el\""
        );

        assert_eq!(run(&mut shell, "close 0").await.unwrap(), "session 0 closed");
        assert!(run(&mut shell, "close 0").await.is_err());
        assert!(run(&mut shell, "open").await.unwrap().starts_with("session 0 opened"));

        shell.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_signal_on_idle_session_is_harmless() {
        let mut shell = Shell::new(&DeviceConfig::default()).unwrap();
        run(&mut shell, "open").await.unwrap();
        run(&mut shell, "write 0 data").await.unwrap();

        assert_eq!(run(&mut shell, "signal 0").await.unwrap(), "session 0 signalled");
        // Nothing was waiting, so the read goes through
        assert_eq!(
            run(&mut shell, "read 0 4").await.unwrap(),
            "read 4 bytes: \"data\""
        );

        run(&mut shell, "close 0").await.unwrap();
        assert!(run(&mut shell, "signal 0").await.is_err());
        shell.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_and_unknown_slot() {
        let mut shell = Shell::new(&DeviceConfig::default().with_capacity(8)).unwrap();
        assert!(run(&mut shell, "read 3 1").await.is_err());

        run(&mut shell, "open").await.unwrap();
        run(&mut shell, "write 0 0123456789").await.unwrap();
        let status = run(&mut shell, "status").await.unwrap();
        assert!(status.contains("open 1 len 7/8"), "{status}");
        assert!(status.contains("\"0123456\""), "{status}");
        shell.shutdown().await.unwrap();
    }
}
