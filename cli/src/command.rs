//! Line commands understood by the interactive shell

/// Session slots are numbered from 0 in the order they were opened
pub type Slot = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open,
    Close(Slot),
    Write(Slot, String),
    Read(Slot, usize),
    Seek(Slot, usize),
    Signal(Slot),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
open               open a session, prints its slot
close <s>          close session <s>
write <s> <text>   replace the device contents with <text>
read <s> <n>       read up to <n> bytes at the session cursor
seek <s> <pos>     move the session cursor
signal <s>         interrupt session <s> if it is waiting for the device
status             show the device state
help               show this text
quit               close everything and exit";

/// Parse one input line
///
/// Returns `Ok(None)` for blank lines and `#` comments. The text of `write`
/// is everything after the slot, inner spacing preserved.
///
/// # Errors
/// A human-readable message for unknown commands and bad arguments.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = split_word(line);
    let cmd = match word {
        "open" => {
            no_more(rest, word)?;
            Command::Open
        }
        "close" => Command::Close(single_number(rest, word, "slot")?),
        "signal" => Command::Signal(single_number(rest, word, "slot")?),
        "write" => {
            let (slot, text) = split_word(rest);
            let slot = number(slot, word, "slot")?;
            if text.is_empty() {
                return Err("write: missing text".to_string());
            }
            Command::Write(slot, text.to_string())
        }
        "read" => {
            let (slot, n) = two_numbers(rest, word, "count")?;
            Command::Read(slot, n)
        }
        "seek" => {
            let (slot, pos) = two_numbers(rest, word, "position")?;
            Command::Seek(slot, pos)
        }
        "status" => {
            no_more(rest, word)?;
            Command::Status
        }
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {other} (try 'help')")),
    };
    Ok(Some(cmd))
}

fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (s, ""),
    }
}

fn number(s: &str, cmd: &str, what: &str) -> Result<usize, String> {
    if s.is_empty() {
        return Err(format!("{cmd}: missing {what}"));
    }
    s.parse()
        .map_err(|_| format!("{cmd}: bad {what}: {s}"))
}

fn no_more(rest: &str, cmd: &str) -> Result<(), String> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(format!("{cmd}: unexpected argument: {rest}"))
    }
}

fn single_number(rest: &str, cmd: &str, what: &str) -> Result<usize, String> {
    let (first, tail) = split_word(rest);
    let value = number(first, cmd, what)?;
    no_more(tail, cmd)?;
    Ok(value)
}

fn two_numbers(rest: &str, cmd: &str, second: &str) -> Result<(Slot, usize), String> {
    let (slot, tail) = split_word(rest);
    let slot = number(slot, cmd, "slot")?;
    let value = single_number(tail, cmd, second)?;
    Ok((slot, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_and_comment() {
        assert_eq!(parse_command(""), Ok(None));
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(parse_command("# open"), Ok(None));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_command("open"), Ok(Some(Command::Open)));
        assert_eq!(parse_command(" status "), Ok(Some(Command::Status)));
        assert_eq!(parse_command("help"), Ok(Some(Command::Help)));
        assert_eq!(parse_command("exit"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn test_slot_commands() {
        assert_eq!(parse_command("close 0"), Ok(Some(Command::Close(0))));
        assert_eq!(parse_command("signal 3"), Ok(Some(Command::Signal(3))));
        assert_eq!(parse_command("read 1 10"), Ok(Some(Command::Read(1, 10))));
        assert_eq!(parse_command("seek 0  4"), Ok(Some(Command::Seek(0, 4))));
    }

    #[test]
    fn test_write_keeps_inner_spacing() {
        assert_eq!(
            parse_command("write 0 hello   world"),
            Ok(Some(Command::Write(0, "hello   world".to_string())))
        );
    }

    #[test]
    fn test_errors() {
        assert!(parse_command("frobnicate").unwrap_err().contains("unknown command"));
        assert_eq!(parse_command("close"), Err("close: missing slot".to_string()));
        assert_eq!(parse_command("close x"), Err("close: bad slot: x".to_string()));
        assert_eq!(parse_command("read 0"), Err("read: missing count".to_string()));
        assert_eq!(parse_command("write 0"), Err("write: missing text".to_string()));
        assert!(parse_command("open now").is_err());
        assert!(parse_command("seek 0 1 2").is_err());
    }
}
