//! LETHE - Command Protocol
//! Parses text command lines, runs them against the store and renders replies
//! for the local prompt or for network clients.

use std::path::PathBuf;
use std::time::Duration;

use crate::engine::Lethe;
use crate::error::{LetheError, Result};
use crate::types::{Key, Value, MAX_TTL};

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: Key, value: Value, ttl: Duration },
    Get { key: Key },
    Del { key: Key },
    Ttl { key: Key },
    Save { path: PathBuf },
    Load { path: PathBuf },
    Snapshot,
    Stats,
    Exit,
    /// Verb not recognised; answered with `Unknown command`.
    Unknown(String),
}

impl Command {
    /// Parse one input line. Blank input is an error; callers skip blank lines first.
    pub fn parse(line: &str) -> Result<Command> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(verb) = parts.first() else {
            return Err(LetheError::Parse("empty command".into()));
        };

        let verb = verb.to_uppercase();
        match verb.as_str() {
            "SET" => Self::parse_set(&parts),
            "GET" => Ok(Command::Get {
                key: single_arg(&parts, "GET requires exactly one key")?,
            }),
            "DEL" => Ok(Command::Del {
                key: single_arg(&parts, "DEL requires exactly one key")?,
            }),
            "TTL" => Ok(Command::Ttl {
                key: single_arg(&parts, "TTL requires exactly one key")?,
            }),
            "SAVE" => Ok(Command::Save {
                path: single_arg(&parts, "SAVE requires filename")?.into(),
            }),
            "LOAD" => Ok(Command::Load {
                path: single_arg(&parts, "LOAD requires filename")?.into(),
            }),
            "SNAPSHOT" => Ok(Command::Snapshot),
            "STATS" => Ok(Command::Stats),
            "EXIT" | "QUIT" => Ok(Command::Exit),
            _ => Ok(Command::Unknown(verb)),
        }
    }

    // SET key value... [EX seconds]
    fn parse_set(parts: &[&str]) -> Result<Command> {
        if parts.len() < 3 {
            return Err(LetheError::Parse("SET requires key and value".into()));
        }

        let mut value_end = parts.len();
        let mut ttl = Duration::ZERO;
        if parts.len() >= 5 && parts[parts.len() - 2].eq_ignore_ascii_case("EX") {
            let seconds = parts[parts.len() - 1]
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs <= MAX_TTL.as_secs())
                .ok_or_else(|| LetheError::Parse("invalid TTL value".into()))?;
            ttl = Duration::from_secs(seconds);
            value_end -= 2;
        }

        Ok(Command::Set {
            key: parts[1].to_string(),
            value: strip_quotes(&parts[2..value_end].join(" ")).to_string(),
            ttl,
        })
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, Command::Exit)
    }
}

fn single_arg(parts: &[&str], usage: &str) -> Result<String> {
    match parts {
        [_, arg] => Ok(arg.to_string()),
        _ => Err(LetheError::Parse(usage.into())),
    }
}

/// Trim `s` and strip one matching pair of outer `"` or `'` quotes.
pub fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Compact duration: `250ms`, `45s`, `2m5s`, `1h`, `3h20m`.
pub fn format_duration(d: Duration) -> String {
    if d < Duration::from_secs(1) {
        return format!("{}ms", d.as_millis());
    }

    let seconds = d.as_secs();
    if seconds < 60 {
        return format!("{seconds}s");
    }

    let (minutes, seconds) = (seconds / 60, seconds % 60);
    if minutes < 60 {
        return match seconds {
            0 => format!("{minutes}m"),
            s => format!("{minutes}m{s}s"),
        };
    }

    let (hours, minutes) = (minutes / 60, minutes % 60);
    match minutes {
        0 => format!("{hours}h"),
        m => format!("{hours}h{m}m"),
    }
}

/// Outcome of executing a command, independent of how it is displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Value(Value),
    Nil,
    Integer(i64),
    Text(String),
    Error(String),
    Goodbye,
    Unknown,
}

/// How a reply is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Interactive prompt: quoted values, `Error:` prefix.
    Local,
    /// TCP clients: raw values, `ERROR:` prefix.
    Network,
}

impl Reply {
    /// Render without the trailing newline.
    pub fn render(&self, dialect: Dialect) -> String {
        match (self, dialect) {
            (Reply::Ok, _) => "OK".to_string(),
            (Reply::Value(v), Dialect::Local) => format!("\"{v}\""),
            (Reply::Value(v), Dialect::Network) => v.clone(),
            (Reply::Nil, _) => "(nil)".to_string(),
            (Reply::Integer(n), _) => n.to_string(),
            (Reply::Text(t), _) => t.clone(),
            (Reply::Error(e), Dialect::Local) => format!("Error: {e}"),
            (Reply::Error(e), Dialect::Network) => format!("ERROR: {e}"),
            (Reply::Goodbye, _) => "Goodbye!".to_string(),
            (Reply::Unknown, _) => "Unknown command".to_string(),
        }
    }
}

impl From<LetheError> for Reply {
    fn from(err: LetheError) -> Self {
        Reply::Error(err.to_string())
    }
}

/// Run `command` against `store`.
pub fn execute(store: &Lethe, command: &Command) -> Reply {
    match command {
        Command::Set { key, value, ttl } => match store.set(key, value.as_str(), *ttl) {
            Ok(()) => Reply::Ok,
            Err(err) => err.into(),
        },
        Command::Get { key } => store.get(key).map_or(Reply::Nil, Reply::Value),
        Command::Del { key } => Reply::Integer(store.delete(key) as i64),
        Command::Ttl { key } => match store.ttl(key) {
            None => Reply::Nil,
            Some(None) => Reply::Integer(-1),
            Some(Some(remaining)) => Reply::Text(format_duration(remaining)),
        },
        Command::Save { path } => match store.save_to_file(path) {
            Ok(_) => Reply::Ok,
            Err(err) => err.into(),
        },
        Command::Load { path } => match store.load_from_file(path) {
            Ok(_) => Reply::Ok,
            Err(err) => err.into(),
        },
        Command::Snapshot => match store.save_snapshot() {
            Ok(path) => Reply::Text(format!("OK {}", path.display())),
            Err(err) => err.into(),
        },
        Command::Stats => {
            let stats = store.stats();
            Reply::Text(format!(
                "keys={} expired={} active={}",
                stats.total_keys, stats.expired_keys, stats.active_keys
            ))
        }
        Command::Exit => Reply::Goodbye,
        Command::Unknown(_) => Reply::Unknown,
    }
}

/// Parse and run one line. `None` for blank lines.
pub fn handle_line(store: &Lethe, line: &str) -> Option<(Reply, bool)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    Some(match Command::parse(line) {
        Ok(command) => (execute(store, &command), command.is_exit()),
        Err(err) => (err.into(), false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_parse_set_multiword_and_ttl() {
        assert_eq!(
            Command::parse("set greeting hello big world EX 10").unwrap(),
            Command::Set {
                key: "greeting".into(),
                value: "hello big world".into(),
                ttl: Duration::from_secs(10),
            }
        );
        assert_eq!(
            Command::parse("SET k \"hello world\"").unwrap(),
            Command::Set {
                key: "k".into(),
                value: "hello world".into(),
                ttl: Duration::ZERO,
            }
        );
    }

    #[test]
    fn test_parse_set_ttl_upper_bound() {
        let at_limit = format!("SET k v EX {}", MAX_TTL.as_secs());
        assert!(matches!(
            Command::parse(&at_limit).unwrap(),
            Command::Set { ttl, .. } if ttl == MAX_TTL
        ));

        let over_limit = format!("SET k v EX {}", MAX_TTL.as_secs() + 1);
        let err = Command::parse(&over_limit).unwrap_err();
        assert_eq!(err.to_string(), "invalid TTL value");
    }

    #[test]
    fn test_parse_set_short_form_ex_is_value() {
        // Four tokens: "EX" is part of the value, not a TTL marker.
        assert_eq!(
            Command::parse("SET k EX 5").unwrap(),
            Command::Set {
                key: "k".into(),
                value: "EX 5".into(),
                ttl: Duration::ZERO,
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Command::parse("SET k"), Err(LetheError::Parse(_))));
        assert!(matches!(Command::parse("SET k v EX soon"), Err(LetheError::Parse(_))));
        assert!(matches!(Command::parse("SET k v EX -3"), Err(LetheError::Parse(_))));
        assert!(matches!(
            Command::parse("SET k v EX 18446744073709551615"),
            Err(LetheError::Parse(_))
        ));
        assert!(matches!(Command::parse("GET a b"), Err(LetheError::Parse(_))));
        assert!(matches!(Command::parse("LOAD"), Err(LetheError::Parse(_))));
        assert!(matches!(Command::parse("   "), Err(LetheError::Parse(_))));
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(Command::parse("quit").unwrap(), Command::Exit);
        assert_eq!(Command::parse("Exit").unwrap(), Command::Exit);
        assert_eq!(Command::parse("stats").unwrap(), Command::Stats);
        assert_eq!(
            Command::parse("flushall").unwrap(),
            Command::Unknown("FLUSHALL".into())
        );
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("'single'"), "single");
        assert_eq!(strip_quotes("  \"padded\"  "), "padded");
        assert_eq!(strip_quotes("\"mismatched'"), "\"mismatched'");
        assert_eq!(strip_quotes("\"\"inner\"\""), "\"inner\"");
        assert_eq!(strip_quotes("\""), "\"");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m5s");
        assert_eq!(format_duration(Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(12_000)), "3h20m");
    }

    #[test]
    fn test_render_dialects() {
        let value = Reply::Value("bar".into());
        assert_eq!(value.render(Dialect::Local), "\"bar\"");
        assert_eq!(value.render(Dialect::Network), "bar");

        let err = Reply::Error("boom".into());
        assert_eq!(err.render(Dialect::Local), "Error: boom");
        assert_eq!(err.render(Dialect::Network), "ERROR: boom");
        assert_eq!(Reply::Nil.render(Dialect::Network), "(nil)");
    }

    #[test]
    fn test_execute_scenario() {
        let store = Lethe::open(Config::default()).unwrap();
        let run = |line: &str| handle_line(&store, line).unwrap().0.render(Dialect::Local);

        assert_eq!(run("SET foo bar EX 100"), "OK");
        assert_eq!(run("GET foo"), "\"bar\"");
        assert_eq!(run("DEL missingkey"), "0");
        assert_eq!(run("DEL foo"), "1");
        assert_eq!(run("GET foo"), "(nil)");
        assert_eq!(run("SET plain v"), "OK");
        assert_eq!(run("TTL plain"), "-1");
        assert_eq!(run("STATS"), "keys=1 expired=0 active=1");
        assert_eq!(run("NOPE"), "Unknown command");
        assert_eq!(run("GET"), "Error: GET requires exactly one key");
        assert!(run("LOAD /definitely/not/here.json").starts_with("Error: failed to open file"));

        assert_eq!(run("SET huge v EX 18446744073709551615"), "Error: invalid TTL value");
        assert_eq!(run("SET huge v EX 18446744073709551"), "Error: invalid TTL value");
        assert_eq!(run("GET huge"), "(nil)");

        assert!(handle_line(&store, "").is_none());
        let (reply, exit) = handle_line(&store, "EXIT").unwrap();
        assert_eq!(reply, Reply::Goodbye);
        assert!(exit);
    }
}
