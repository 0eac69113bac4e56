//! LETHE - Interactive Prompt
//! Line-oriented local shell over a store.

use std::io::{self, BufRead, Write};

use crate::engine::Lethe;
use crate::protocol::{handle_line, Dialect};

const PROMPT: &str = "> ";

/// Print the banner shown when the prompt starts.
pub fn print_banner(out: &mut impl Write) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "  ╔═══════════════════════════════════════════╗")?;
    writeln!(out, "  ║              LETHE KV Store               ║")?;
    writeln!(out, "  ║   In-memory key-value store with TTLs     ║")?;
    writeln!(out, "  ╚═══════════════════════════════════════════╝")?;
    writeln!(out)?;
    writeln!(out, "  Commands:")?;
    writeln!(out, "    SET <key> <value> [EX <seconds>]")?;
    writeln!(out, "    GET <key> | DEL <key> | TTL <key>")?;
    writeln!(out, "    SAVE <file> | LOAD <file> | SNAPSHOT | STATS")?;
    writeln!(out, "    EXIT")?;
    writeln!(out, "  Quote values with spaces: SET key \"hello world\"")?;
    writeln!(out, "  Start a server with `lethe server`, connect with `lethe client`.")?;
    writeln!(out)
}

/// Read commands from `input` until EOF or EXIT, answering on `out`.
pub fn run(store: &Lethe, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
    let mut lines = input.lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };

        let Some((reply, exit)) = handle_line(store, &line?) else {
            continue;
        };
        writeln!(out, "{}", reply.render(Dialect::Local))?;
        if exit {
            break;
        }
    }
    Ok(())
}
