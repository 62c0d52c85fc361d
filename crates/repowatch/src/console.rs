//! Terminal delivery: turns the renderer's opaque color/emphasis markers
//! into ANSI escapes and prints one line per notification.

use std::io::Write;

use repowatch_core::{DispatchError, Dispatcher, Line, Span};

/// Map an IRC-style color number (0..=15) to an ANSI foreground code.
fn ansi_fg(color: u8) -> u8 {
    match color % 16 {
        0 => 97,  // white
        1 => 30,  // black
        2 => 34,  // blue
        3 => 32,  // green
        4 => 91,  // light red
        5 => 31,  // brown
        6 => 35,  // purple
        7 => 33,  // orange
        8 => 93,  // yellow
        9 => 92,  // light green
        10 => 36, // teal
        11 => 96, // cyan
        12 => 94, // light blue
        13 => 95, // pink
        14 => 90, // grey
        _ => 37,  // light grey
    }
}

/// Encode one rendered line as ANSI-styled text.
pub fn encode_line(line: &Line) -> String {
    let mut out = String::new();
    let mut bold = false;
    let mut styled = false;
    for span in line {
        match span {
            Span::Text(text) => out.push_str(text),
            Span::Color { fg, bg } => {
                styled = true;
                out.push_str(&format!("\x1b[{}m", ansi_fg(*fg)));
                if let Some(bg) = bg {
                    out.push_str(&format!("\x1b[{}m", ansi_fg(*bg) + 10));
                }
            }
            Span::Bold => {
                styled = true;
                out.push_str(if bold { "\x1b[22m" } else { "\x1b[1m" });
                bold = !bold;
            }
            Span::Reset => {
                if styled {
                    out.push_str("\x1b[0m");
                }
                bold = false;
            }
        }
    }
    if styled {
        out.push_str("\x1b[0m");
    }
    out
}

/// Writes notifications to stdout, prefixed with the destination channel.
#[derive(Default)]
pub struct ConsoleDispatcher;

impl Dispatcher for ConsoleDispatcher {
    fn dispatch(&self, channel: &str, lines: &[Line]) -> Result<(), DispatchError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for line in lines {
            writeln!(out, "{channel} {}", encode_line(line)).map_err(|e| DispatchError {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}
