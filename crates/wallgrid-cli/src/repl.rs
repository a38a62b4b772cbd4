//! REPL – Read-Eval-Print Loop for the WallGrid interactive shell.
//!
//! Supported slash-commands:
//!   /help              – show this list
//!   /load <file>       – feed a recorded JSONL input stream into the session
//!   /moves             – print the move ledger
//!   /speed <limb>      – speed samples and average for one limb
//!   /replay <index>    – grid state after the first `index` moves
//!   /grid <n>          – change the grid resolution (clears the session)
//!   /reset             – clear the session
//!   /snapshot          – print the encoded actuator snapshot
//!   /save              – persist the session to the session database
//!   /sessions          – list persisted sessions
//!   /open <id>         – load a persisted session
//!   /delete <id>       – remove a persisted session
//!   /export <file>     – write the session as JSON
//!   /import <file>     – load a session from a JSON export
//!   /schema            – print the JSON schema of recorded input
//!   /quit | /exit      – exit the CLI

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;
use wallgrid_hal::{PublishOutcome, SimLink, SnapshotPublisher};
use wallgrid_memory::{SessionRecord, SessionStore};
use wallgrid_runtime::Session;
use wallgrid_types::Limb;

use crate::input;

/// Frames the stand-in LED link retains.
const LINK_HISTORY: usize = 8;

/// Whether the loop should keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Everything the shell operates on.
pub struct Shell {
    pub session: Session,
    pub store: Option<SessionStore>,
    /// Stands in for the LED board when no hardware is attached.
    pub link: SimLink,
    pub publisher: SnapshotPublisher,
}

impl Shell {
    pub fn new(session: Session, store: Option<SessionStore>) -> Self {
        Self {
            session,
            store,
            link: SimLink::new("led_board").with_history(LINK_HISTORY),
            publisher: SnapshotPublisher::default(),
        }
    }

    /// Execute one command line.
    pub fn dispatch(&mut self, line: &str) -> Flow {
        let mut parts = line.split_whitespace();
        let Some(cmd) = parts.next() else {
            return Flow::Continue;
        };
        let arg = parts.next();

        match (cmd, arg) {
            ("/help", _) => cmd_help(),
            ("/load", Some(path)) => self.cmd_load(Path::new(path)),
            ("/moves", _) => self.cmd_moves(),
            ("/speed", Some(limb)) => self.cmd_speed(limb),
            ("/replay", Some(index)) => self.cmd_replay(index),
            ("/grid", Some(n)) => self.cmd_grid(n),
            ("/reset", _) => {
                self.session.reset();
                println!("{}", "✓ Session cleared.".green());
            }
            ("/snapshot", _) => self.cmd_snapshot(),
            ("/save", _) => self.cmd_save(),
            ("/sessions", _) => self.cmd_sessions(),
            ("/open", Some(id)) => self.cmd_open(id),
            ("/delete", Some(id)) => self.cmd_delete(id),
            ("/export", Some(path)) => self.cmd_export(Path::new(path)),
            ("/import", Some(path)) => self.cmd_import(Path::new(path)),
            ("/schema", _) => match input::schema_json() {
                Ok(schema) => println!("{schema}"),
                Err(e) => println!("{}: {}", "Schema error".red(), e),
            },
            ("/quit" | "/exit", _) => {
                println!("{}", "Goodbye.".green());
                return Flow::Quit;
            }
            (
                "/load" | "/speed" | "/replay" | "/grid" | "/open" | "/delete" | "/export"
                | "/import",
                None,
            ) => {
                println!(
                    "{} {} needs an argument. Type {} for usage.",
                    "Missing argument:".red(),
                    cmd.yellow(),
                    "/help".bold()
                );
            }
            (other, _) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
        Flow::Continue
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Command handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn cmd_load(&mut self, path: &Path) {
        let events = match input::load_events(path) {
            Ok(events) => events,
            Err(e) => {
                println!("{}: {}", "Load error".red(), e);
                return;
            }
        };

        let (mut frames, mut skipped, mut rejected, mut sent) = (0usize, 0usize, 0usize, 0usize);
        for event in &events {
            match input::apply(&mut self.session, event) {
                Ok(Some(report)) => {
                    frames += 1;
                    if report.skipped {
                        skipped += 1;
                    }
                    for m in report.appended() {
                        println!(
                            "  {} #{} {} {} at {} ms",
                            "●".green(),
                            m.seq,
                            m.limb.to_string().bold(),
                            m.cell,
                            m.created_at_ms
                        );
                    }
                    let snapshot = self.session.snapshot();
                    if self
                        .publisher
                        .poll(report.timestamp_ms, &snapshot, &mut self.link)
                        == PublishOutcome::Sent
                    {
                        sent += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    rejected += 1;
                    println!("  {}: {}", "Rejected event".yellow(), e);
                }
            }
        }

        println!(
            "{} {} event(s), {} frame(s) ({} skipped), {} rejected, {} snapshot(s) sent, {} move(s) total",
            "✓ Loaded".green(),
            events.len(),
            frames,
            skipped,
            rejected,
            sent,
            self.session.ledger().len()
        );
    }

    fn cmd_moves(&self) {
        let moves = self.session.ledger().moves();
        if moves.is_empty() {
            println!("  {}", "No moves recorded.".dimmed());
            return;
        }
        println!("{}", "Move Ledger".bold().underline());
        println!("  {:>4}  {:<11} {:<10} {:>10} {:>9}", "seq", "limb", "cell", "at (ms)", "held");
        for m in moves {
            println!(
                "  {:>4}  {:<11} {:<10} {:>10} {:>7}ms",
                m.seq,
                m.limb.to_string(),
                m.cell.to_string(),
                m.created_at_ms,
                m.duration_ms
            );
        }
    }

    fn cmd_speed(&mut self, raw: &str) {
        let limb: Limb = match raw.parse() {
            Ok(l) => l,
            Err(e) => {
                println!("{}: {}", "Error".red(), e);
                return;
            }
        };
        match self.session.speed_for(limb) {
            Some(speed) => {
                let samples: Vec<String> = speed.samples.iter().map(|s| format!("{s:.2}")).collect();
                println!("  {} samples : [{}]", limb.to_string().bold(), samples.join(", "));
                println!("  {} average : {:.2} cells/s", limb.to_string().bold(), speed.average);
            }
            None => println!("  {}", "Analytics are disabled.".yellow()),
        }
    }

    fn cmd_replay(&self, raw: &str) {
        let index: usize = match raw.parse() {
            Ok(i) => i,
            Err(_) => {
                println!("{} '{}'", "Not an index:".red(), raw.yellow());
                return;
            }
        };
        let Some(state) = self.session.replay_at(index) else {
            println!("  {}", "Replay is disabled.".yellow());
            return;
        };
        println!(
            "  After {} of {} move(s): {} cell(s) filled",
            state.index,
            self.session.ledger().len(),
            state.filled.len()
        );
        for (limb, cell) in &state.filled {
            println!("    {} {}", limb.to_string().bold(), cell);
        }
        if let Some(m) = state.current {
            println!("  Current move: #{} {} {}", m.seq, m.limb, m.cell);
        }
    }

    fn cmd_grid(&mut self, raw: &str) {
        let n: u32 = match raw.parse() {
            Ok(n) => n,
            Err(_) => {
                println!("{} '{}'", "Not a number:".red(), raw.yellow());
                return;
            }
        };
        match self.session.set_grid_size(n) {
            Ok(()) => println!("{} {n}×{n}", "✓ Grid set to".green()),
            Err(e) => println!("{}: {}", "Error".red(), e),
        }
    }

    fn cmd_snapshot(&self) {
        let bytes = self.session.snapshot();
        let limbs = self.session.config().limb_set.limbs();
        for (limb, pair) in limbs.iter().zip(bytes.chunks_exact(2)) {
            println!("  {:<11} {:>3} {:>3}", limb.to_string(), pair[0], pair[1]);
        }
        println!("  {} {:?}", "raw".dimmed(), bytes);
    }

    fn cmd_save(&self) {
        let Some(store) = &self.store else {
            println!("{}", "No session database is open.".yellow());
            return;
        };
        let record = self.session.record();
        match store.save(&record) {
            Ok(()) => println!(
                "{} {} ({} move(s))",
                "✓ Saved session".green(),
                record.id.to_string().bold(),
                record.moves.len()
            ),
            Err(e) => println!("{}: {}", "Error saving session".red(), e),
        }
    }

    fn cmd_sessions(&self) {
        let Some(store) = &self.store else {
            println!("{}", "No session database is open.".yellow());
            return;
        };
        match store.list() {
            Ok(list) if list.is_empty() => println!("  {}", "No saved sessions.".dimmed()),
            Ok(list) => {
                for s in list {
                    println!(
                        "  {}  {}  {}×{}  {:<14} {} move(s)",
                        s.id.to_string().bold(),
                        s.started_at.format("%Y-%m-%d %H:%M:%S"),
                        s.grid_size.get(),
                        s.grid_size.get(),
                        s.limb_set.to_string(),
                        s.move_count
                    );
                }
            }
            Err(e) => println!("{}: {}", "Error listing sessions".red(), e),
        }
    }

    fn cmd_open(&mut self, raw: &str) {
        let Some(store) = &self.store else {
            println!("{}", "No session database is open.".yellow());
            return;
        };
        let id = match Uuid::parse_str(raw) {
            Ok(id) => id,
            Err(e) => {
                println!("{}: {}", "Invalid session id".red(), e);
                return;
            }
        };
        match store.load(id) {
            Ok(Some(record)) => match self.session.restore(&record) {
                Ok(()) => println!(
                    "{} {} ({} move(s))",
                    "✓ Opened session".green(),
                    id.to_string().bold(),
                    record.moves.len()
                ),
                Err(e) => println!("{}: {}", "Corrupt session".red(), e),
            },
            Ok(None) => println!("{} {}", "No such session:".red(), raw.yellow()),
            Err(e) => println!("{}: {}", "Error loading session".red(), e),
        }
    }

    fn cmd_delete(&self, raw: &str) {
        let Some(store) = &self.store else {
            println!("{}", "No session database is open.".yellow());
            return;
        };
        let id = match Uuid::parse_str(raw) {
            Ok(id) => id,
            Err(e) => {
                println!("{}: {}", "Invalid session id".red(), e);
                return;
            }
        };
        match store.delete(id) {
            Ok(true) => println!("{} {}", "✓ Deleted session".green(), id.to_string().bold()),
            Ok(false) => println!("{} {}", "No such session:".red(), raw.yellow()),
            Err(e) => println!("{}: {}", "Error deleting session".red(), e),
        }
    }

    fn cmd_export(&self, path: &Path) {
        let record = self.session.record();
        let written = record
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => println!(
                "{} {} ({} move(s)) to {}",
                "✓ Exported session".green(),
                record.id.to_string().bold(),
                record.moves.len(),
                path.display()
            ),
            Err(e) => println!("{}: {}", "Export error".red(), e),
        }
    }

    fn cmd_import(&mut self, path: &Path) {
        let record = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| SessionRecord::from_json(&raw).map_err(|e| e.to_string()));
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                println!("{}: {}", "Import error".red(), e);
                return;
            }
        };
        match self.session.restore(&record) {
            Ok(()) => println!(
                "{} {} ({} move(s))",
                "✓ Imported session".green(),
                record.id.to_string().bold(),
                record.moves.len()
            ),
            Err(e) => println!("{}: {}", "Corrupt session".red(), e),
        }
    }
}

fn cmd_help() {
    println!();
    println!("{}", "WallGrid Commands".bold().underline());
    println!("  {}  – feed a recorded JSONL input stream", "/load <file>".bold().cyan());
    println!("  {}        – print the move ledger", "/moves".bold().cyan());
    println!("  {}  – limb speed (lh, rh, lf, rf)", "/speed <limb>".bold().cyan());
    println!("  {}   – grid state after the first i moves", "/replay <i>".bold().cyan());
    println!("  {}     – change grid resolution (clears session)", "/grid <n>".bold().cyan());
    println!("  {}        – clear the session", "/reset".bold().cyan());
    println!("  {}     – print the actuator snapshot", "/snapshot".bold().cyan());
    println!("  {}         – persist the session", "/save".bold().cyan());
    println!("  {}     – list persisted sessions", "/sessions".bold().cyan());
    println!("  {}    – load a persisted session", "/open <id>".bold().cyan());
    println!("  {}  – remove a persisted session", "/delete <id>".bold().cyan());
    println!("  {} – write the session as JSON", "/export <file>".bold().cyan());
    println!("  {} – load a session from JSON", "/import <file>".bold().cyan());
    println!("  {}       – JSON schema of recorded input", "/schema".bold().cyan());
    println!("  {}  – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(mut shell: Shell, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "wallgrid>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        if shell.dispatch(line.trim()) == Flow::Quit {
            shutdown.store(true, Ordering::SeqCst);
            break;
        }
    }
}
