//! Interactive text menu: enroll, recognize, exit.

use crate::session::{EnrollOutcome, RecognizeSummary};
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Enroll,
    Recognize,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Enroll),
            "2" => Some(MenuChoice::Recognize),
            "3" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

/// What the menu drives. Implemented by the application and by test fakes.
pub trait MenuActions {
    fn is_enrolled(&self, username: &str) -> bool;
    fn enroll(&mut self, username: &str) -> anyhow::Result<EnrollOutcome>;
    fn recognize(&mut self) -> anyhow::Result<RecognizeSummary>;
}

/// Run the menu until the user exits or input ends.
///
/// Action failures (camera unplugged, window error, ...) are reported and
/// the menu is shown again.
pub fn run_menu<R: BufRead, W: Write>(
    mut input: R,
    out: &mut W,
    actions: &mut dyn MenuActions,
) -> io::Result<()> {
    loop {
        writeln!(out, "\n===== Facial Recognition System =====")?;
        writeln!(out, "1. Add User")?;
        writeln!(out, "2. Recognize Users")?;
        writeln!(out, "3. Exit")?;
        let Some(line) = prompt(&mut input, out, "Choose an option (1-3): ")? else {
            writeln!(out)?;
            return Ok(());
        };

        match MenuChoice::parse(&line) {
            Some(MenuChoice::Enroll) => {
                let Some(username) = prompt(&mut input, out, "Enter a username: ")? else {
                    return Ok(());
                };
                enroll_user(out, actions, username.trim())?;
            }
            Some(MenuChoice::Recognize) => {
                writeln!(out, "[INFO] Starting recognition. Press 'q' to quit.")?;
                match actions.recognize() {
                    Ok(summary) => writeln!(out, "{}", describe_recognize(&summary))?,
                    Err(e) => report_error(out, &e)?,
                }
            }
            Some(MenuChoice::Exit) => {
                writeln!(out, "[INFO] Exiting program.")?;
                return Ok(());
            }
            None => writeln!(out, "[ERROR] Invalid choice. Please enter 1-3.")?,
        }
    }
}

/// One enrollment including the user-facing messages around it.
fn enroll_user<W: Write>(
    out: &mut W,
    actions: &mut dyn MenuActions,
    username: &str,
) -> io::Result<()> {
    if username.is_empty() {
        return writeln!(out, "[ERROR] Username must not be empty.");
    }
    if actions.is_enrolled(username) {
        writeln!(out, "[WARN] User '{username}' already exists. Adding more samples.")?;
    }
    writeln!(out, "[INFO] Adding user: {username}. Press 'q' when done.")?;
    match actions.enroll(username) {
        Ok(outcome) => writeln!(out, "{}", describe_enroll(username, &outcome)),
        Err(e) => report_error(out, &e),
    }
}

pub fn describe_enroll(username: &str, outcome: &EnrollOutcome) -> String {
    match outcome {
        EnrollOutcome::Enrolled { captured, total } => format!(
            "[INFO] User '{username}' added with {captured} samples ({total} total)."
        ),
        EnrollOutcome::NoFaceDetected => "[WARN] No face detected. User not added.".to_string(),
    }
}

pub fn describe_recognize(summary: &RecognizeSummary) -> String {
    format!(
        "[INFO] Recognition stopped after {} frames: {} faces seen, {} identified.",
        summary.frames, summary.faces, summary.identified
    )
}

fn report_error<W: Write>(out: &mut W, err: &anyhow::Error) -> io::Result<()> {
    tracing::error!(error = ?err, "menu action failed");
    writeln!(out, "[ERROR] {err:#}")
}

/// Print `label` and read one line. `None` on end of input.
fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, label: &str) -> io::Result<Option<String>> {
    write!(out, "{label}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
