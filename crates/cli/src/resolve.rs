//! Interactive conflict resolution session.
//!
//! Lists the unmerged files of the in-progress operation and lets the user
//! pick a side per file, open files in an editor, drop into a shell, and
//! finally continue or abort the operation.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use dialoguer::{Confirm, Select};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use mergeflow_core::git::{inspect_operation, GitCliBackend, GitStatusReader};
use mergeflow_core::launch::Launcher;
use mergeflow_core::workflow::{Action, FileView, SessionOutcome};
use mergeflow_core::{
    ConflictSession, FileStatusKind, ManualResolution, MergeFlowConfig, SessionConfig,
    SessionHost,
};

use crate::style;

type Session = ConflictSession<GitCliBackend, CliHost>;

/// Prints session events to the terminal.
struct CliHost;

impl SessionHost for CliHost {
    fn conflicts_resolved(&self) {
        println!("{}", style::success("Conflicts resolved"));
    }

    fn session_ended(&self, outcome: SessionOutcome) {
        debug!(%outcome, "session ended");
    }
}

enum MenuEntry {
    File(usize),
    Refresh,
    Shell,
    Continue,
    Abort,
    Quit,
}

enum FileAction {
    Edit,
    Use(ManualResolution),
    Clear,
    Back,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run the interactive session for the repository at `repo`.
pub async fn run_resolve(repo: &Path, config: &MergeFlowConfig) -> Result<()> {
    let reader = GitStatusReader::new(repo).context("failed to open repository")?;
    let Some(context) =
        inspect_operation(reader.repo_path()).context("failed to inspect repository state")?
    else {
        println!();
        println!("{}", style::success("No merge, rebase or cherry-pick in progress"));
        println!();
        return Ok(());
    };

    let snapshot = reader.snapshot().context("failed to read working directory")?;
    let backend = GitCliBackend::new(reader.repo_path(), context.kind, &config.git);
    let launcher = Launcher::new(reader.repo_path(), &config.launch);
    let session = ConflictSession::new(
        SessionConfig {
            operation: context.kind,
            our_branch: context.our_branch.clone(),
            their_branch: context.their_branch.clone(),
            already_resolved: false,
        },
        snapshot,
        backend,
        CliHost,
    );

    loop {
        print_summary(&session);

        let views = session.file_views();
        let control = session.submit_control();
        let operation = session.config().operation;

        let mut entries = Vec::new();
        let mut labels = Vec::new();
        for (index, view) in views.iter().enumerate() {
            entries.push(MenuEntry::File(index));
            labels.push(format!("{}  {}", view.path, style::file_state(&view.state)));
        }
        entries.push(MenuEntry::Refresh);
        labels.push("Refresh from disk".to_string());
        entries.push(MenuEntry::Shell);
        labels.push("Open shell in repository".to_string());
        entries.push(MenuEntry::Continue);
        labels.push(match control.tooltip {
            Some(ref tooltip) if !control.enabled => {
                style::dim(&format!("Continue {} ({})", operation, tooltip))
            }
            _ => format!("Continue {}", operation),
        });
        entries.push(MenuEntry::Abort);
        labels.push(format!("Abort {}", operation));
        entries.push(MenuEntry::Quit);
        labels.push("Quit (leave operation in progress)".to_string());

        let choice = Select::new()
            .with_prompt("Choose a file or action")
            .items(&labels)
            .default(0)
            .interact()
            .context("failed to read selection")?;

        match entries[choice] {
            MenuEntry::File(index) => {
                file_menu(&session, &views[index], &launcher, &reader)?;
            }
            MenuEntry::Refresh => {
                session.refresh(&reader).context("failed to refresh status")?;
            }
            MenuEntry::Shell => {
                if let Err(e) = launcher.open_in_shell() {
                    println!("{}", style::error(&e.to_string()));
                }
                session.refresh(&reader).context("failed to refresh status")?;
            }
            MenuEntry::Continue => {
                if !control.enabled {
                    if let Some(tooltip) = control.tooltip {
                        println!("{}", style::warn(&tooltip));
                    }
                    continue;
                }
                return finish(&session, Action::Submit).await;
            }
            MenuEntry::Abort => {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Abort the {}? Manual choices will be discarded.",
                        operation
                    ))
                    .default(false)
                    .interact()
                    .context("failed to read confirmation")?;
                if confirmed {
                    return finish(&session, Action::Abort).await;
                }
            }
            MenuEntry::Quit => {
                session.dismiss()?;
                println!(
                    "{}",
                    style::dim(&format!(
                        "The {} is still in progress. Run 'mergeflow resolve' to pick it up again.",
                        operation
                    ))
                );
                return Ok(());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_summary(session: &Session) {
    let config = session.config();
    let conflicted = session.conflicted_count();
    let title = style::operation_title(
        config.operation,
        &config.our_branch,
        config.their_branch.as_deref(),
    );

    println!();
    println!("{}", style::header(&title));
    if conflicted == 0 {
        println!("{}", style::success("All conflicts resolved"));
    } else {
        println!(
            "{}",
            style::warn(&format!("{} conflicted file(s) remaining", conflicted))
        );
    }
    println!();
}

fn file_menu(
    session: &Session,
    view: &FileView,
    launcher: &Launcher,
    reader: &GitStatusReader,
) -> Result<()> {
    let config = session.config();
    let theirs = config.their_branch.as_deref().unwrap_or("theirs");

    let mut actions = Vec::new();
    let mut labels = Vec::new();
    if has_content(&view.kind) {
        actions.push(FileAction::Edit);
        labels.push("Open in editor".to_string());
    }
    actions.push(FileAction::Use(ManualResolution::Ours));
    labels.push(format!("Use the version from {}", config.our_branch));
    actions.push(FileAction::Use(ManualResolution::Theirs));
    labels.push(format!("Use the version from {}", theirs));
    if matches!(view.kind, FileStatusKind::ConflictedWithMarkers { .. }) {
        actions.push(FileAction::Use(ManualResolution::MarkersRemoved));
        labels.push("Mark as resolved".to_string());
    }
    actions.push(FileAction::Clear);
    labels.push("Clear choice".to_string());
    actions.push(FileAction::Back);
    labels.push("Back".to_string());

    let choice = Select::new()
        .with_prompt(format!("{} ({})", view.path, view.kind))
        .items(&labels)
        .default(0)
        .interact()
        .context("failed to read selection")?;

    match actions[choice] {
        FileAction::Edit => {
            if let Err(e) = launcher.open_in_editor(&view.path) {
                println!("{}", style::error(&e.to_string()));
            }
            session.refresh(reader).context("failed to refresh status")?;
        }
        FileAction::Use(resolution) => {
            session.resolve(&view.path, resolution)?;
        }
        FileAction::Clear => {
            session.clear_resolution(&view.path)?;
        }
        FileAction::Back => {}
    }
    Ok(())
}

/// Whether the working tree holds a file to open for this status.
fn has_content(kind: &FileStatusKind) -> bool {
    !matches!(kind, FileStatusKind::BothDeleted)
}

/// Run a terminal action behind a spinner.
async fn finish(session: &Session, action: Action) -> Result<()> {
    let operation = session.config().operation;
    let (verb, done, name) = match action {
        Action::Submit => ("Continuing", "continued", "continue"),
        Action::Abort => ("Aborting", "aborted", "abort"),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("{} {}...", verb, operation));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = match action {
        Action::Submit => session.submit().await,
        Action::Abort => session.abort().await,
    };
    spinner.finish_and_clear();

    match result {
        Ok(()) => {
            println!("{}", style::success(&format!("The {} was {}", operation, done)));
            Ok(())
        }
        Err(e) => {
            println!("{}", style::error(&e.to_string()));
            Err(e).with_context(|| format!("failed to {} the {}", name, operation))
        }
    }
}
