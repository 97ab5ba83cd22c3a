//! Resolution executor.
//!
//! For every group the survivor is chosen with [`order_group`], then the
//! configured [`LinkAction`] is applied to each other member. Failures are
//! contained per file: they are logged, recorded in the report, and the next
//! member is processed.

use std::path::PathBuf;
use std::sync::Arc;

use super::keep::{order_group, KeepPolicy};
use super::link::{
    remove_member, replace_with_hardlink, replace_with_shortcut, replace_with_symlink,
    ActionError, FileSnapshot, LinkAction, ShortcutCreator, UrlShortcut,
};
use crate::duplicates::DuplicateGroup;
use crate::scanner::FileRecord;

/// Settings of the resolution step.
#[derive(Clone)]
pub struct ResolveConfig {
    /// Survivor selection
    pub policy: KeepPolicy,
    /// Action on non-kept members
    pub action: LinkAction,
    /// Log the plan without touching files
    pub dry_run: bool,
    /// Shortcut writer for [`LinkAction::Shortcut`]
    pub shortcut: Arc<dyn ShortcutCreator>,
}

impl std::fmt::Debug for ResolveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolveConfig")
            .field("policy", &self.policy)
            .field("action", &self.action)
            .field("dry_run", &self.dry_run)
            .field("shortcut_supported", &self.shortcut.is_supported())
            .finish()
    }
}

impl ResolveConfig {
    /// Create a configuration using the built-in shortcut writer.
    #[must_use]
    pub fn new(policy: KeepPolicy, action: LinkAction) -> Self {
        Self {
            policy,
            action,
            dry_run: false,
            shortcut: Arc::new(UrlShortcut),
        }
    }

    /// Enable or disable dry-run.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Use another shortcut writer.
    #[must_use]
    pub fn with_shortcut_creator(mut self, creator: Arc<dyn ShortcutCreator>) -> Self {
        self.shortcut = creator;
        self
    }
}

/// What happened to one file.
#[derive(Debug)]
pub enum Outcome {
    /// Chosen as the survivor of its group
    Kept,
    /// Would have been acted on (dry-run)
    Planned(LinkAction),
    /// Action applied
    Applied(LinkAction),
    /// Action failed; the file was left as is
    Failed(ActionError),
}

/// Per-file event of the resolution step.
#[derive(Debug)]
pub struct ResolutionEvent {
    /// Index of the group in processing order
    pub group: usize,
    /// File concerned
    pub path: PathBuf,
    /// Result
    pub outcome: Outcome,
}

/// Aggregate of a resolution run.
#[derive(Debug, Default)]
pub struct ResolutionReport {
    /// Groups processed
    pub groups: usize,
    /// Survivors
    pub kept: usize,
    /// Members planned in dry-run
    pub planned: usize,
    /// Members acted on
    pub applied: usize,
    /// Members left untouched because of an error
    pub failed: usize,
    /// Every per-file event in processing order
    pub events: Vec<ResolutionEvent>,
}

impl ResolutionReport {
    /// Whether any member could not be processed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn push(&mut self, group: usize, path: PathBuf, outcome: Outcome) {
        match outcome {
            Outcome::Kept => self.kept += 1,
            Outcome::Planned(_) => self.planned += 1,
            Outcome::Applied(_) => self.applied += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
        self.events.push(ResolutionEvent {
            group,
            path,
            outcome,
        });
    }
}

/// Applies the keep policy and action to duplicate groups.
#[derive(Debug)]
pub struct Resolver {
    config: ResolveConfig,
}

impl Resolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(config: ResolveConfig) -> Self {
        Self { config }
    }

    /// Resolve all groups in order.
    #[must_use]
    pub fn resolve(&self, groups: Vec<DuplicateGroup>) -> ResolutionReport {
        let mut report = ResolutionReport::default();
        if groups.is_empty() {
            log::info!("No duplicate groups to process");
            return report;
        }

        log::info!(
            "Processing {} group(s): keep {}, mode {}{}",
            groups.len(),
            self.config.policy,
            self.config.action,
            if self.config.dry_run { " (dry run)" } else { "" }
        );
        for (index, group) in groups.into_iter().enumerate() {
            self.resolve_group(index, group, &mut report);
        }
        log::info!(
            "Resolution: {} kept, {} {}, {} failed",
            report.kept,
            if self.config.dry_run {
                report.planned
            } else {
                report.applied
            },
            if self.config.dry_run { "planned" } else { "applied" },
            report.failed
        );
        report
    }

    fn resolve_group(&self, index: usize, group: DuplicateGroup, report: &mut ResolutionReport) {
        report.groups += 1;
        let mut files = group.files;
        order_group(&mut files, self.config.policy);

        let mut members = files.into_iter();
        let Some(keep) = members.next() else {
            return;
        };
        log::info!("Group {}: Keeping {}", group.key, keep.relative_path);

        for member in members {
            let outcome = if self.config.dry_run {
                log::info!(
                    "  [DRY RUN] {} -> {}",
                    member.relative_path,
                    self.config.action
                );
                Outcome::Planned(self.config.action)
            } else {
                match self.apply(&keep, &member) {
                    Ok(()) => {
                        log::info!(
                            "  {} {}",
                            self.config.action.past_tense(),
                            member.relative_path
                        );
                        Outcome::Applied(self.config.action)
                    }
                    Err(e) => {
                        log::error!(
                            "  Failed to {} {}: {}",
                            self.config.action,
                            member.full_path.display(),
                            e
                        );
                        Outcome::Failed(e)
                    }
                }
            };
            report.push(index, member.full_path, outcome);
        }
        report.push(index, keep.full_path, Outcome::Kept);
    }

    /// Re-check survivor and member, then act on the member.
    fn apply(&self, keep: &FileRecord, member: &FileRecord) -> Result<(), ActionError> {
        if keep.full_path.symlink_metadata().is_err() {
            return Err(ActionError::SurvivorMissing(keep.full_path.clone()));
        }
        FileSnapshot::of(member).verify()?;

        match self.config.action {
            LinkAction::Delete => remove_member(&member.full_path),
            LinkAction::Symlink => replace_with_symlink(&keep.full_path, &member.full_path),
            LinkAction::Hardlink => replace_with_hardlink(&keep.full_path, &member.full_path),
            LinkAction::Shortcut => replace_with_shortcut(
                self.config.shortcut.as_ref(),
                &keep.full_path,
                &member.full_path,
            )
            .map(|shortcut| log::debug!("Shortcut written: {}", shortcut.display())),
        }
    }
}
