use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::{
    branch_color, BranchId, Result, Snapshot, TimelineEntry, Version, VersionId, VersionMetadata,
    VersionRecord, VersioningError, MAIN_BRANCH_COLOR,
};

/// Id of the placeholder version shown for a site that has never been saved.
pub const VIRTUAL_INITIAL_ID: &str = "initial";

/// Where the next save lands in the lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchAssignment {
    pub branch_id: BranchId,
    pub branch_color: String,
    pub parent_id: Option<VersionId>,
    /// True when this save is the first divergence from `main`.
    pub forked: bool,
}

/// Fork-on-write branch rule.
///
/// Saving from the tip, or from a version already off `main`, continues
/// that version's branch. Saving from an older `main` version starts a new
/// branch named after the parent. Virtual versions never act as parents.
pub fn determine_branch_for_save(
    active: Option<&VersionId>,
    versions: &[Version],
    latest: Option<&VersionId>,
) -> BranchAssignment {
    let real: Vec<&Version> = versions.iter().filter(|v| !v.is_virtual).collect();
    let latest = latest
        .and_then(|id| real.iter().find(|v| &v.id == id).copied())
        .or_else(|| real.iter().max_by_key(|v| v.version_number).copied());

    let Some(latest) = latest else {
        return BranchAssignment {
            branch_id: BranchId::main(),
            branch_color: MAIN_BRANCH_COLOR.to_string(),
            parent_id: None,
            forked: false,
        };
    };

    let parent = active
        .and_then(|id| real.iter().find(|v| &v.id == id).copied())
        .unwrap_or(latest);

    let colors = assigned_colors(versions);

    if parent.id == latest.id || !parent.branch_id().is_main() {
        let branch_id = parent.branch_id().clone();
        let color = parent
            .branch_color()
            .map(str::to_string)
            .unwrap_or_else(|| branch_color(&branch_id, &colors));
        return BranchAssignment {
            branch_id,
            branch_color: color,
            parent_id: Some(parent.id.clone()),
            forked: false,
        };
    }

    let branch_id = fork_branch_id(&parent.id, versions);
    let color = branch_color(&branch_id, &colors);
    debug!(
        "Saving from {} (not latest {}) forks new branch {}",
        parent.id, latest.id, branch_id
    );
    BranchAssignment {
        branch_id,
        branch_color: color,
        parent_id: Some(parent.id.clone()),
        forked: true,
    }
}

/// `branch-<parent>`, suffixed `-2`, `-3`… when an earlier fork already
/// took the name.
fn fork_branch_id(parent: &VersionId, versions: &[Version]) -> BranchId {
    let base = format!("branch-{}", parent);
    let taken = |candidate: &str| versions.iter().any(|v| v.branch_id().as_str() == candidate);
    if !taken(&base) {
        return BranchId::new(base);
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !taken(&candidate) {
            return BranchId::new(candidate);
        }
        n += 1;
    }
}

fn assigned_colors(versions: &[Version]) -> BTreeSet<String> {
    versions
        .iter()
        .filter_map(|v| v.metadata.branch_color.clone())
        .collect()
}

/// Ordered versions of one site, plus which one is loaded and which is the tip.
#[derive(Debug, Clone, Default)]
pub struct VersionLineage {
    versions: Vec<Version>,
    active: Option<VersionId>,
    latest: Option<VersionId>,
    warning: Option<String>,
}

impl VersionLineage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the list with freshly fetched records.
    ///
    /// The active version becomes the one whose number matches
    /// `loaded_version_number`, falling back to latest. An empty result
    /// yields a single virtual version built from `current`.
    pub fn apply_hydration(
        &mut self,
        records: Vec<VersionRecord>,
        current: &Snapshot,
        loaded_version_number: Option<u64>,
    ) -> usize {
        self.warning = None;
        self.versions = normalize_records(records);
        if self.versions.is_empty() {
            self.versions.push(virtual_initial(current));
        }
        self.refresh_latest();

        self.active = loaded_version_number
            .and_then(|n| self.versions.iter().find(|v| v.version_number == n))
            .map(|v| v.id.clone())
            .or_else(|| self.latest.clone());

        self.real_count()
    }

    /// Keeps whatever was loaded before and records a warning for the UI.
    pub fn hydration_failed(&mut self, reason: impl Into<String>, current: &Snapshot) {
        let reason = reason.into();
        warn!("Version history unavailable, showing stale timeline: {}", reason);
        if self.versions.is_empty() {
            self.versions.push(virtual_initial(current));
            self.refresh_latest();
            self.active = self.latest.clone();
        }
        self.warning = Some(reason);
    }

    pub fn determine_branch_for_save(&self) -> BranchAssignment {
        determine_branch_for_save(self.active.as_ref(), &self.versions, self.latest.as_ref())
    }

    /// Inserts a version returned by the server and makes it both the tip
    /// and the active version.
    ///
    /// Metadata echoed in the record's notes wins; `fallback` covers
    /// servers that drop notes.
    pub fn record_version(&mut self, record: VersionRecord, fallback: VersionMetadata) -> &Version {
        let mut metadata = VersionMetadata::from_notes(record.notes.as_deref()).unwrap_or(fallback);
        if metadata.branch_color.is_none() {
            metadata.branch_color = Some(self.color_for(&metadata.branch_id));
        }
        let version = Version {
            id: record.id,
            version_number: record.version_number,
            template_config: Snapshot::from_template_config(record.template_config),
            created_at: record.created_at,
            metadata,
            is_virtual: false,
        };
        let id = version.id.clone();

        self.versions.retain(|v| !v.is_virtual && v.id != id);
        self.versions.push(version);
        self.versions.sort_by_key(|v| v.version_number);
        self.refresh_latest();
        self.active = Some(id.clone());

        let idx = self
            .versions
            .iter()
            .position(|v| v.id == id)
            .unwrap_or(self.versions.len() - 1);
        &self.versions[idx]
    }

    /// Versions with a strictly greater number, oldest first.
    pub fn versions_newer_than(&self, version_number: u64) -> Vec<&Version> {
        self.versions
            .iter()
            .filter(|v| v.version_number > version_number)
            .collect()
    }

    pub fn timeline(&self) -> Vec<TimelineEntry> {
        self.versions
            .iter()
            .map(|v| TimelineEntry {
                id: v.id.clone(),
                version_number: v.version_number,
                created_at: v.created_at,
                title: v.metadata.title.clone(),
                short_title: v.metadata.short_title.clone(),
                change_list: v.metadata.change_list.clone(),
                branch_id: v.branch_id().clone(),
                branch_color: v
                    .branch_color()
                    .map(str::to_string)
                    .unwrap_or_else(|| self.color_for(v.branch_id())),
                parent_id: v.metadata.parent_id.clone(),
                is_active: self.active.as_ref() == Some(&v.id),
                is_latest: self.latest.as_ref() == Some(&v.id),
                is_virtual: v.is_virtual,
            })
            .collect()
    }

    pub fn set_active(&mut self, id: &VersionId) -> Result<&Version> {
        let idx = self
            .versions
            .iter()
            .position(|v| &v.id == id)
            .ok_or_else(|| VersioningError::VersionNotFound(id.clone()))?;
        self.active = Some(id.clone());
        Ok(&self.versions[idx])
    }

    pub fn get(&self, id: &VersionId) -> Option<&Version> {
        self.versions.iter().find(|v| &v.id == id)
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn active(&self) -> Option<&Version> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    pub fn latest(&self) -> Option<&Version> {
        self.latest.as_ref().and_then(|id| self.get(id))
    }

    pub fn active_version_id(&self) -> Option<&VersionId> {
        self.active.as_ref()
    }

    pub fn latest_version_id(&self) -> Option<&VersionId> {
        self.latest.as_ref()
    }

    pub fn is_viewing_latest(&self) -> bool {
        self.active.is_some() && self.active == self.latest
    }

    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Number of persisted (non-virtual) versions.
    pub fn real_count(&self) -> usize {
        self.versions.iter().filter(|v| !v.is_virtual).count()
    }

    /// Color already used by `branch`, or a fresh one.
    fn color_for(&self, branch: &BranchId) -> String {
        self.versions
            .iter()
            .find(|v| v.branch_id() == branch)
            .and_then(|v| v.metadata.branch_color.clone())
            .unwrap_or_else(|| branch_color(branch, &assigned_colors(&self.versions)))
    }

    fn refresh_latest(&mut self) {
        self.latest = self
            .versions
            .iter()
            .max_by_key(|v| v.version_number)
            .map(|v| v.id.clone());
    }
}

/// Parses notes, sorts ascending and stamps a color on every version so a
/// branch keeps one color across the whole timeline.
fn normalize_records(records: Vec<VersionRecord>) -> Vec<Version> {
    let mut versions: Vec<Version> = records
        .into_iter()
        .map(|record| {
            let metadata = VersionMetadata::from_notes(record.notes.as_deref()).unwrap_or_else(|| {
                VersionMetadata {
                    title: format!("Version {}", record.version_number),
                    short_title: format!("v{}", record.version_number),
                    change_list: record.change_summary.clone().into_iter().collect(),
                    ..VersionMetadata::default()
                }
            });
            Version {
                id: record.id,
                version_number: record.version_number,
                template_config: Snapshot::from_template_config(record.template_config),
                created_at: record.created_at,
                metadata,
                is_virtual: false,
            }
        })
        .collect();
    versions.sort_by_key(|v| v.version_number);

    let mut colors: BTreeMap<BranchId, String> = BTreeMap::new();
    for version in &versions {
        if let Some(color) = &version.metadata.branch_color {
            colors
                .entry(version.branch_id().clone())
                .or_insert_with(|| color.clone());
        }
    }
    for version in versions.iter_mut() {
        if version.metadata.branch_color.is_some() {
            continue;
        }
        let branch = version.branch_id().clone();
        let color = match colors.get(&branch) {
            Some(color) => color.clone(),
            None => {
                let taken: BTreeSet<String> = colors.values().cloned().collect();
                let color = branch_color(&branch, &taken);
                colors.insert(branch, color.clone());
                color
            }
        };
        version.metadata.branch_color = Some(color);
    }
    versions
}

fn virtual_initial(current: &Snapshot) -> Version {
    Version {
        id: VersionId::new(VIRTUAL_INITIAL_ID),
        version_number: 0,
        template_config: current.clone(),
        created_at: chrono::Utc::now(),
        metadata: VersionMetadata {
            title: "Initial version".to_string(),
            short_title: "Initial".to_string(),
            change_list: Vec::new(),
            branch_id: BranchId::main(),
            branch_color: Some(MAIN_BRANCH_COLOR.to_string()),
            parent_id: None,
        },
        is_virtual: true,
    }
}
