//! Merges the selection sources of the host and this panel into one
//! authoritative selection.

use crate::state::host::HostState;

/// Scope tag written on extended selections owned by this panel.
pub const SELECTION_SCOPE: &str = "3d-embeddings-selection";

/// A named selection source, in the order they are consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionTier {
    /// Samples owning selected patches; only when the run has no patches field.
    PatchSamples,
    /// Patch (label) ids in the run's patches field.
    Patches,
    /// The host's general sample selection.
    Samples,
    /// Plot-local selection not yet promoted to the host.
    Plot,
    /// A selection scope imposed through the host's extended selection.
    Extended,
}

/// Highest precedence first. The first non-empty tier wins outright.
pub const PRECEDENCE: [SelectionTier; 5] = [
    SelectionTier::PatchSamples,
    SelectionTier::Patches,
    SelectionTier::Samples,
    SelectionTier::Plot,
    SelectionTier::Extended,
];

/// Rendering emphasis for a resolved selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleTag {
    Selected,
    Plot,
    Extended,
}

impl SelectionTier {
    pub fn style(&self) -> StyleTag {
        match self {
            SelectionTier::PatchSamples | SelectionTier::Patches | SelectionTier::Samples => {
                StyleTag::Selected
            }
            SelectionTier::Plot => StyleTag::Plot,
            SelectionTier::Extended => StyleTag::Extended,
        }
    }

    /// On a patch run these tiers hold patch ids; the others hold sample ids.
    pub fn holds_patch_ids(&self) -> bool {
        matches!(self, SelectionTier::Patches | SelectionTier::Plot | SelectionTier::Extended)
    }
}

/// Current contents of every source, read at one instant.
#[derive(Debug, Clone, Default)]
pub struct SelectionSources {
    pub patches_field: Option<String>,
    pub patch_samples: Vec<String>,
    pub patches: Vec<String>,
    pub samples: Vec<String>,
    pub plot: Vec<String>,
    pub extended: Option<Vec<String>>,
    pub extended_scope: Option<String>,
}

impl SelectionSources {
    fn tier(&self, tier: SelectionTier) -> Option<&[String]> {
        let ids: &[String] = match tier {
            SelectionTier::PatchSamples if self.patches_field.is_some() => return None,
            SelectionTier::PatchSamples => &self.patch_samples,
            SelectionTier::Patches => &self.patches,
            SelectionTier::Samples => &self.samples,
            SelectionTier::Plot => &self.plot,
            SelectionTier::Extended => self.extended.as_deref().unwrap_or_default(),
        };
        (!ids.is_empty()).then_some(ids)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSelection {
    pub ids: Vec<String>,
    pub tier: SelectionTier,
    pub style: StyleTag,
    /// The extended selection scope belongs to someone else.
    pub is_external: bool,
}

/// Pick the highest-precedence non-empty source. `None` means no
/// selection anywhere; an empty id list is never returned.
pub fn resolve(sources: &SelectionSources) -> Option<ResolvedSelection> {
    let is_external = sources.extended_scope.as_deref() != Some(SELECTION_SCOPE);
    PRECEDENCE.iter().find_map(|&tier| {
        sources.tier(tier).map(|ids| ResolvedSelection {
            ids: ids.to_vec(),
            tier,
            style: tier.style(),
            is_external,
        })
    })
}

/// Screen-space outline of the last lasso gesture.
pub type LassoGeometry = Vec<[f32; 2]>;

/// Owns the plot-local selection source and reads every other one from
/// the host.
#[derive(Debug, Clone, Default)]
pub struct SelectionResolver {
    plot_selection: Vec<String>,
    lasso: LassoGeometry,
}

impl SelectionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plot_selection(&self) -> &[String] {
        &self.plot_selection
    }

    pub fn lasso(&self) -> &[[f32; 2]] {
        &self.lasso
    }

    pub fn sources(&self, host: &HostState, patches_field: Option<&str>) -> SelectionSources {
        let extended = host.extended_selection();
        SelectionSources {
            patches_field: patches_field.map(str::to_string),
            patch_samples: host.selected_patch_samples(),
            patches: host.selected_patch_ids(patches_field),
            samples: host.selected_samples().to_vec(),
            plot: self.plot_selection.clone(),
            extended: extended.selection.clone(),
            extended_scope: extended.scope.clone(),
        }
    }

    /// Recomputed on every call; nothing is cached.
    pub fn resolve(&self, host: &HostState, patches_field: Option<&str>) -> Option<ResolvedSelection> {
        resolve(&self.sources(host, patches_field))
    }

    /// Whether the host's extended selection is owned by another scope.
    pub fn selection_is_external(&self, host: &HostState) -> bool {
        host.extended_selection().scope.as_deref() != Some(SELECTION_SCOPE)
    }

    /// Replace the plot-local selection. `None` clears every source this
    /// panel may touch. The host sample selection is always cleared first
    /// so the two never disagree.
    pub fn set_selection(&mut self, host: &mut HostState, ids: Option<Vec<String>>, lasso: LassoGeometry) {
        host.set_selected_samples(Vec::new());
        match ids {
            Some(ids) => {
                tracing::debug!("Plot selection set to {} points", ids.len());
                host.set_extended_selection(Some(ids.clone()), SELECTION_SCOPE);
                self.plot_selection = ids;
                self.lasso = lasso;
            }
            None => self.clear_selection(host),
        }
    }

    /// Add or remove one id from the plot-local selection.
    pub fn toggle(&mut self, host: &mut HostState, id: &str) {
        let mut ids = self.plot_selection.clone();
        if let Some(pos) = ids.iter().position(|s| s == id) {
            ids.remove(pos);
        } else {
            ids.push(id.to_string());
        }
        if ids.is_empty() {
            self.set_selection(host, None, Vec::new());
        } else {
            self.set_selection(host, Some(ids), Vec::new());
        }
    }

    /// Reset the plot-local selection, the host sample selection and any
    /// extended selection this panel owns. Idempotent.
    pub fn clear_selection(&mut self, host: &mut HostState) {
        self.plot_selection.clear();
        self.lasso.clear();
        host.set_selected_samples(Vec::new());
        if !self.selection_is_external(host) {
            host.reset_extended_selection();
        }
    }
}
