use crate::document::model::{ContentBlock, Layout, Step};
use crate::foundation::warning::AuthoringWarning;
use crate::layout::visibility::VisibilityScope;
use serde::Serialize;

/// Blocks that render in one layout slot, in authored order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSlot<'d> {
    /// Slot name as declared by the layout.
    pub name: &'d str,
    /// `false` when a feature-flag gate hides the whole slot.
    pub enabled: bool,
    /// Visible blocks.
    pub blocks: Vec<&'d ContentBlock>,
}

/// Output of [`SlotResolver::resolve`]: one entry per declared slot, in layout order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSlots<'d> {
    pub layout_type: &'d str,
    pub slots: Vec<ResolvedSlot<'d>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<AuthoringWarning>,
}

impl<'d> ResolvedSlots<'d> {
    /// Resolved slot named `name`.
    pub fn get(&self, name: &str) -> Option<&ResolvedSlot<'d>> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Visible block ids of slot `name`; empty if the slot is not declared.
    pub fn block_ids(&self, name: &str) -> Vec<&'d str> {
        self.get(name)
            .map(|s| s.blocks.iter().map(|b| b.id.as_str()).collect())
            .unwrap_or_default()
    }

    /// Every visible block, slot by slot.
    pub fn iter_blocks(&self) -> impl Iterator<Item = (&'d str, &'d ContentBlock)> + '_ {
        self.slots
            .iter()
            .flat_map(|s| s.blocks.iter().map(move |b| (s.name, *b)))
    }
}

/// Decides which blocks of a step render in which slot.
///
/// Every slot the layout declares gets an entry (possibly empty). A block is kept only if its
/// slot is declared, the slot's gate flag (if any) is on, and its visibility predicate (if any)
/// holds. Blocks in undeclared slots are dropped with an [`AuthoringWarning::UndeclaredSlot`].
pub struct SlotResolver;

impl SlotResolver {
    #[tracing::instrument(level = "debug", skip_all, fields(step = %step.id, layout = %layout.kind))]
    pub fn resolve<'d>(
        step: &'d Step,
        layout: &'d Layout,
        scope: &VisibilityScope<'_>,
    ) -> ResolvedSlots<'d> {
        let mut warnings = Vec::new();
        for (slot, blocks) in &step.slots {
            if layout.declares(slot) {
                continue;
            }
            for block in blocks {
                warnings.push(AuthoringWarning::UndeclaredSlot {
                    step: step.id.clone(),
                    slot: slot.clone(),
                    block: block.id.clone(),
                });
            }
        }

        let slots = layout
            .slots
            .iter()
            .map(|name| {
                let enabled = layout
                    .gate_for(name)
                    .is_none_or(|flag| scope.document.flag(flag));
                let blocks = if enabled {
                    step.slots
                        .get(name)
                        .map(|blocks| {
                            blocks
                                .iter()
                                .filter(|b| {
                                    b.visible_when.as_ref().is_none_or(|v| v.evaluate(scope))
                                })
                                .collect()
                        })
                        .unwrap_or_default()
                } else {
                    Vec::new()
                };
                ResolvedSlot {
                    name: name.as_str(),
                    enabled,
                    blocks,
                }
            })
            .collect();

        ResolvedSlots {
            layout_type: layout.kind.as_str(),
            slots,
            warnings,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layout/resolver.rs"]
mod tests;
