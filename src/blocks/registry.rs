//! Type-indexed table of block renderers.
//!
//! The runtime never looks inside a block's `config`; it only dispatches on the type tag. Unknown
//! tags render a visible placeholder instead of failing, so one bad block never hides its
//! siblings.

use crate::document::model::{ContentBlock, SlideDocument};
use crate::events::bus::{BlockEmitter, panic_message};
use crate::foundation::warning::AuthoringWarning;
use serde::Serialize;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

/// Everything a renderer receives for one block.
#[derive(Debug, Clone)]
pub struct BlockProps<'a> {
    pub id: &'a str,
    pub config: &'a serde_json::Value,
    pub style_preset: Option<&'a str>,
    pub class_name: Option<&'a str>,
    /// Handle for reporting learner interactions on this block.
    pub emitter: &'a BlockEmitter,
}

/// Renders one block type.
///
/// The returned JSON is handed to the host's UI layer untouched. Interactive renderers keep a
/// clone of `props.emitter` and emit events through it.
pub trait BlockRenderer {
    fn render(&self, props: &BlockProps<'_>) -> anyhow::Result<serde_json::Value>;
}

/// Renderer backed by a closure; build it with [`renderer_fn`].
pub struct FnRenderer<F>(F);

/// Wrap a closure as a [`BlockRenderer`].
pub fn renderer_fn<F>(f: F) -> FnRenderer<F>
where
    F: Fn(&BlockProps<'_>) -> anyhow::Result<serde_json::Value>,
{
    FnRenderer(f)
}

impl<F> BlockRenderer for FnRenderer<F>
where
    F: Fn(&BlockProps<'_>) -> anyhow::Result<serde_json::Value>,
{
    fn render(&self, props: &BlockProps<'_>) -> anyhow::Result<serde_json::Value> {
        (self.0)(props)
    }
}

/// Built-in renderer that echoes the block's config and style preset.
///
/// Useful for previews and for block types whose UI lives entirely on the host side.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRenderer;

impl BlockRenderer for PassthroughRenderer {
    fn render(&self, props: &BlockProps<'_>) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::json!({
            "config": props.config,
            "stylePreset": props.style_preset,
            "className": props.class_name,
        }))
    }
}

/// What the host receives for one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RenderBody {
    /// Renderer output.
    Content { content: serde_json::Value },
    /// Fallback placeholder for an unregistered type tag.
    Unsupported { message: String },
    /// Renderer returned an error; shown in place of the block.
    Failed { message: String },
}

/// One rendered block plus the emitter the host wires UI interactions to.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedBlock {
    pub block_id: String,
    pub block_type: String,
    pub body: RenderBody,
    #[serde(skip)]
    pub emitter: Option<BlockEmitter>,
}

impl RenderedBlock {
    /// `true` for the unsupported-type placeholder.
    pub fn is_placeholder(&self) -> bool {
        matches!(self.body, RenderBody::Unsupported { .. })
    }
}

/// Block type tag -> renderer. Later registrations for a tag replace earlier ones.
#[derive(Default)]
pub struct BlockRegistry {
    renderers: BTreeMap<String, Box<dyn BlockRenderer>>,
}

impl std::fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("types", &self.types())
            .finish()
    }
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with [`PassthroughRenderer`] registered for each tag in `types`.
    pub fn with_passthrough<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut reg = Self::new();
        for t in types {
            reg.register(t, PassthroughRenderer);
        }
        reg
    }

    /// Register `renderer` for `block_type`, returning the renderer it replaced.
    pub fn register<R>(
        &mut self,
        block_type: impl Into<String>,
        renderer: R,
    ) -> Option<Box<dyn BlockRenderer>>
    where
        R: BlockRenderer + 'static,
    {
        let block_type = block_type.into();
        let prev = self.renderers.insert(block_type.clone(), Box::new(renderer));
        if prev.is_some() {
            tracing::debug!(block_type = %block_type, "block renderer replaced");
        }
        prev
    }

    pub fn resolve(&self, block_type: &str) -> Option<&dyn BlockRenderer> {
        self.renderers.get(block_type).map(|r| r.as_ref())
    }

    pub fn contains(&self, block_type: &str) -> bool {
        self.renderers.contains_key(block_type)
    }

    /// Registered type tags, sorted.
    pub fn types(&self) -> Vec<&str> {
        self.renderers.keys().map(String::as_str).collect()
    }

    /// Render `block` of step `step_id`.
    ///
    /// Never fails: an unknown tag yields the placeholder plus a warning, a renderer error yields
    /// [`RenderBody::Failed`].
    pub fn render(
        &self,
        step_id: &str,
        block: &ContentBlock,
        emitter: BlockEmitter,
    ) -> (RenderedBlock, Option<AuthoringWarning>) {
        let Some(renderer) = self.resolve(&block.block_type) else {
            let warning = AuthoringWarning::UnknownBlockType {
                step: step_id.to_owned(),
                block: block.id.clone(),
                block_type: block.block_type.clone(),
            };
            let rendered = RenderedBlock {
                block_id: block.id.clone(),
                block_type: block.block_type.clone(),
                body: RenderBody::Unsupported {
                    message: format!("unsupported block type '{}'", block.block_type),
                },
                emitter: None,
            };
            return (rendered, Some(warning));
        };

        let props = BlockProps {
            id: &block.id,
            config: &block.config,
            style_preset: block.style_preset.as_deref(),
            class_name: block.class_name.as_deref(),
            emitter: &emitter,
        };
        let body = match panic::catch_unwind(AssertUnwindSafe(|| renderer.render(&props))) {
            Ok(Ok(content)) => RenderBody::Content { content },
            Ok(Err(e)) => {
                tracing::warn!(block = %block.id, block_type = %block.block_type, "render failed: {e:#}");
                RenderBody::Failed {
                    message: format!("{e:#}"),
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(block = %block.id, block_type = %block.block_type, "renderer {message}");
                RenderBody::Failed { message }
            }
        };

        (
            RenderedBlock {
                block_id: block.id.clone(),
                block_type: block.block_type.clone(),
                body,
                emitter: Some(emitter),
            },
            None,
        )
    }

    /// Warn about every block of `doc` whose type tag has no renderer.
    pub fn lint(&self, doc: &SlideDocument) -> Vec<AuthoringWarning> {
        doc.steps
            .iter()
            .flat_map(|step| {
                step.blocks()
                    .filter(|(_, b)| !self.contains(&b.block_type))
                    .map(|(_, b)| AuthoringWarning::UnknownBlockType {
                        step: step.id.clone(),
                        block: b.id.clone(),
                        block_type: b.block_type.clone(),
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/blocks/registry.rs"]
mod tests;
