//! Interaction modes for graph gestures.
//!
//! # Responsibility
//! - Decide what a node click means: open the editor or pick a link endpoint.
//! - Emit side effects for the session to run; perform no I/O itself.
//!
//! # Invariants
//! - Editing and connecting are mutually exclusive.
//! - Entering `Editing` always starts in source view (`preview == false`).
//! - A self-link click keeps the pending source so another target can be picked.

use crate::model::node::NodeId;
use log::debug;

/// Current interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Browsing,
    Editing {
        node: NodeId,
        /// Markdown preview shown instead of the source editor.
        preview: bool,
    },
    Connecting {
        source: Option<NodeId>,
    },
}

/// Work the session must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Re-fetch the node's content and show the editor.
    OpenEditor(NodeId),
    /// Flush pending autosave for the node and hide the editor.
    CloseEditor(NodeId),
    /// Validate and persist a link.
    CreateLink { source: NodeId, target: NodeId },
    /// Connect mode entered; ask for a source node.
    PromptSource,
    /// Source picked; ask for a target.
    SourceChosen(NodeId),
    /// Target equals source; source stays pending.
    SelfLinkRejected(NodeId),
    ClearStatus,
}

#[derive(Debug, Default)]
pub struct InteractionMachine {
    mode: Mode,
}

impl InteractionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Node whose editor is open, if any.
    pub fn editing(&self) -> Option<NodeId> {
        match self.mode {
            Mode::Editing { node, .. } => Some(node),
            _ => None,
        }
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self.mode, Mode::Connecting { .. })
    }

    pub fn node_clicked(&mut self, id: NodeId) -> Vec<Effect> {
        let effects = match self.mode {
            Mode::Browsing => self.enter_editing(id),
            Mode::Editing { node, .. } if node == id => Vec::new(),
            Mode::Editing { node, .. } => {
                let mut effects = vec![Effect::CloseEditor(node)];
                effects.extend(self.enter_editing(id));
                effects
            }
            Mode::Connecting { source: None } => {
                self.mode = Mode::Connecting { source: Some(id) };
                vec![Effect::SourceChosen(id)]
            }
            Mode::Connecting {
                source: Some(source),
            } if source == id => vec![Effect::SelfLinkRejected(id)],
            Mode::Connecting {
                source: Some(source),
            } => {
                self.mode = Mode::Browsing;
                vec![
                    Effect::ClearStatus,
                    Effect::CreateLink {
                        source,
                        target: id,
                    },
                ]
            }
        };
        debug!(
            "event=node_click module=interaction node={} mode={:?}",
            id, self.mode
        );
        effects
    }

    /// Enters or leaves connect mode. Closes an open editor first.
    pub fn toggle_connect(&mut self) -> Vec<Effect> {
        match self.mode {
            Mode::Browsing => {
                self.mode = Mode::Connecting { source: None };
                vec![Effect::PromptSource]
            }
            Mode::Editing { node, .. } => {
                self.mode = Mode::Connecting { source: None };
                vec![Effect::CloseEditor(node), Effect::PromptSource]
            }
            Mode::Connecting { .. } => self.cancel(),
        }
    }

    /// Abandons link creation.
    pub fn cancel(&mut self) -> Vec<Effect> {
        match self.mode {
            Mode::Connecting { .. } => {
                self.mode = Mode::Browsing;
                vec![Effect::ClearStatus]
            }
            _ => Vec::new(),
        }
    }

    pub fn close_editor(&mut self) -> Vec<Effect> {
        match self.mode {
            Mode::Editing { node, .. } => {
                self.mode = Mode::Browsing;
                vec![Effect::CloseEditor(node)]
            }
            _ => Vec::new(),
        }
    }

    /// Flips the markdown preview flag. Returns the new value while editing.
    pub fn toggle_preview(&mut self) -> Option<bool> {
        match &mut self.mode {
            Mode::Editing { preview, .. } => {
                *preview = !*preview;
                Some(*preview)
            }
            _ => None,
        }
    }

    /// Opens `id` from any mode (search teleport).
    pub fn open(&mut self, id: NodeId) -> Vec<Effect> {
        match self.mode {
            Mode::Connecting { .. } => {
                let mut effects = self.cancel();
                effects.extend(self.enter_editing(id));
                effects
            }
            _ => self.node_clicked(id),
        }
    }

    /// Returns to `Browsing` from any mode.
    pub fn reset(&mut self) -> Vec<Effect> {
        match self.mode {
            Mode::Browsing => Vec::new(),
            Mode::Editing { .. } => self.close_editor(),
            Mode::Connecting { .. } => self.cancel(),
        }
    }

    fn enter_editing(&mut self, id: NodeId) -> Vec<Effect> {
        self.mode = Mode::Editing {
            node: id,
            preview: false,
        };
        vec![Effect::OpenEditor(id)]
    }
}

#[cfg(test)]
mod tests {
    use super::{Effect, InteractionMachine, Mode};
    use crate::model::node::NodeId;

    #[test]
    fn preview_resets_when_editor_reopens() {
        let mut machine = InteractionMachine::new();
        machine.node_clicked(NodeId(1));
        assert_eq!(machine.toggle_preview(), Some(true));

        machine.node_clicked(NodeId(2));
        assert_eq!(
            machine.mode(),
            Mode::Editing {
                node: NodeId(2),
                preview: false
            }
        );
    }

    #[test]
    fn toggle_preview_outside_editor_is_ignored() {
        let mut machine = InteractionMachine::new();
        assert_eq!(machine.toggle_preview(), None);
        machine.toggle_connect();
        assert_eq!(machine.toggle_preview(), None);
    }

    #[test]
    fn teleport_while_connecting_cancels_first() {
        let mut machine = InteractionMachine::new();
        machine.toggle_connect();
        machine.node_clicked(NodeId(4));

        let effects = machine.open(NodeId(7));
        assert_eq!(
            effects,
            vec![Effect::ClearStatus, Effect::OpenEditor(NodeId(7))]
        );
        assert_eq!(machine.editing(), Some(NodeId(7)));
    }
}
