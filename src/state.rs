//! Editor interaction state machine.
//!
//! One explicit state replaces the loose "selecting / dragging / generating /
//! editing" flags, so combinations such as selecting while dragging cannot
//! be represented.

use std::fmt;

use crate::error::{Error, Result};

/// The active pointer tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Drag out a rectangle selection.
    #[default]
    Select,
    /// Pan the image.
    Move,
    /// Similarity selection from a clicked seed.
    MagicWand,
}

/// Where the editor currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorState {
    /// Waiting for input.
    #[default]
    Idle,
    /// A selection gesture is in progress.
    Selecting,
    /// The image is being panned.
    Dragging,
    /// A text-to-image request is in flight.
    AwaitingGeneration,
    /// An inpainting request is in flight.
    AwaitingEdit,
}

/// Inputs that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Pointer pressed on the canvas.
    PointerDown,
    /// Pointer moved over the canvas.
    PointerMove,
    /// Pointer released.
    PointerUp,
    /// A generation request was sent.
    SubmitGeneration,
    /// An edit request was sent.
    SubmitEdit,
    /// The in-flight request completed, successfully or not.
    Finished,
}

impl EditorState {
    /// Short name for messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Selecting => "Selecting",
            Self::Dragging => "Dragging",
            Self::AwaitingGeneration => "AwaitingGeneration",
            Self::AwaitingEdit => "AwaitingEdit",
        }
    }

    /// Whether a network request is outstanding.
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::AwaitingGeneration | Self::AwaitingEdit)
    }

    /// The state reached from `self` on `event` with `tool` active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if `event` is not accepted in
    /// this state.
    pub fn next(self, event: Event, tool: Tool) -> Result<Self> {
        use EditorState::{AwaitingEdit, AwaitingGeneration, Dragging, Idle, Selecting};

        let next = match (self, event) {
            (Idle, Event::PointerDown) => match tool {
                Tool::Move => Dragging,
                Tool::Select | Tool::MagicWand => Selecting,
            },
            (Idle, Event::PointerMove) => Idle,
            (Selecting, Event::PointerMove) => Selecting,
            (Dragging, Event::PointerMove) => Dragging,
            (Selecting | Dragging, Event::PointerUp) => Idle,
            (Idle, Event::SubmitGeneration) => AwaitingGeneration,
            (Idle, Event::SubmitEdit) => AwaitingEdit,
            (AwaitingGeneration | AwaitingEdit, Event::Finished) => Idle,
            (state, event) => {
                return Err(Error::InvalidTransition {
                    state: state.name(),
                    event: event.name(),
                })
            }
        };
        Ok(next)
    }
}

impl fmt::Display for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Event {
    /// Short name for messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::PointerDown => "PointerDown",
            Self::PointerMove => "PointerMove",
            Self::PointerUp => "PointerUp",
            Self::SubmitGeneration => "SubmitGeneration",
            Self::SubmitEdit => "SubmitEdit",
            Self::Finished => "Finished",
        }
    }
}

/// The current state together with the active tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateMachine {
    state: EditorState,
    tool: Tool,
}

impl StateMachine {
    /// Current state.
    #[must_use]
    pub fn state(&self) -> EditorState {
        self.state
    }

    /// Active tool.
    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switch tools. Only allowed while idle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if a gesture or request is in
    /// progress.
    pub fn set_tool(&mut self, tool: Tool) -> Result<()> {
        if self.state != EditorState::Idle {
            return Err(Error::InvalidTransition {
                state: self.state.name(),
                event: "SetTool",
            });
        }
        self.tool = tool;
        Ok(())
    }

    /// Apply `event`, leaving the state untouched on error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] for rejected events.
    pub fn handle(&mut self, event: Event) -> Result<EditorState> {
        let next = self.state.next(event, self.tool)?;
        if next != self.state {
            log::trace!("editor {} -> {} on {}", self.state, next, event.name());
        }
        self.state = next;
        Ok(next)
    }
}
