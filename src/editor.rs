//! Editing session driven by pointer events.
//!
//! The editor owns the current pixel buffer, the interaction state, both
//! kinds of selection, the version history and the request tracker. It does
//! no I/O: callers send the requests it prepares and report the results back
//! with [`Editor::finish`].
//!
//! Two selection paths exist side by side. The magic wand produces a
//! [`SelectionMask`] for on-screen highlighting only; the mask attached to an
//! edit request is always rendered from the rectangle selection.

use crate::adjust::Adjustments;
use crate::buffer::{Point, PixelBuffer};
use crate::client::EditRequest;
use crate::error::{Error, Result};
use crate::history::{Version, VersionHistory};
use crate::mask::render_mask;
use crate::request::{RequestKind, RequestToken, RequestTracker};
use crate::selection::{
    select_by_rectangle, select_by_similarity, Rectangle, SelectionMask, DEFAULT_THRESHOLD,
};
use crate::state::{EditorState, Event, StateMachine, Tool};

/// Where a pan gesture started.
#[derive(Debug, Clone, Copy)]
struct PanOrigin {
    pointer: Point,
    offset: (i32, i32),
}

/// An interactive editing session.
#[derive(Debug)]
pub struct Editor {
    buffer: Option<PixelBuffer>,
    loaded_version: Option<u64>,
    machine: StateMachine,
    threshold: f32,
    drag_start: Option<Point>,
    rectangle: Option<Rectangle>,
    wand_mask: Option<SelectionMask>,
    pan: Option<PanOrigin>,
    adjustments: Adjustments,
    history: VersionHistory,
    requests: RequestTracker,
    pending_prompt: Option<String>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::with_history(VersionHistory::default())
    }
}

impl Editor {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session with a custom history.
    #[must_use]
    pub fn with_history(history: VersionHistory) -> Self {
        Self {
            buffer: None,
            loaded_version: None,
            machine: StateMachine::default(),
            threshold: DEFAULT_THRESHOLD,
            drag_start: None,
            rectangle: None,
            wand_mask: None,
            pan: None,
            adjustments: Adjustments::default(),
            history,
            requests: RequestTracker::new(),
            pending_prompt: None,
        }
    }

    /// Start over with a freshly loaded image.
    ///
    /// Clears selections, history and outstanding requests and records the
    /// image as the first version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless idle, or an image error if
    /// the buffer cannot be encoded.
    pub fn open(&mut self, buffer: PixelBuffer) -> Result<&Version> {
        self.require_idle("Open")?;
        let url = buffer.to_data_url()?;
        log::info!("opened {}x{} image", buffer.width(), buffer.height());
        self.buffer = Some(buffer);
        self.clear_selection();
        self.adjustments = Adjustments::default();
        self.requests.cancel_all();
        self.history.clear();
        let id = self.history.push(url, None, self.adjustments).id;
        self.loaded_version = Some(id);
        self.history.current().ok_or(Error::NoImage)
    }

    /// The current version, if the loaded pixels belong to a different one.
    ///
    /// This is the case after a finished request and after undo / redo. The
    /// version's `image_url` has to be fetched and passed to
    /// [`load_current`](Self::load_current) before selecting again.
    #[must_use]
    pub fn pending_reload(&self) -> Option<&Version> {
        let current = self.history.current()?;
        (self.loaded_version != Some(current.id)).then_some(current)
    }

    /// Install the pixels of the current version. Selections are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless idle, or
    /// [`Error::NoImage`] if there is no version to attach the pixels to.
    pub fn load_current(&mut self, buffer: PixelBuffer) -> Result<()> {
        self.require_idle("Load")?;
        let id = self.history.current().map(|v| v.id).ok_or(Error::NoImage)?;
        log::debug!("loaded {}x{} pixels for version #{id}", buffer.width(), buffer.height());
        self.buffer = Some(buffer);
        self.loaded_version = Some(id);
        self.clear_selection();
        Ok(())
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> EditorState {
        self.machine.state()
    }

    /// Active tool.
    #[must_use]
    pub fn tool(&self) -> Tool {
        self.machine.tool()
    }

    /// Switch tools while idle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] during a gesture or request.
    pub fn set_tool(&mut self, tool: Tool) -> Result<()> {
        self.machine.set_tool(tool)
    }

    /// Magic wand threshold.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Set the magic wand threshold.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidThreshold`] for negative or NaN values.
    pub fn set_threshold(&mut self, threshold: f32) -> Result<()> {
        if threshold.is_nan() || threshold < 0.0 {
            return Err(Error::InvalidThreshold(threshold));
        }
        self.threshold = threshold;
        Ok(())
    }

    /// The loaded buffer.
    #[must_use]
    pub fn buffer(&self) -> Option<&PixelBuffer> {
        self.buffer.as_ref()
    }

    /// The rectangle selection, possibly with negative extents mid-drag.
    #[must_use]
    pub fn rectangle(&self) -> Option<Rectangle> {
        self.rectangle
    }

    /// The rectangle selection as a boolean mask, for display.
    #[must_use]
    pub fn rectangle_mask(&self) -> Option<SelectionMask> {
        let buffer = self.buffer.as_ref()?;
        let rect = self.rectangle?;
        Some(SelectionMask::from_rectangle(
            buffer.width(),
            buffer.height(),
            rect,
        ))
    }

    /// The latest magic wand selection, for display.
    #[must_use]
    pub fn wand_mask(&self) -> Option<&SelectionMask> {
        self.wand_mask.as_ref()
    }

    /// Current display adjustments, including the pan offset.
    #[must_use]
    pub fn adjustments(&self) -> Adjustments {
        self.adjustments
    }

    /// Set brightness and contrast, in percent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAdjustment`] for negative or non-finite values;
    /// the previous tone is kept.
    pub fn set_tone(&mut self, brightness: f32, contrast: f32) -> Result<()> {
        let brightness = Adjustments::validate_percent(brightness)?;
        let contrast = Adjustments::validate_percent(contrast)?;
        self.adjustments.brightness = brightness;
        self.adjustments.contrast = contrast;
        Ok(())
    }

    /// Version history.
    #[must_use]
    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    /// Drop both selections.
    pub fn clear_selection(&mut self) {
        self.rectangle = None;
        self.wand_mask = None;
        self.drag_start = None;
        self.pan = None;
    }

    /// Pointer pressed at `point` (buffer coordinates).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoImage`], [`Error::StaleImage`],
    /// [`Error::InvalidTransition`], or, for the magic wand,
    /// [`Error::OutOfBounds`]. On error nothing changes.
    pub fn pointer_down(&mut self, point: Point) -> Result<()> {
        let tool = self.machine.tool();
        self.machine.state().next(Event::PointerDown, tool)?;
        self.ensure_loaded()?;
        let buffer = self.buffer.as_ref().ok_or(Error::NoImage)?;

        match tool {
            Tool::Select => {
                self.drag_start = Some(point);
                self.rectangle = Some(select_by_rectangle(point, point));
            }
            Tool::MagicWand => {
                self.wand_mask = Some(select_by_similarity(buffer, point, self.threshold)?);
            }
            Tool::Move => {
                self.pan = Some(PanOrigin {
                    pointer: point,
                    offset: self.adjustments.offset,
                });
            }
        }
        self.machine.handle(Event::PointerDown)?;
        Ok(())
    }

    /// Pointer moved to `point`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] while a request is in flight.
    pub fn pointer_move(&mut self, point: Point) -> Result<()> {
        match self.machine.handle(Event::PointerMove)? {
            EditorState::Selecting => {
                if let Some(start) = self.drag_start {
                    self.rectangle = Some(select_by_rectangle(start, point));
                }
            }
            EditorState::Dragging => {
                if let Some(origin) = self.pan {
                    self.adjustments.offset = (
                        origin.offset.0.saturating_add(point.x.saturating_sub(origin.pointer.x)),
                        origin.offset.1.saturating_add(point.y.saturating_sub(origin.pointer.y)),
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Pointer released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if no gesture is in progress.
    pub fn pointer_up(&mut self) -> Result<()> {
        self.machine.handle(Event::PointerUp)?;
        self.drag_start = None;
        self.pan = None;
        Ok(())
    }

    /// Prepare an inpainting request for the current version.
    ///
    /// The mask is rendered from the rectangle selection at the buffer's
    /// size. The magic wand selection is not used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPrompt`], [`Error::NoImage`],
    /// [`Error::StaleImage`], [`Error::NoSelection`],
    /// [`Error::InvalidTransition`] or [`Error::EncodingFailure`]. On error nothing changes and no request
    /// should be sent.
    pub fn begin_edit(&mut self, prompt: &str) -> Result<(RequestToken, EditRequest)> {
        if prompt.trim().is_empty() {
            return Err(Error::EmptyPrompt);
        }
        self.machine
            .state()
            .next(Event::SubmitEdit, self.machine.tool())?;
        self.ensure_loaded()?;
        let buffer = self.buffer.as_ref().ok_or(Error::NoImage)?;
        let image_url = self
            .history
            .current()
            .map(|v| v.image_url.clone())
            .ok_or(Error::NoImage)?;
        let rect = self.rectangle.ok_or(Error::NoSelection)?;
        let mask = render_mask(buffer.width(), buffer.height(), rect)?;

        self.machine.handle(Event::SubmitEdit)?;
        let token = self.requests.issue(RequestKind::Edit);
        self.pending_prompt = Some(prompt.to_string());
        log::debug!("edit request #{} prepared", token.id());
        Ok((
            token,
            EditRequest {
                image_url,
                prompt: prompt.to_string(),
                mask,
            },
        ))
    }

    /// Prepare a text-to-image request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPrompt`] or [`Error::InvalidTransition`].
    pub fn begin_generation(&mut self, prompt: &str) -> Result<RequestToken> {
        if prompt.trim().is_empty() {
            return Err(Error::EmptyPrompt);
        }
        self.machine.handle(Event::SubmitGeneration)?;
        let token = self.requests.issue(RequestKind::Generation);
        self.pending_prompt = Some(prompt.to_string());
        log::debug!("generation request #{} prepared", token.id());
        Ok(token)
    }

    /// Complete a generation or edit request.
    ///
    /// On success the returned image URL becomes a new version. Either way
    /// the editor returns to idle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleResponse`] if `token` is not the latest request
    /// of its kind, and [`Error::InvalidTransition`] if no request is in
    /// flight or `token` is for a different kind than the one awaited. In
    /// both cases nothing changes. Otherwise passes through the request's own
    /// error.
    pub fn finish(&mut self, token: RequestToken, result: Result<String>) -> Result<Version> {
        if !self.requests.is_current(token) {
            log::warn!("dropping stale {:?} response #{}", token.kind(), token.id());
            return Err(Error::StaleResponse(token.id()));
        }
        let state = self.machine.state();
        let awaited = match state {
            EditorState::AwaitingGeneration => Some(RequestKind::Generation),
            EditorState::AwaitingEdit => Some(RequestKind::Edit),
            _ => None,
        };
        if awaited != Some(token.kind()) {
            return Err(Error::InvalidTransition {
                state: state.name(),
                event: Event::Finished.name(),
            });
        }
        self.requests.accept(token)?;
        self.machine.handle(Event::Finished)?;
        let prompt = self.pending_prompt.take();
        let url = result?;
        if token.kind() == RequestKind::Edit {
            self.clear_selection();
        }
        Ok(self.history.push(url, prompt, self.adjustments).clone())
    }

    /// Abandon the in-flight generation or edit. Its response will be stale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if nothing is in flight.
    pub fn cancel(&mut self) -> Result<()> {
        self.machine.handle(Event::Finished)?;
        self.requests.cancel_all();
        self.pending_prompt = None;
        log::info!("request cancelled");
        Ok(())
    }

    /// Issue a token for a request that does not change editor state
    /// (prompt enhancement, search).
    pub fn track(&mut self, kind: RequestKind) -> RequestToken {
        self.requests.issue(kind)
    }

    /// Accept a response for a token from [`track`](Self::track).
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleResponse`] if a newer request of the same kind
    /// was issued.
    pub fn accept(&mut self, token: RequestToken) -> Result<()> {
        self.requests.accept(token)
    }

    /// Step back one version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless idle.
    pub fn undo(&mut self) -> Result<Option<&Version>> {
        self.require_idle("Undo")?;
        let version = self.history.undo();
        if let Some(v) = version {
            self.adjustments = v.adjustments;
        }
        Ok(version)
    }

    /// Step forward one version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] unless idle.
    pub fn redo(&mut self) -> Result<Option<&Version>> {
        self.require_idle("Redo")?;
        let version = self.history.redo();
        if let Some(v) = version {
            self.adjustments = v.adjustments;
        }
        Ok(version)
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.buffer.is_none() {
            return Err(Error::NoImage);
        }
        match self.pending_reload() {
            Some(version) => Err(Error::StaleImage(version.id)),
            None => Ok(()),
        }
    }

    fn require_idle(&self, event: &'static str) -> Result<()> {
        let state = self.machine.state();
        if state == EditorState::Idle {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                state: state.name(),
                event,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ColorSample;
    use image::{Rgba, RgbaImage};

    fn editor_with(width: u32, height: u32) -> Editor {
        let mut editor = Editor::new();
        let img = RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        editor.open(PixelBuffer::new(img)).unwrap();
        editor
    }

    #[test]
    fn drag_builds_signed_rectangle() {
        let mut editor = editor_with(20, 10);
        editor.pointer_down(Point::new(10, 8)).unwrap();
        editor.pointer_move(Point::new(4, 2)).unwrap();
        assert_eq!(editor.rectangle(), Some(Rectangle::new(10, 8, -6, -6)));
        editor.pointer_up().unwrap();
        assert_eq!(editor.state(), EditorState::Idle);
        assert_eq!(editor.rectangle_mask().unwrap().count(), 36);
    }

    #[test]
    fn wand_out_of_bounds_leaves_state_untouched() {
        let mut editor = editor_with(20, 10);
        editor.set_tool(Tool::MagicWand).unwrap();
        assert!(matches!(
            editor.pointer_down(Point::new(20, 0)),
            Err(Error::OutOfBounds { .. })
        ));
        assert_eq!(editor.state(), EditorState::Idle);
        assert!(editor.wand_mask().is_none());

        editor.pointer_down(Point::new(0, 0)).unwrap();
        assert_eq!(editor.wand_mask().unwrap().count(), 100);
        editor.pointer_up().unwrap();
    }

    #[test]
    fn move_tool_pans_offset() {
        let mut editor = editor_with(20, 10);
        editor.set_tool(Tool::Move).unwrap();
        editor.pointer_down(Point::new(5, 5)).unwrap();
        editor.pointer_move(Point::new(8, 1)).unwrap();
        editor.pointer_up().unwrap();
        assert_eq!(editor.adjustments().offset, (3, -4));
        assert!(editor.rectangle().is_none());
    }

    #[test]
    fn pointer_down_without_image_fails() {
        let mut editor = Editor::new();
        assert!(matches!(
            editor.pointer_down(Point::new(0, 0)),
            Err(Error::NoImage)
        ));
        assert_eq!(editor.state(), EditorState::Idle);
    }

    #[test]
    fn edit_round_trip_records_version() {
        let mut editor = editor_with(20, 10);
        editor.pointer_down(Point::new(2, 2)).unwrap();
        editor.pointer_move(Point::new(6, 6)).unwrap();
        editor.pointer_up().unwrap();

        let (token, request) = editor.begin_edit("add a hat").unwrap();
        assert_eq!(editor.state(), EditorState::AwaitingEdit);
        assert_eq!((request.mask.width, request.mask.height), (20, 10));
        assert!(request.image_url.starts_with("data:image/png;base64,"));
        assert!(editor.pointer_down(Point::new(0, 0)).is_err());

        let version = editor
            .finish(token, Ok("https://example.com/out.png".to_string()))
            .unwrap();
        assert_eq!(version.prompt.as_deref(), Some("add a hat"));
        assert_eq!(editor.state(), EditorState::Idle);
        assert_eq!(editor.history().len(), 2);
        assert!(editor.rectangle().is_none());
    }

    #[test]
    fn failed_request_returns_to_idle_without_version() {
        let mut editor = editor_with(20, 10);
        let token = editor.begin_generation("a castle").unwrap();
        let err = editor
            .finish(token, Err(Error::Provider("boom".to_string())))
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        assert_eq!(editor.state(), EditorState::Idle);
        assert_eq!(editor.history().len(), 1);
    }

    #[test]
    fn cancelled_request_response_is_stale() {
        let mut editor = editor_with(20, 10);
        let token = editor.begin_generation("a castle").unwrap();
        editor.cancel().unwrap();
        assert!(matches!(
            editor.finish(token, Ok("late".to_string())),
            Err(Error::StaleResponse(_))
        ));
        assert_eq!(editor.history().len(), 1);
        assert_eq!(editor.state(), EditorState::Idle);
    }

    #[test]
    fn undo_restores_version_adjustments() {
        let mut editor = editor_with(20, 10);
        editor.set_tone(150.0, 80.0).unwrap();
        let token = editor.begin_generation("brighter").unwrap();
        editor.finish(token, Ok("u1".to_string())).unwrap();

        let back = editor.undo().unwrap().unwrap();
        assert_eq!(back.id, 0);
        assert_eq!(editor.adjustments(), Adjustments::default());
        let fwd = editor.redo().unwrap().unwrap();
        assert_eq!(fwd.image_url, "u1");
        assert!((editor.adjustments().brightness - 150.0).abs() < f32::EPSILON);
    }

    #[test]
    fn finish_rejects_token_of_another_kind() {
        let mut editor = editor_with(20, 10);
        let search = editor.track(RequestKind::Search);
        let generation = editor.begin_generation("a castle").unwrap();

        assert!(matches!(
            editor.finish(search, Ok("search-result".to_string())),
            Err(Error::InvalidTransition { event: "Finished", .. })
        ));
        assert_eq!(editor.state(), EditorState::AwaitingGeneration);
        assert_eq!(editor.history().len(), 1);

        let version = editor.finish(generation, Ok("castle.png".to_string())).unwrap();
        assert_eq!(version.image_url, "castle.png");
        assert_eq!(editor.history().len(), 2);
        // The search token was not consumed by the failed finish.
        editor.accept(search).unwrap();
    }

    #[test]
    fn finish_while_idle_is_invalid() {
        let mut editor = editor_with(20, 10);
        let token = editor.track(RequestKind::Generation);
        assert!(matches!(
            editor.finish(token, Ok("x".to_string())),
            Err(Error::InvalidTransition { state: "Idle", .. })
        ));
        assert_eq!(editor.history().len(), 1);
    }

    #[test]
    fn new_version_must_be_loaded_before_selecting() {
        let mut editor = editor_with(20, 10);
        let token = editor.begin_generation("a castle").unwrap();
        let version = editor
            .finish(token, Ok("https://example.com/castle.png".to_string()))
            .unwrap();
        assert_eq!(editor.pending_reload().map(|v| v.id), Some(version.id));
        assert!(matches!(
            editor.pointer_down(Point::new(1, 1)),
            Err(Error::StaleImage(id)) if id == version.id
        ));
        assert!(matches!(editor.begin_edit("a moat"), Err(Error::StaleImage(_))));
        assert_eq!(editor.state(), EditorState::Idle);

        editor
            .load_current(PixelBuffer::filled(30, 15, [0, 255, 0, 255]))
            .unwrap();
        assert!(editor.pending_reload().is_none());
        editor.set_tool(Tool::MagicWand).unwrap();
        editor.pointer_down(Point::new(25, 10)).unwrap();
        editor.pointer_up().unwrap();
        assert_eq!(editor.wand_mask().unwrap().count(), 30 * 15);
    }

    #[test]
    fn undo_to_uploaded_version_reloads_from_data_url() {
        let mut editor = editor_with(20, 10);
        let token = editor.begin_generation("night").unwrap();
        editor.finish(token, Ok("u1".to_string())).unwrap();
        editor
            .load_current(PixelBuffer::filled(20, 10, [0, 0, 0, 255]))
            .unwrap();

        let back = editor.undo().unwrap().unwrap().clone();
        assert_eq!(editor.pending_reload().map(|v| v.id), Some(back.id));
        editor
            .load_current(PixelBuffer::from_data_url(&back.image_url).unwrap())
            .unwrap();
        assert!(editor.pending_reload().is_none());
        assert_eq!(
            editor.buffer().unwrap().sample(Point::new(0, 0)).unwrap(),
            ColorSample { r: 255, g: 0, b: 0 }
        );
    }

    #[test]
    fn invalid_tone_is_rejected_and_previous_kept() {
        let mut editor = editor_with(4, 4);
        editor.set_tone(120.0, 90.0).unwrap();
        assert!(matches!(
            editor.set_tone(f32::NAN, 100.0),
            Err(Error::InvalidAdjustment(_))
        ));
        assert!(editor.set_tone(100.0, -5.0).is_err());
        assert!((editor.adjustments().brightness - 120.0).abs() < f32::EPSILON);
        assert!((editor.adjustments().contrast - 90.0).abs() < f32::EPSILON);
    }

    #[test]
    fn tracked_requests_supersede_each_other() {
        let mut editor = Editor::new();
        let first = editor.track(RequestKind::Search);
        let second = editor.track(RequestKind::Search);
        assert!(editor.accept(first).is_err());
        editor.accept(second).unwrap();
    }
}
