// ============================================================================
// EDIT SESSION: mode machine and request lifecycle
// ============================================================================
//
// One aggregate owns the history, the layers and every piece of transient
// state. All mutation goes through the methods below so the "clear transients
// whenever the active raster changes" rule lives in exactly one place.
//
// Collaborator calls run on the rayon pool and report back over a channel;
// panics are caught there. Results are applied in `poll` / `wait` on the
// owning thread, so the session itself stays single-threaded.

use std::sync::mpsc;
use std::sync::Arc;

use crate::components::history::HistoryStack;
use crate::components::layers::{paint_order, Layer, LayerId, LayerModel, LayerPatch, TextStyle};
use crate::error::{EditError, EditResult};
use crate::geometry::{
    client_to_local, constrain_to_aspect, display_to_natural_pixel, rect_from_corners, within_bounds,
    AspectConstraint, PixelPoint, Point, Rect, Scale, Size,
};
use crate::io::ExportSink;
use crate::ops::collaborator::{
    CollaboratorError, CollaboratorReply, EditCollaborator, EditInstruction, GenerationAspect, InstructionKind,
    Suggestion,
};
use crate::ops::adjustments::MAX_UPSCALE_FACTOR;
use crate::ops::compositor::{flatten, rasterize_crop};
use crate::ops::text::OverlayRenderer;
use crate::raster::Raster;
use crate::settings::Settings;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// No image loaded.
    #[default]
    Start,
    /// Prompting the generator, still no image.
    Generate,
    /// An image is loaded; the full tool surface is active.
    Edit,
}

/// Active tool tab. Commits leave it alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    #[default]
    Retouch,
    Adjust,
    Filters,
    Crop,
    Text,
}

/// Lifecycle of the single collaborator request slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestState {
    #[default]
    Idle,
    Pending(InstructionKind),
    Succeeded(InstructionKind),
    Failed(InstructionKind, String),
}

impl RequestState {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending(_))
    }
}

/// Pointer interaction on the image surface.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum InteractionState {
    #[default]
    Idle,
    /// `grab_offset` is pointer minus layer origin at drag start, in container space.
    DraggingLayer { id: LayerId, grab_offset: Point },
}

/// A retouch target: the marker position on screen and the pixel it names.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hotspot {
    pub display: Point,
    pub natural: PixelPoint,
}

/// A display-space crop selection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropSelection {
    pub rect: Rect,
    pub aspect: AspectConstraint,
}

struct JobResult {
    instruction: EditInstruction,
    result: Result<CollaboratorReply, CollaboratorError>,
}

pub struct Session {
    mode: Mode,
    history: HistoryStack,
    layers: LayerModel,
    crop: Option<CropSelection>,
    crop_aspect: AspectConstraint,
    hotspot: Option<Hotspot>,
    error: Option<String>,
    request: RequestState,
    interaction: InteractionState,
    comparing: bool,
    tool: Tool,
    suggestions: Vec<Suggestion>,
    text_defaults: TextStyle,
    device_pixel_ratio: f32,

    collaborator: Arc<dyn EditCollaborator>,
    renderer: Arc<dyn OverlayRenderer>,
    job_sender: mpsc::Sender<JobResult>,
    job_receiver: mpsc::Receiver<JobResult>,
}

impl Session {
    pub fn new(
        settings: &Settings,
        collaborator: Arc<dyn EditCollaborator>,
        renderer: Arc<dyn OverlayRenderer>,
    ) -> Self {
        let (job_sender, job_receiver) = mpsc::channel();
        Self {
            mode: Mode::Start,
            history: HistoryStack::new(),
            layers: LayerModel::new(),
            crop: None,
            crop_aspect: AspectConstraint::Free,
            hotspot: None,
            error: None,
            request: RequestState::Idle,
            interaction: InteractionState::Idle,
            comparing: false,
            tool: Tool::default(),
            suggestions: Vec::new(),
            text_defaults: settings.text.clone(),
            device_pixel_ratio: sanitize_dpr(settings.device_pixel_ratio),
            collaborator,
            renderer,
            job_sender,
            job_receiver,
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn current(&self) -> Option<&Raster> {
        self.history.current()
    }

    pub fn original(&self) -> Option<&Raster> {
        self.history.original()
    }

    /// False while a request is pending.
    pub fn can_undo(&self) -> bool {
        !self.busy() && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        !self.busy() && self.history.can_redo()
    }

    pub fn layers(&self) -> &LayerModel {
        &self.layers
    }

    pub fn crop(&self) -> Option<&CropSelection> {
        self.crop.as_ref()
    }

    pub fn crop_aspect(&self) -> AspectConstraint {
        self.crop_aspect
    }

    pub fn hotspot(&self) -> Option<&Hotspot> {
        self.hotspot.as_ref()
    }

    /// Current error message. While set, it preempts all other rendering.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn request_state(&self) -> &RequestState {
        &self.request
    }

    /// True iff a collaborator request is in flight.
    pub fn busy(&self) -> bool {
        self.request.is_pending()
    }

    pub fn interaction(&self) -> InteractionState {
        self.interaction
    }

    pub fn is_comparing(&self) -> bool {
        self.comparing
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn text_defaults(&self) -> &TextStyle {
        &self.text_defaults
    }

    pub fn set_text_defaults(&mut self, style: TextStyle) {
        self.text_defaults = style;
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn set_device_pixel_ratio(&mut self, dpr: f32) {
        self.device_pixel_ratio = sanitize_dpr(dpr);
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Start → Generate.
    pub fn enter_generate(&mut self) -> EditResult<()> {
        match self.mode {
            Mode::Start | Mode::Generate => {
                self.mode = Mode::Generate;
                Ok(())
            }
            actual => self.fail(EditError::WrongMode { expected: Mode::Start, actual }),
        }
    }

    /// Make `raster` the one-entry history and enter Edit mode.
    pub fn load_image(&mut self, raster: Raster, description: impl Into<String>) -> EditResult<()> {
        self.ensure_idle()?;
        let description = description.into();
        log::info!("Loaded image '{}' ({}x{})", description, raster.width(), raster.height());
        self.begin_fresh_history(raster, description);
        Ok(())
    }

    /// Edit → Start. Discards history and all transient state.
    pub fn start_over(&mut self) -> EditResult<()> {
        self.ensure_idle()?;
        self.history.clear();
        self.clear_transients();
        self.suggestions.clear();
        self.error = None;
        self.request = RequestState::Idle;
        self.mode = Mode::Start;
        log::info!("Session reset to start");
        Ok(())
    }

    /// Clear the error flag. Edit mode without a raster falls back to Start.
    pub fn dismiss_error(&mut self) {
        self.error = None;
        if self.mode == Mode::Edit && self.history.current().is_none() {
            self.mode = Mode::Start;
        }
    }

    // ========================================================================
    // HISTORY NAVIGATION
    // ========================================================================

    /// Step back one entry. Refused while a request is pending, since its
    /// result commits on top of whatever is current when it lands.
    pub fn undo(&mut self) -> bool {
        if self.ensure_idle().is_err() {
            return false;
        }
        let moved = self.history.undo();
        if moved {
            self.clear_transients();
            log::info!("Undo (cursor {:?})", self.history.cursor());
        }
        moved
    }

    pub fn redo(&mut self) -> bool {
        if self.ensure_idle().is_err() {
            return false;
        }
        let moved = self.history.redo();
        if moved {
            self.clear_transients();
            log::info!("Redo (cursor {:?})", self.history.cursor());
        }
        moved
    }

    /// Jump back to the original; later entries stay redoable.
    pub fn reset_to_original(&mut self) -> bool {
        if self.ensure_idle().is_err() {
            return false;
        }
        let reset = self.history.reset_to_original();
        if reset {
            self.clear_transients();
            log::info!("Reset to original ({} entries kept)", self.history.len());
        }
        reset
    }

    pub fn set_comparing(&mut self, comparing: bool) {
        self.comparing = comparing && self.history.original().is_some();
    }

    /// What the canvas should show: the original while comparing, else current.
    pub fn display_raster(&self) -> Option<&Raster> {
        if self.comparing {
            self.history.original()
        } else {
            self.history.current()
        }
    }

    // ========================================================================
    // POINTER INPUT & SELECTIONS
    // ========================================================================

    /// Place the retouch hotspot from a pointer event.
    ///
    /// `container` is the image element's client rect, `displayed` its size.
    /// Returns `None` (and leaves any old hotspot) when there is no image or
    /// the pointer is outside the displayed image.
    pub fn set_hotspot(&mut self, client: Point, container: Rect, displayed: Size) -> Option<Hotspot> {
        let natural = self.natural_size()?;
        let local = client_to_local(client, container);
        if !within_bounds(local, Rect::new(0.0, 0.0, displayed.width, displayed.height)) {
            return None;
        }
        let hotspot = Hotspot {
            display: local,
            natural: display_to_natural_pixel(local, displayed, natural),
        };
        log::debug!("Hotspot at display {:?} -> natural {:?}", hotspot.display, hotspot.natural);
        self.hotspot = Some(hotspot);
        Some(hotspot)
    }

    pub fn clear_hotspot(&mut self) {
        self.hotspot = None;
    }

    /// Set the crop selection; the active aspect constraint is applied.
    pub fn set_crop_region(&mut self, rect: Rect) {
        self.crop = Some(CropSelection {
            rect: constrain_to_aspect(rect, self.crop_aspect),
            aspect: self.crop_aspect,
        });
    }

    /// Crop selection from a drag between two display-space points.
    pub fn set_crop_from_drag(&mut self, start: Point, end: Point) {
        self.set_crop_region(rect_from_corners(start, end));
    }

    /// Change the aspect constraint and re-fit any existing selection.
    pub fn set_crop_aspect(&mut self, aspect: AspectConstraint) {
        self.crop_aspect = aspect;
        if let Some(sel) = self.crop {
            self.set_crop_region(sel.rect);
        }
    }

    pub fn clear_crop(&mut self) {
        self.crop = None;
    }

    /// Whether the magnifier preview should follow `pointer` (client space).
    pub fn magnifier_visible(&self, pointer: Point, image_bounds: Rect) -> bool {
        self.mode == Mode::Edit
            && self.history.current().is_some()
            && self.interaction == InteractionState::Idle
            && within_bounds(pointer, image_bounds)
    }

    // ========================================================================
    // LAYERS
    // ========================================================================

    /// Add a text layer from the session's text defaults, roughly centered on
    /// the current raster. It goes on top and becomes selected.
    pub fn add_text_layer(&mut self) -> EditResult<LayerId> {
        let Some(natural) = self.natural_size() else {
            return self.fail(EditError::NoImageLoaded);
        };
        let style = &self.text_defaults;
        let approx_width = style.content.chars().count() as f32 * style.font_size * 0.5;
        let position = Point::new(
            (natural.width - approx_width) / 2.0,
            (natural.height - style.font_size) / 2.0,
        );
        let id = self.layers.add_text_layer(&self.text_defaults, position);
        log::debug!("Added text layer {:?} at {:?}", id, position);
        Ok(id)
    }

    pub fn update_layer(&mut self, id: LayerId, patch: LayerPatch) -> bool {
        self.layers.update_layer(id, patch)
    }

    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        if matches!(self.interaction, InteractionState::DraggingLayer { id: dragged, .. } if dragged == id) {
            self.interaction = InteractionState::Idle;
        }
        self.layers.remove_layer(id)
    }

    pub fn reorder_layers(&mut self, source: usize, dest: usize) -> EditResult<()> {
        self.layers.reorder(source, dest)
    }

    pub fn select_layer(&mut self, id: Option<LayerId>) {
        self.layers.select(id);
    }

    /// Visible layers in paint order (bottom first), as flatten draws them.
    pub fn display_layers(&self) -> Vec<&Layer> {
        paint_order(self.layers.layers()).filter(|l| l.visible).collect()
    }

    /// Pointer down on a layer: select it and start dragging.
    pub fn begin_layer_drag(&mut self, id: LayerId, client: Point, container: Rect) -> bool {
        let Some(layer) = self.layers.get(id) else {
            return false;
        };
        let grab_offset = client_to_local(client, container).sub(layer.position);
        self.layers.select(Some(id));
        self.interaction = InteractionState::DraggingLayer { id, grab_offset };
        true
    }

    /// Pointer move: while dragging, position = pointer - grab offset.
    pub fn pointer_move(&mut self, client: Point, container: Rect) {
        if let InteractionState::DraggingLayer { id, grab_offset } = self.interaction {
            let position = client_to_local(client, container).sub(grab_offset);
            if !self.layers.update_layer(id, LayerPatch::position(position)) {
                self.interaction = InteractionState::Idle;
            }
        }
    }

    pub fn pointer_up(&mut self) {
        self.interaction = InteractionState::Idle;
    }

    /// Leaving the surface ends any drag so it cannot get stuck.
    pub fn pointer_leave(&mut self) {
        self.interaction = InteractionState::Idle;
    }

    // ========================================================================
    // COLLABORATOR REQUESTS
    // ========================================================================

    /// Localized retouch at the current hotspot.
    pub fn retouch(&mut self, prompt: &str) -> EditResult<()> {
        let prompt = self.require_prompt(prompt)?;
        let Some(hotspot) = self.hotspot else {
            return self.fail(EditError::MissingInput("hotspot"));
        };
        self.dispatch(EditInstruction::LocalizedEdit { hotspot: hotspot.natural, prompt })
    }

    pub fn apply_filter(&mut self, prompt: &str) -> EditResult<()> {
        let prompt = self.require_prompt(prompt)?;
        self.dispatch(EditInstruction::Filter { prompt })
    }

    pub fn apply_adjustment(&mut self, prompt: &str) -> EditResult<()> {
        let prompt = self.require_prompt(prompt)?;
        self.dispatch(EditInstruction::Adjustment { prompt })
    }

    pub fn auto_enhance(&mut self) -> EditResult<()> {
        self.dispatch(EditInstruction::AutoEnhance)
    }

    pub fn upscale(&mut self, factor: u32) -> EditResult<()> {
        if !(2..=MAX_UPSCALE_FACTOR).contains(&factor) {
            return self.fail(EditError::MissingInput("upscale factor between 2 and 8"));
        }
        self.dispatch(EditInstruction::Upscale { factor })
    }

    pub fn generate(&mut self, prompt: &str, aspect: GenerationAspect) -> EditResult<()> {
        let prompt = self.require_prompt(prompt)?;
        self.dispatch(EditInstruction::Generate { prompt, aspect })
    }

    pub fn generate_with_references(
        &mut self,
        prompt: &str,
        aspect: GenerationAspect,
        references: Vec<Raster>,
    ) -> EditResult<()> {
        let prompt = self.require_prompt(prompt)?;
        if references.is_empty() {
            return self.fail(EditError::MissingInput("reference images"));
        }
        self.dispatch(EditInstruction::GenerateWithReferences { prompt, aspect, references })
    }

    /// Ask the collaborator for suggestions about the current raster.
    pub fn analyze(&mut self) -> EditResult<()> {
        self.dispatch(EditInstruction::Analyze)
    }

    pub fn apply_suggestion(&mut self, index: usize) -> EditResult<()> {
        let Some(suggestion) = self.suggestions.get(index).cloned() else {
            return self.fail(EditError::MissingInput("suggestion"));
        };
        self.dispatch(EditInstruction::ApplySuggestion { suggestion })
    }

    /// Validate mode and input, mark the slot pending, run the collaborator
    /// on the rayon pool.
    fn dispatch(&mut self, instruction: EditInstruction) -> EditResult<()> {
        self.ensure_idle()?;
        let kind = instruction.kind();

        let current = if kind.is_generation() {
            if self.mode != Mode::Generate {
                return self.fail(EditError::WrongMode { expected: Mode::Generate, actual: self.mode });
            }
            None
        } else {
            let current = self.require_editable()?.clone();
            Some(current)
        };

        self.error = None;
        self.request = RequestState::Pending(kind);
        log::info!("Dispatching {:?}: {}", kind, instruction.description());

        let collaborator = Arc::clone(&self.collaborator);
        let sender = self.job_sender.clone();
        rayon::spawn(move || {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                collaborator.request_edit(current.as_ref(), &instruction)
            }));
            let result = outcome.unwrap_or_else(|panic_info| {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "unknown panic payload".to_string()
                };
                Err(CollaboratorError::new(format!("The edit service crashed: {}", msg)))
            });
            let _ = sender.send(JobResult { instruction, result });
        });
        Ok(())
    }

    /// Apply a finished request, if any. Never blocks.
    ///
    /// Returns `None` when nothing completed, otherwise the request's outcome.
    pub fn poll(&mut self) -> Option<EditResult<()>> {
        if !self.busy() {
            return None;
        }
        // The session owns a sender, so the channel never disconnects.
        let job = self.job_receiver.try_recv().ok()?;
        Some(self.complete(job))
    }

    /// Block until the pending request resolves and apply it.
    /// Returns `Ok(())` immediately when nothing is pending.
    pub fn wait(&mut self) -> EditResult<()> {
        if !self.busy() {
            return Ok(());
        }
        // Every spawned job sends exactly once (panics included), and the
        // session's own sender keeps the channel open.
        match self.job_receiver.recv() {
            Ok(job) => self.complete(job),
            Err(e) => self.fail(EditError::CollaboratorFailure(e.to_string())),
        }
    }

    fn complete(&mut self, job: JobResult) -> EditResult<()> {
        let JobResult { instruction, result } = job;
        let kind = instruction.kind();
        let applied = match result {
            Ok(CollaboratorReply::Raster(raster)) if kind.is_generation() => {
                self.begin_fresh_history(raster, instruction.description());
                Ok(())
            }
            Ok(CollaboratorReply::Raster(raster)) if kind != InstructionKind::Analyze => {
                self.commit(raster, instruction.description());
                Ok(())
            }
            Ok(CollaboratorReply::Suggestions(suggestions)) if kind == InstructionKind::Analyze => {
                log::info!("Analysis returned {} suggestion(s)", suggestions.len());
                self.suggestions = suggestions;
                Ok(())
            }
            Ok(_) => Err(EditError::CollaboratorFailure(format!(
                "The edit service returned no usable result for {:?}.",
                kind
            ))),
            Err(e) => Err(e.into()),
        };

        match applied {
            Ok(()) => {
                self.request = RequestState::Succeeded(kind);
                Ok(())
            }
            Err(e) => {
                self.request = RequestState::Failed(kind, e.to_string());
                self.fail(e)
            }
        }
    }

    // ========================================================================
    // LOCAL EDITS & OUTPUT
    // ========================================================================

    /// Rasterize the crop selection and commit it.
    ///
    /// `displayed` is the on-screen size of the image element; the scale to
    /// natural space is derived from it per axis.
    pub fn apply_crop(&mut self, displayed: Size) -> EditResult<()> {
        self.ensure_idle()?;
        let current = self.require_editable()?.clone();
        let Some(selection) = self.crop else {
            return self.fail(EditError::MissingInput("crop selection"));
        };
        let natural = Size::from_pixels(current.width(), current.height());
        let Some(scale) = Scale::display_to_natural(displayed, natural) else {
            return self.fail(EditError::InvalidRegion { width: displayed.width, height: displayed.height });
        };
        let image_bounds = Rect::new(0.0, 0.0, displayed.width, displayed.height);
        let Some(region) = selection.rect.intersect(&image_bounds) else {
            return self.fail(EditError::InvalidRegion { width: selection.rect.width, height: selection.rect.height });
        };
        match rasterize_crop(Some(&current), region, scale, self.device_pixel_ratio) {
            Ok(cropped) => {
                self.commit(cropped, "Crop");
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Flatten the layers into the current raster as a new history entry.
    pub fn merge_layers(&mut self) -> EditResult<()> {
        self.ensure_idle()?;
        let current = self.require_editable()?.clone();
        if self.layers.is_empty() {
            return self.fail(EditError::MissingInput("text layers"));
        }
        match flatten(&current, self.layers.layers(), self.renderer.as_ref()) {
            Ok(merged) => {
                self.commit(merged, "Merge Layers");
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Current raster with visible layers painted on. History is untouched.
    pub fn flattened(&self) -> EditResult<Raster> {
        let current = self.history.current().ok_or(EditError::NoImageLoaded)?;
        flatten(current, self.layers.layers(), self.renderer.as_ref())
    }

    /// Flatten and hand the result to `sink`. Never commits.
    pub fn export(&mut self, sink: &dyn ExportSink) -> EditResult<()> {
        let result = self.flattened().and_then(|raster| sink.export_raster(&raster));
        match result {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// The one commit path: push onto history and drop transient state.
    fn commit(&mut self, raster: Raster, description: impl Into<String>) {
        let description = description.into();
        log::info!(
            "Commit '{}' ({}x{}, {} entries)",
            description,
            raster.width(),
            raster.height(),
            self.history.len() + 1
        );
        self.history.commit(raster, description);
        self.clear_transients();
    }

    fn begin_fresh_history(&mut self, raster: Raster, description: impl Into<String>) {
        self.history.replace_all(raster, description);
        self.clear_transients();
        self.suggestions.clear();
        self.error = None;
        self.mode = Mode::Edit;
    }

    fn clear_transients(&mut self) {
        self.layers.clear();
        self.crop = None;
        self.hotspot = None;
        self.interaction = InteractionState::Idle;
        self.comparing = false;
    }

    fn natural_size(&self) -> Option<Size> {
        self.history.current().map(|r| Size::from_pixels(r.width(), r.height()))
    }

    fn ensure_idle(&self) -> EditResult<()> {
        if self.busy() {
            log::warn!("Rejected request while another is pending");
            return Err(EditError::Busy);
        }
        Ok(())
    }

    /// Edit mode with a current raster.
    fn require_editable(&mut self) -> EditResult<&Raster> {
        if self.mode != Mode::Edit {
            return self.fail(EditError::WrongMode { expected: Mode::Edit, actual: self.mode });
        }
        if self.history.current().is_none() {
            return self.fail(EditError::NoImageLoaded);
        }
        self.history.current().ok_or(EditError::NoImageLoaded)
    }

    fn require_prompt(&mut self, prompt: &str) -> EditResult<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return self.fail(EditError::MissingInput("prompt"));
        }
        Ok(prompt.to_string())
    }

    /// Record `err` as the current message (unless it is a gating error) and return it.
    fn fail<T>(&mut self, err: EditError) -> EditResult<T> {
        if err.is_user_facing() {
            log::warn!("{}", err);
            self.error = Some(err.to_string());
        }
        Err(err)
    }
}

fn sanitize_dpr(dpr: f32) -> f32 {
    if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::text::Sprite;

    struct NoText;

    impl OverlayRenderer for NoText {
        fn render(&self, _layer: &Layer) -> EditResult<Sprite> {
            Ok(Sprite::empty())
        }
    }

    struct Echo;

    impl EditCollaborator for Echo {
        fn request_edit(
            &self,
            current: Option<&Raster>,
            _instruction: &EditInstruction,
        ) -> Result<CollaboratorReply, CollaboratorError> {
            let (w, h) = current.map(|r| r.dimensions()).unwrap_or((4, 4));
            Ok(CollaboratorReply::Raster(Raster::filled(w, h, [9, 9, 9, 255])))
        }
    }

    fn session() -> Session {
        Session::new(&Settings::default(), Arc::new(Echo), Arc::new(NoText))
    }

    fn loaded() -> Session {
        let mut s = session();
        s.load_image(Raster::filled(100, 50, [0, 0, 0, 255]), "Original").unwrap();
        s
    }

    #[test]
    fn load_enters_edit_mode() {
        let s = loaded();
        assert_eq!(s.mode(), Mode::Edit);
        assert_eq!(s.history().len(), 1);
        assert!(!s.can_undo());
    }

    #[test]
    fn editing_without_image_is_rejected() {
        let mut s = session();
        assert!(matches!(s.apply_filter("sepia"), Err(EditError::WrongMode { .. })));
        assert!(s.error().is_some());
        assert!(!s.busy());
    }

    #[test]
    fn empty_prompt_is_missing_input() {
        let mut s = loaded();
        assert!(matches!(s.apply_filter("   "), Err(EditError::MissingInput("prompt"))));
        assert!(matches!(s.retouch("fix"), Err(EditError::MissingInput("hotspot"))));
    }

    #[test]
    fn second_request_while_pending_is_busy() {
        let mut s = loaded();
        s.apply_filter("sepia").unwrap();
        assert!(s.busy());
        assert!(matches!(s.auto_enhance(), Err(EditError::Busy)));
        assert!(s.error().is_none());
        s.wait().unwrap();
        assert!(!s.busy());
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.request_state(), &RequestState::Succeeded(InstructionKind::Filter));
    }

    #[test]
    fn hotspot_maps_to_natural_pixels() {
        let mut s = loaded();
        let container = Rect::new(10.0, 20.0, 50.0, 25.0);
        let h = s.set_hotspot(Point::new(35.0, 30.0), container, Size::new(50.0, 25.0)).unwrap();
        assert_eq!(h.display, Point::new(25.0, 10.0));
        assert_eq!(h.natural, PixelPoint { x: 50, y: 20 });
        assert!(s.set_hotspot(Point::new(0.0, 0.0), container, Size::new(50.0, 25.0)).is_none());
        assert_eq!(s.hotspot(), Some(&h));
    }

    #[test]
    fn drag_moves_by_pointer_minus_grab_offset() {
        let mut s = loaded();
        let id = s.add_text_layer().unwrap();
        s.update_layer(id, LayerPatch::position(Point::new(10.0, 10.0)));
        let container = Rect::new(100.0, 100.0, 200.0, 100.0);
        assert!(s.begin_layer_drag(id, Point::new(115.0, 112.0), container));
        s.pointer_move(Point::new(150.0, 150.0), container);
        assert_eq!(s.layers().get(id).unwrap().position, Point::new(45.0, 48.0));
        s.pointer_leave();
        assert_eq!(s.interaction(), InteractionState::Idle);
        s.pointer_move(Point::new(0.0, 0.0), container);
        assert_eq!(s.layers().get(id).unwrap().position, Point::new(45.0, 48.0));
    }

    #[test]
    fn dismissing_error_without_raster_returns_to_start() {
        let mut s = session();
        s.mode = Mode::Edit;
        s.error = Some("boom".into());
        s.dismiss_error();
        assert_eq!(s.mode(), Mode::Start);
        assert!(s.error().is_none());
    }

    #[test]
    fn tool_survives_commits() {
        let mut s = loaded();
        s.set_tool(Tool::Filters);
        s.apply_filter("sepia").unwrap();
        s.wait().unwrap();
        assert_eq!(s.tool(), Tool::Filters);
    }

    #[test]
    fn comparing_shows_original_until_commit() {
        let mut s = loaded();
        s.apply_filter("x").unwrap();
        s.wait().unwrap();
        s.set_comparing(true);
        assert_eq!(s.display_raster(), s.original());
        s.apply_filter("y").unwrap();
        s.wait().unwrap();
        assert!(!s.is_comparing());
        assert_eq!(s.display_raster(), s.current());
    }
}
