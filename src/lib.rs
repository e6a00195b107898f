//! Non-destructive image edit sessions: a reversible history of rasters,
//! transient text overlays composited on top, and the coordinate mapping
//! between what is shown on screen and the pixels underneath.

pub mod cli;
pub mod components;
pub mod error;
pub mod geometry;
pub mod io;
pub mod logger;
pub mod ops;
pub mod raster;
pub mod session;
pub mod settings;

pub use components::history::HistoryStack;
pub use components::layers::{paint_order, Layer, LayerId, LayerKind, LayerModel, LayerPatch, TextStyle};
pub use error::{EditError, EditResult};
pub use geometry::{AspectConstraint, PixelPoint, Point, Rect, Scale, Size};
pub use io::{ExportSink, FileExportSink};
pub use ops::collaborator::{
    CollaboratorError, CollaboratorReply, EditCollaborator, EditInstruction, GenerationAspect, InstructionKind,
    LocalCollaborator, Suggestion,
};
pub use ops::compositor::{flatten, rasterize_crop};
pub use ops::text::{GlyphRenderer, OverlayRenderer, Sprite};
pub use raster::{Raster, RasterId};
pub use session::{CropSelection, Hotspot, InteractionState, Mode, RequestState, Session, Tool};
pub use settings::Settings;
