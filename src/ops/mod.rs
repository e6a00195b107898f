pub mod adjustments;
pub mod collaborator;
pub mod compositor;
pub mod text;
