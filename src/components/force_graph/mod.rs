//! Force-directed graph canvas for the abstract perspective.
//!
//! Renders the store graph on an HTML canvas with:
//! - A force simulation that keeps node positions across graph updates
//! - Pan by dragging the background, zoom about the pointer with the wheel
//! - Hover highlighting of nodes and edges
//!
//! # Example
//!
//! ```ignore
//! let view = RwSignal::new(GraphView::default());
//! view! { <TapestryCanvas view=view fullscreen=true /> }
//! ```

mod component;
mod render;
pub mod scale;
pub mod simulation;
pub mod state;
pub mod theme;
mod types;

pub use component::TapestryCanvas;
pub use simulation::{Simulation, SimulationParameters};
pub use theme::Theme;
pub use types::GraphView;
