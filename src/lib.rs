pub mod attributes;
pub mod cli;
pub mod diagram;
pub mod error;
pub mod layout;
pub mod layout_dump;
pub mod loader;
pub mod render;
pub mod text_metrics;

pub use cli::run;
pub use diagram::{diagram_from_str, load_diagram, Diagram};
pub use error::{Error, Result};
pub use layout::{compute_layout, Layout, LayoutOptions};
pub use render::render_svg;
