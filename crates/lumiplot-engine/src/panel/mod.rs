//! Panel compositor: a grid of viewports over one canvas.
//!
//! A [`Grid`] splits the canvas into weighted rows and columns. Each
//! [`Panel`] occupies one cell or a rectangular span of cells and draws its
//! attached visuals into the viewport computed for it. The grid reacts to the
//! canvas refill and resize events once [`Grid::install`]ed.

mod grid;
mod layout;
mod panel;

pub use grid::Grid;
pub use layout::{Cell, GridLayout, compute_viewport};
pub use panel::{DEFAULT_MARGINS, Panel};
