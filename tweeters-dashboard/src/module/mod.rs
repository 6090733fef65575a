pub mod dataset;
pub mod renderer;
pub mod scheduled;
pub mod state;
pub mod view;
