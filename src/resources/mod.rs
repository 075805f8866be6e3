pub mod constants;
pub mod map_view;
pub mod settings;

pub use map_view::*;
pub use settings::*;
