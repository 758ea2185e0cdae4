pub mod batch;
pub mod classify;
pub mod deps;
pub mod history;
pub mod literals;
pub mod probe;
pub mod util;

pub use batch::*;
pub use classify::*;
pub use deps::*;
pub use history::*;
pub use literals::*;
pub use probe::*;
pub use util::*;
