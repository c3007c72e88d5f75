pub mod record;
pub mod trained;

pub use record::*;
pub use trained::*;
