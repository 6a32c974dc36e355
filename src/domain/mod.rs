mod filter;
mod money;
mod record;
mod session;

pub use filter::*;
pub use money::*;
pub use record::*;
pub use session::*;
