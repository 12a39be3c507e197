mod impls;
mod requests;
mod responses;
mod types;

pub use impls::*;
pub use requests::*;
pub use responses::*;
pub use types::*;
