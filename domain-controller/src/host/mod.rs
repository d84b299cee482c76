pub mod local;
pub mod traits;

pub use local::LocalHostExecutor;
pub use traits::HostExecutor;
