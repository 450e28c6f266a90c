pub mod code;
#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;
pub mod flag;
pub mod guard;
pub mod store;

pub use code::ErrorCode;
pub use error::CliError;
pub use executor::ExecutorError;
pub use flag::FlagError;
pub use guard::GuardError;
pub use store::StoreError;
