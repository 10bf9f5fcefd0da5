pub mod adapter;
pub mod events;
pub mod types;

pub use adapter::EvmAdapter;
pub use types::EvmAdapterConfig;
