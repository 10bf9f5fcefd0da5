pub mod adapter;
pub mod events;
pub mod types;

pub use adapter::SolanaAdapter;
pub use types::SolanaAdapterConfig;
