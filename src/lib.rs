pub mod balance;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod miner;
pub mod protocol;
pub mod transaction;
pub mod wallet;
pub mod wallet_state;

pub use balance::Balance;
pub use chain::{Block, BlockChainView, BlockProcessorHandle, WalletKeys};
pub use config::NodeConfig;
pub use error::NodeError;
pub use miner::{validate_hash, verify_nonce, Miner};
pub use protocol::{ProtocolHandle, ProtocolMessageCode};
pub use transaction::{Transaction, TransactionType};
pub use wallet::{Address, Wallet};
pub use wallet_state::{WalletState, WsChunk};

pub type Result<T> = std::result::Result<T, NodeError>;
