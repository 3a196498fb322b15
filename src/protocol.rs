// src/protocol.rs

use serde::{Deserialize, Serialize};

/// Wire message codes the core emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolMessageCode {
    TransactionData,
}

/// Outbound seam to the peer-to-peer layer. The node's transport
/// implements this; the core never opens sockets itself.
pub trait ProtocolHandle: Send + Sync {
    fn broadcast(&self, code: ProtocolMessageCode, payload: Vec<u8>);
}
