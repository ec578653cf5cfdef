//! Domain entities produced by the extraction jobs.
//!
//! These are the in-memory shapes that flow through the item bus
//! (`etl_bus`) and get fanned out to the CSV and upsert sinks
//! (`etl_sinks`). They carry Rust-native integer types; the `0x`-prefixed
//! hex strings a node returns are decoded into these by `etl_mappers`.

use ethnum::U256;

/// A list of log topics, order-preserving, serialized to CSV/text as a
/// single `|`-delimited string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Topics(pub Vec<String>);

impl Topics {
    /// Joins the topics with `|`, the delimiter used by every text sink.
    pub fn to_delimited_string(&self) -> String {
        self.0.join("|")
    }
}

/// A block, keyed by `hash`.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub nonce: Option<String>,
    pub sha3_uncles: String,
    pub logs_bloom: Option<String>,
    pub transactions_root: String,
    pub state_root: String,
    pub receipts_root: String,
    pub miner: Option<String>,
    pub difficulty: Option<U256>,
    pub total_difficulty: Option<U256>,
    pub size: Option<u64>,
    pub extra_data: String,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub transaction_count: u64,
    pub base_fee_per_gas: Option<U256>,
}

/// A transaction, keyed by `hash`. Receipt fields are `None` until the
/// receipt for this transaction has been fetched and spliced in.
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub hash: String,
    pub nonce: u64,
    pub transaction_index: u64,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub value: U256,
    pub gas: u64,
    pub gas_price: Option<U256>,
    pub input: Vec<u8>,
    pub block_number: u64,
    pub block_hash: String,
    pub block_timestamp: u64,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub transaction_type: Option<u64>,
    pub receipt_cumulative_gas_used: Option<u64>,
    pub receipt_gas_used: Option<u64>,
    pub receipt_contract_address: Option<String>,
    pub receipt_root: Option<String>,
    pub receipt_status: Option<u64>,
    pub receipt_effective_gas_price: Option<U256>,
}

/// A receipt, keyed by `transaction_hash`.
#[derive(Clone, Debug, PartialEq)]
pub struct Receipt {
    pub transaction_hash: String,
    pub transaction_index: u64,
    pub block_hash: String,
    pub block_number: u64,
    pub cumulative_gas_used: u64,
    pub gas_used: u64,
    pub contract_address: Option<String>,
    pub root: Option<String>,
    pub status: Option<u64>,
    pub effective_gas_price: Option<U256>,
    /// Raw logs carried by the receipt; consumed by the receipts+logs job
    /// to emit individual `Log` items and then dropped.
    pub logs: Vec<Log>,
}

/// An event log, keyed by `(transaction_hash, log_index)`. `block_hash` and
/// `block_timestamp` start empty/zero and are filled in by enrichment
/// (`etl_bus::enrich`).
#[derive(Clone, Debug, PartialEq)]
pub struct Log {
    pub log_index: u64,
    pub transaction_hash: String,
    pub transaction_index: u64,
    pub address: Option<String>,
    pub data: Vec<u8>,
    pub topics: Topics,
    pub block_timestamp: u64,
    pub block_number: u64,
    pub block_hash: String,
}

/// An ERC20/ERC721 transfer, keyed by `(transaction_hash, log_index)`.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenTransfer {
    pub token_address: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub value: U256,
    pub transaction_hash: String,
    pub log_index: u64,
    pub block_timestamp: u64,
    pub block_number: u64,
    pub block_hash: String,
}

/// A deployed contract, keyed by `address`.
#[derive(Clone, Debug, PartialEq)]
pub struct Contract {
    pub address: String,
    pub bytecode: Vec<u8>,
    pub function_sighashes: Vec<String>,
    pub is_erc20: bool,
    pub is_erc721: bool,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub block_hash: String,
    /// Transaction index of the deploying transaction, used only to break
    /// ties in the contracts upsert's conflict resolution (§4.10).
    pub transaction_index: u64,
}

/// ERC20/ERC721 metadata for a contract, keyed by `address`.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u64>,
    pub total_supply: Option<U256>,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub block_hash: String,
}

/// A raw `debug_traceBlockByNumber` call-tree, kept only long enough to
/// extract `Contract` items from its `create`/`create2` frames; never
/// persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct GethTrace {
    pub block_number: u64,
    pub root_calls: Vec<CallFrame>,
}

/// One frame of a `callTracer` call tree.
#[derive(Clone, Debug, PartialEq)]
pub struct CallFrame {
    pub call_type: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub input: Vec<u8>,
    /// The runtime bytecode returned by a `create`/`create2` frame.
    pub output: Option<Vec<u8>>,
    pub error: Option<String>,
    pub calls: Vec<CallFrame>,
}

impl CallFrame {
    /// Whether this frame is a successful contract creation.
    pub fn is_successful_create(&self) -> bool {
        let call_type = self.call_type.to_ascii_uppercase();
        (call_type == "CREATE" || call_type == "CREATE2") && self.error.is_none()
    }

    /// Visits every frame in this call tree, depth-first.
    pub fn walk<'a>(&'a self, visitor: &mut impl FnMut(&'a CallFrame)) {
        visitor(self);
        for call in &self.calls {
            call.walk(visitor);
        }
    }
}

/// The item-type-keyed variant every entity is wrapped in before it enters
/// the item bus (`etl_bus`). Mirrors the Python source's `dict['type']`
/// dispatch as a tagged enum instead of a stringly-typed field.
#[derive(Clone, Debug, PartialEq)]
pub enum Item {
    Block(Block),
    Transaction(Transaction),
    Receipt(Receipt),
    Log(Log),
    TokenTransfer(TokenTransfer),
    Contract(Contract),
    Token(Token),
}

impl Item {
    /// The item-type name, used as the bus's bucket key and the sinks'
    /// dispatch key.
    pub fn type_name(&self) -> &'static str {
        match self {
            Item::Block(_) => "block",
            Item::Transaction(_) => "transaction",
            Item::Receipt(_) => "receipt",
            Item::Log(_) => "log",
            Item::TokenTransfer(_) => "token_transfer",
            Item::Contract(_) => "contract",
            Item::Token(_) => "token",
        }
    }
}
