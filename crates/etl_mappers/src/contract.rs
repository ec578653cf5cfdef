//! Bytecode → `function_sighashes`/`is_erc20`/`is_erc721` (§4.6).

use std::collections::HashSet;

use etl_types::entities::Contract;
use sha3::{Digest, Keccak256};

/// The 4-byte selector a call to `signature` (e.g. `"transfer(address,uint256)"`)
/// dispatches on: the first 4 bytes of its Keccak-256 hash.
fn selector(signature: &str) -> String {
    let digest = Keccak256::digest(signature.as_bytes());
    format!("0x{}", hex::encode(&digest[..4]))
}

/// The full 32-byte topic a log for event `signature` is indexed under.
fn topic(signature: &str) -> String {
    let digest = Keccak256::digest(signature.as_bytes());
    format!("0x{}", hex::encode(digest))
}

/// Signatures every conforming ERC20 implementation dispatches on.
const ERC20_SIGNATURES: &[&str] = &[
    "transfer(address,uint256)",
    "transferFrom(address,address,uint256)",
    "approve(address,uint256)",
    "balanceOf(address)",
    "totalSupply()",
    "allowance(address,address)",
];

/// Signatures every conforming ERC721 implementation dispatches on.
const ERC721_SIGNATURES: &[&str] = &[
    "transferFrom(address,address,uint256)",
    "safeTransferFrom(address,address,uint256)",
    "ownerOf(uint256)",
    "approve(address,uint256)",
    "balanceOf(address)",
    "getApproved(uint256)",
    "setApprovalForAll(address,bool)",
    "isApprovedForAll(address,address)",
];

/// `Transfer(address,address,uint256)`, shared by ERC20 and ERC721 (indexing
/// doesn't change an event's signature hash).
const TRANSFER_EVENT: &str = "Transfer(address,address,uint256)";

/// `Approval(address,address,uint256)`.
const APPROVAL_EVENT: &str = "Approval(address,address,uint256)";

/// Walks EVM bytecode respecting `PUSH1..PUSH32` operand widths, collecting
/// every 4-byte operand pushed by a `PUSH4` (the dispatch-table pattern:
/// `PUSH4 <selector> ... EQ ... JUMPI`) and every 32-byte operand pushed by
/// a `PUSH32` that matches a known event topic.
fn scan_dispatch_table(bytecode: &[u8]) -> (Vec<String>, HashSet<String>) {
    const PUSH1: u8 = 0x60;
    const PUSH32: u8 = 0x7f;
    const PUSH4: u8 = 0x63;

    let mut selectors = Vec::new();
    let mut seen_selectors = HashSet::new();
    let mut topics = HashSet::new();

    let mut index = 0;
    while index < bytecode.len() {
        let opcode = bytecode[index];
        if (PUSH1..=PUSH32).contains(&opcode) {
            let operand_len = (opcode - PUSH1 + 1) as usize;
            let operand_start = index + 1;
            let operand_end = operand_start + operand_len;
            if operand_end > bytecode.len() {
                break;
            }
            let operand = &bytecode[operand_start..operand_end];

            if opcode == PUSH4 {
                let found = format!("0x{}", hex::encode(operand));
                if seen_selectors.insert(found.clone()) {
                    selectors.push(found);
                }
            } else if opcode == PUSH32 {
                topics.insert(format!("0x{}", hex::encode(operand)));
            }

            index = operand_end;
        } else {
            index += 1;
        }
    }

    (selectors, topics)
}

fn dispatches_all(selectors: &HashSet<&str>, signatures: &[&str]) -> bool {
    signatures
        .iter()
        .all(|signature| selectors.contains(selector(signature).as_str()))
}

/// Derives `function_sighashes`/`is_erc20`/`is_erc721` for a contract whose
/// `address`/`bytecode`/`block_number`/`transaction_index` are already
/// known; `block_hash`/`block_timestamp` are filled in afterward by the
/// block join (§4.6).
pub fn classify_contract(
    address: String,
    bytecode: Vec<u8>,
    block_number: u64,
    transaction_index: u64,
) -> Contract {
    let (selectors, topics) = scan_dispatch_table(&bytecode);
    let selector_set: HashSet<&str> = selectors.iter().map(String::as_str).collect();

    let is_erc20 = dispatches_all(&selector_set, ERC20_SIGNATURES)
        && topics.contains(&topic(TRANSFER_EVENT))
        && topics.contains(&topic(APPROVAL_EVENT));
    let is_erc721 =
        dispatches_all(&selector_set, ERC721_SIGNATURES) && topics.contains(&topic(TRANSFER_EVENT));

    Contract {
        address,
        bytecode,
        function_sighashes: selectors,
        is_erc20,
        is_erc721,
        block_number,
        block_timestamp: 0,
        block_hash: String::new(),
        transaction_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push4_selector(signature: &str) -> Vec<u8> {
        let mut bytes = vec![0x63];
        bytes.extend_from_slice(&hex::decode(&selector(signature)[2..]).unwrap());
        bytes
    }

    fn push32_topic(signature: &str) -> Vec<u8> {
        let mut bytes = vec![0x7f];
        bytes.extend_from_slice(&hex::decode(&topic(signature)[2..]).unwrap());
        bytes
    }

    #[test]
    fn detects_erc20_dispatch_table() {
        let mut bytecode = Vec::new();
        for signature in ERC20_SIGNATURES {
            bytecode.extend(push4_selector(signature));
        }
        bytecode.extend(push32_topic(TRANSFER_EVENT));
        bytecode.extend(push32_topic(APPROVAL_EVENT));

        let contract = classify_contract("0xabc".to_string(), bytecode, 1, 0);
        assert!(contract.is_erc20);
        assert!(!contract.is_erc721);
        assert_eq!(contract.function_sighashes.len(), ERC20_SIGNATURES.len());
    }

    #[test]
    fn non_token_bytecode_matches_neither() {
        let bytecode = push4_selector("someRandomFunction()");
        let contract = classify_contract("0xabc".to_string(), bytecode, 1, 0);
        assert!(!contract.is_erc20);
        assert!(!contract.is_erc721);
    }

    #[test]
    fn push_operand_bytes_are_not_misread_as_opcodes() {
        // A PUSH32 whose operand happens to contain the byte 0x63 (PUSH4)
        // must not be walked into as if it were its own instruction.
        let mut topic_bytes = [0u8; 32];
        topic_bytes[5] = 0x63;
        let mut bytecode = vec![0x7f];
        bytecode.extend_from_slice(&topic_bytes);
        bytecode.extend(push4_selector("transfer(address,uint256)"));

        let (selectors, _) = scan_dispatch_table(&bytecode);
        assert_eq!(selectors, vec![selector("transfer(address,uint256)")]);
    }
}
