use crate::{
    CodegenError, event_topic,
    selector::{Selector, ensure_unique, selector},
    storage::mapping_slot,
};
use alloy_primitives::{U256, b256, keccak256};

#[test]
fn selectors_match_solidity() {
    let cases = [
        ("transfer(address,uint256)", 0xa9059cbb_u32),
        ("balanceOf(address)", 0x70a08231),
        ("totalSupply()", 0x18160ddd),
        ("approve(address,uint256)", 0x095ea7b3),
        ("increment()", 0xd09de08a),
        ("get()", 0x6d4ce63c),
        ("set(uint256)", 0x60fe47b1),
    ];
    for (signature, expected) in cases {
        assert_eq!(selector(signature).as_u32(), expected, "{signature}");
    }
    assert_eq!(selector("transfer(address,uint256)").to_string(), "0xa9059cbb");
}

#[test]
fn event_topics_hash_the_full_signature() {
    assert_eq!(
        event_topic("Transfer(address,address,uint256)"),
        b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
    );
}

#[test]
fn colliding_selectors_are_rejected() {
    let err = ensure_unique(["burn(uint256)", "collate_propagate_storage(bytes16)"]).unwrap_err();
    assert_eq!(
        err,
        CodegenError::SelectorCollision {
            selector: Selector([0x42, 0x96, 0x6c, 0x68]),
            first: "burn(uint256)".into(),
            second: "collate_propagate_storage(bytes16)".into(),
        }
    );
    assert_eq!(ensure_unique(["get()", "set(uint256)"]).unwrap().len(), 2);
}

#[test]
fn mapping_slots_hash_key_then_base() {
    let key = U256::from(0xbeef);
    let base = U256::from(2);
    let mut preimage = key.to_be_bytes::<32>().to_vec();
    preimage.extend(base.to_be_bytes::<32>());
    assert_eq!(mapping_slot(key, base), U256::from_be_bytes(keccak256(&preimage).0));
    assert_ne!(mapping_slot(key, base), mapping_slot(base, key));
}
