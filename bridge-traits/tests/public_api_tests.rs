//! Checks the crate-root surface adapters build against.

use bridge_traits::{AssetId, BridgeError, Result};

fn parse_all(raw: &[&str]) -> Result<Vec<AssetId>> {
    raw.iter().map(|id| AssetId::parse(*id)).collect()
}

#[test]
fn test_root_result_carries_bridge_errors() {
    assert_eq!(parse_all(&["pq1", "pq2"]).unwrap().len(), 2);
    assert!(matches!(
        parse_all(&["pq1", "../escape"]),
        Err(BridgeError::InvalidInput(_))
    ));
}
