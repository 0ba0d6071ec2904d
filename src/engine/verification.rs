use tracing::info;
use uuid::Uuid;

use crate::state::AppState;

pub fn listed_product_count(state: &AppState, merchant_id: Uuid) -> usize {
    state
        .products
        .iter()
        .filter(|entry| entry.merchant_id == merchant_id && entry.is_listed())
        .count()
}

pub fn crosses_threshold(before: usize, after: usize, threshold: usize) -> bool {
    before < threshold && after >= threshold
}

/// Marks the merchant verified when a product change moved its listed product
/// count across the threshold. Returns whether the merchant was verified now.
pub fn reconcile(state: &AppState, merchant_id: Uuid, count_before: usize) -> bool {
    let threshold = state.config.merchant_verification_threshold;
    let count_after = listed_product_count(state, merchant_id);

    if !crosses_threshold(count_before, count_after, threshold) {
        return false;
    }

    let Some(mut merchant) = state.merchants.get_mut(&merchant_id) else {
        return false;
    };
    if merchant.is_verified {
        return false;
    }

    merchant.is_verified = true;
    info!(
        merchant_id = %merchant_id,
        listed_products = count_after,
        "merchant auto-verified"
    );
    true
}

#[cfg(test)]
mod tests {
    use super::crosses_threshold;

    #[test]
    fn triggers_only_on_upward_crossing() {
        assert!(crosses_threshold(4, 5, 5));
        assert!(crosses_threshold(0, 7, 5));
        assert!(!crosses_threshold(5, 6, 5));
        assert!(!crosses_threshold(3, 4, 5));
        assert!(!crosses_threshold(5, 4, 5));
    }
}
