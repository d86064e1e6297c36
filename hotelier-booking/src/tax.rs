use std::sync::Arc;

/// Computes taxes owed on a booking subtotal.
pub trait TaxPolicy: Send + Sync {
    fn taxes(&self, subtotal: i64) -> i64;
}

/// Default policy: no tax.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTax;

impl TaxPolicy for NoTax {
    fn taxes(&self, _subtotal: i64) -> i64 {
        0
    }
}

/// Flat rate in basis points (1000 = 10%), rounded down.
#[derive(Debug, Clone, Copy)]
pub struct BasisPointTax {
    pub basis_points: u32,
}

impl TaxPolicy for BasisPointTax {
    fn taxes(&self, subtotal: i64) -> i64 {
        subtotal * i64::from(self.basis_points) / 10_000
    }
}

pub fn policy_for(basis_points: u32) -> Arc<dyn TaxPolicy> {
    if basis_points == 0 {
        Arc::new(NoTax)
    } else {
        Arc::new(BasisPointTax { basis_points })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policies() {
        assert_eq!(NoTax.taxes(430_000), 0);
        assert_eq!(BasisPointTax { basis_points: 1100 }.taxes(430_000), 47_300);
        assert_eq!(BasisPointTax { basis_points: 1000 }.taxes(99), 9);
        assert_eq!(policy_for(0).taxes(1_000_000), 0);
    }
}
