use serde::{Deserialize, Serialize};

/// Financed vehicle category.
///
/// The product determines which loan terms may be offered and whether the
/// legacy unified rate table may be consulted as a fallback (see
/// [`crate::resolver::FallbackPolicy`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Product {
    Auto,
    Moto,
}

impl Product {
    /// Loan terms (in months) that may be offered for this product.
    ///
    /// This is the single source of truth for term validation: the store,
    /// the resolver and the batch quoter all consult it. Returned in
    /// ascending order.
    pub fn allowed_terms(&self) -> &'static [u32] {
        match self {
            Product::Auto => &[6, 12, 18, 24, 36, 48],
            Product::Moto => &[6, 12, 18],
        }
    }

    /// Whether `term_months` is a valid term for this product.
    pub fn allows_term(&self, term_months: u32) -> bool {
        self.allowed_terms().contains(&term_months)
    }

    /// Stable code used for persistence and CSV interchange.
    pub fn code(&self) -> &'static str {
        match self {
            Product::Auto => "AUTO",
            Product::Moto => "MOTO",
        }
    }

    /// Parse a persistence code produced by [`Product::code`].
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "AUTO" => Some(Product::Auto),
            "MOTO" => Some(Product::Moto),
            _ => None,
        }
    }
}

/// Convention under which an annual interest rate is expressed.
///
/// Configured rate ranges always carry a nominal annual rate (TNA); the
/// other conventions exist so a caller can price a loan against a rate
/// quoted differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateConvention {
    /// Nominal annual rate, not compounded (TNA). Converted to a periodic
    /// rate via the 30/365 day-count convention.
    NominalAnnual,
    /// Effective annual rate (TEA). Converted to monthly via
    /// `(1 + rate)^(1/12) - 1`.
    EffectiveAnnual,
    /// Already a periodic (monthly) rate; used as given.
    Monthly,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn auto_terms_are_ascending() {
        let terms = Product::Auto.allowed_terms();
        let mut sorted = terms.to_vec();
        sorted.sort_unstable();
        assert_eq!(terms, sorted.as_slice());
    }

    #[test]
    fn auto_allows_standard_terms() {
        for term in [6, 12, 18, 24, 36, 48] {
            assert!(Product::Auto.allows_term(term), "AUTO should allow {term}");
        }
    }

    #[test]
    fn auto_rejects_unlisted_terms() {
        for term in [0, 1, 30, 60] {
            assert!(!Product::Auto.allows_term(term), "AUTO should reject {term}");
        }
    }

    #[test]
    fn moto_allows_short_terms_only() {
        assert!(Product::Moto.allows_term(6));
        assert!(Product::Moto.allows_term(12));
        assert!(Product::Moto.allows_term(18));
        assert!(!Product::Moto.allows_term(24));
        assert!(!Product::Moto.allows_term(36));
    }

    #[test]
    fn code_round_trips() {
        for product in [Product::Auto, Product::Moto] {
            assert_eq!(Product::from_code(product.code()), Some(product));
        }
        assert_eq!(Product::from_code("BOAT"), None);
    }
}
