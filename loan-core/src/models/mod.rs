mod product;
mod quote;
mod rate_range;

pub use product::{Product, RateConvention};
pub use quote::{FeeConfig, Installment, LoanQuote, QuoteSummary};
pub use rate_range::{
    LegacyUnifiedRange, NewRateRange, RangeOverlap, RateMatch, RateRange, RateRangePatch,
};
