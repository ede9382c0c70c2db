//! Search, sorting and spending statistics over stored receipts.

pub mod filters;
pub mod summary;

pub use filters::{SearchFilters, SortKey, search, similarity, sort, vendor_matches};
pub use summary::{
    Analytics, Anomaly, CategorySummary, CurrencySummary, MonthSummary, SpendingPatterns,
    SpendingVelocity, VendorSummary, WeekdaySummary, spending_velocity, summarize, top_vendors,
};
