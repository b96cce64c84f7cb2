pub mod account;
pub mod challenge;
pub mod eligibility;
pub mod predicate;
pub mod warning;
