//! negsweep-platform: ad platform access for negsweep
//!
//! This crate is the only place that knows how to talk to an ad platform.
//! The pipeline depends on the [`AdAccountService`] trait; backends and fakes
//! implement it.
//!
//! ## Key Components
//!
//! - `AdAccountService`: campaign, search term, shared list and criteria calls
//! - `GoogleAdsClient`: Google Ads REST backend
//! - `fakes::MemoryAdAccountService`: in-memory fake with call counters

pub mod account_service;
mod error;
pub mod fakes;
pub mod google_ads;

pub use account_service::{
    AccountId, AdAccountService, CampaignSummary, CriterionDraft, DateRange, MatchType,
    PlatformResult, SharedListId, SharedListType,
};
pub use error::PlatformError;
pub use google_ads::{GoogleAdsClient, GoogleAdsConfig};
