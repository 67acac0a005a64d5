//! Client-surface logic shared by the admin, wait-staff, rider and kitchen
//! displays: feed decoding, snapshot/feed reconciliation and the kitchen
//! poller. The rendering layers sit on top of these types.

pub mod kitchen;
pub mod reconciler;
pub mod sse;
pub mod view;
