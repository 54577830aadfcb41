//! Integration tests over the service layer, backed by the in-memory
//! store and a temp-dir blob store.

mod helpers;

mod hierarchy_test;
mod quota_test;
mod reaper_test;
mod share_test;
