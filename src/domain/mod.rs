pub mod reconcile;
pub mod special;
