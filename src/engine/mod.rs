pub mod assignment;
pub mod dispatch;
pub mod ledger;
pub mod locks;
pub mod pricing;
pub mod queue;
pub mod scoring;
pub mod service;
pub mod state_machine;
